//! Access-path planning: normalization, implication, sargability, span
//! derivation, pushdowns and candidate ranking.

pub mod cost;
pub mod entry;
mod explain;
pub mod index;
pub mod normalize;
pub mod planner;
pub mod pushdown;
pub mod rank;
pub mod sarg;
pub mod sargable;
pub mod span;
pub mod subset;


// re-exports
pub use cost::{CostEstimate, CostModel, NoCostModel};
pub use entry::IndexEntry;
pub use index::{IndexApi, IndexDef, IndexKey, KeyAttrs};
pub use normalize::{expand_pattern_indexes, normalize};
pub use planner::{AccessSelection, Rejection, plan_access};
pub use pushdown::{OrderTerm, PushdownFlags, QueryShape};
pub use rank::narrower_or_equivalent;
pub use sarg::{sarg_for, sarg_length};
pub use sargable::{KeySarg, Sargability, sargable_for};
pub use span::{SargSpans, Sentinel};
pub use subset::implies;
