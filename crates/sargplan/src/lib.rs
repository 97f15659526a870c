//! ## Crate layout
//! - `core`: expressions, values, normalization, implication, span
//!   algebra, pushdowns, ranking and planner observability.
//!
//! The `prelude` module carries the vocabulary needed to describe indexes
//! and predicates and to call the planner.

pub use sargplan_core as core;

/// re-exports
///
/// explain documents are `serde_json` values; re-exported so callers
/// need not pin their own version
pub mod __reexports {
    pub use serde_json;
}

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use sargplan_core::{
    config::PlannerConfig,
    error::PlannerError,
    plan::{AccessSelection, plan_access},
};

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        config::PlannerConfig,
        expr::{CollectionKind, CompareOp, Expr, IsTest, PatternKind, TypeKind},
        obs::{PlannerSink, SelectionMode},
        plan::{
            AccessSelection, CostEstimate, CostModel, IndexApi, IndexDef, IndexKey, NoCostModel,
            OrderTerm, PushdownFlags, QueryShape, SargSpans, plan_access,
        },
        value::Value,
    };
}
