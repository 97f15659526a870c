//! Sargable predicate analysis for query planners: DNF normalization,
//! static implication, span derivation over composite and array index
//! keys, pushdown eligibility and index candidate ranking.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod error;
pub mod expr;
pub mod obs;
pub mod plan;
pub mod value;

///
/// Prelude
///
/// Prelude contains only planning vocabulary.
/// No errors, sinks or span internals are re-exported here.
///

pub mod prelude {
    pub use crate::{
        config::PlannerConfig,
        expr::{CompareOp, Expr, IsTest},
        plan::{
            AccessSelection, CostModel, IndexDef, IndexKey, OrderTerm, QueryShape, plan_access,
        },
        value::Value,
    };
}
