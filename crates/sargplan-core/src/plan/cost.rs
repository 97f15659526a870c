//! Pluggable cost model boundary.

use crate::{
    expr::Expr,
    plan::{
        index::IndexDef,
        span::{Range, SargSpans},
    },
};
use serde::{Deserialize, Serialize};

///
/// CostEstimate
///
/// Scan estimates for one candidate. Negative fields mean unavailable.
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct CostEstimate {
    pub cost: f64,
    pub cardinality: f64,
    pub size: f64,
    pub frontier_cost: f64,
}

impl CostEstimate {
    pub const UNAVAILABLE: Self = Self {
        cost: -1.0,
        cardinality: -1.0,
        size: -1.0,
        frontier_cost: -1.0,
    };

    #[must_use]
    pub const fn new(cost: f64, cardinality: f64, size: f64, frontier_cost: f64) -> Self {
        Self {
            cost,
            cardinality,
            size,
            frontier_cost,
        }
    }

    /// Cost and cardinality are both known. Size and frontier cost are
    /// informational and never gate ranking.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.cost >= 0.0 && self.cardinality >= 0.0
    }
}

impl Default for CostEstimate {
    fn default() -> Self {
        Self::UNAVAILABLE
    }
}

///
/// CostModel
///
/// Every method may decline. A model that declines everything turns the
/// planner into a purely structural ranker.
///

pub trait CostModel {
    fn index_scan_cost(
        &self,
        index: &IndexDef,
        sarg_keys: &[Expr],
        spans: &SargSpans,
    ) -> CostEstimate;

    /// Cost of sorting `cardinality` rows in the query engine.
    fn sort_cost(&self, _cardinality: f64) -> Option<f64> {
        None
    }

    /// Cost of grouping `cardinality` rows in the query engine.
    fn group_cost(&self, _cardinality: f64) -> Option<f64> {
        None
    }

    /// Fraction of index entries whose key at `position` falls in `range`.
    fn selectivity(&self, _index: &IndexDef, _position: usize, _range: &Range) -> Option<f64> {
        None
    }
}

///
/// NoCostModel
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoCostModel;

impl CostModel for NoCostModel {
    fn index_scan_cost(&self, _: &IndexDef, _: &[Expr], _: &SargSpans) -> CostEstimate {
        CostEstimate::UNAVAILABLE
    }
}
