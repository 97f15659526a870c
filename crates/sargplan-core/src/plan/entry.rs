use crate::{
    expr::Expr,
    plan::{
        cost::CostEstimate,
        index::IndexDef,
        pushdown::PushdownFlags,
        sarg::sarg_length,
        sargable::Sargability,
        span::SargSpans,
    },
};
use serde::{Deserialize, Serialize};

///
/// IndexEntry
///
/// One sargable candidate for the current predicate. Built once per
/// index per planning call and consumed by ranking.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IndexEntry {
    pub name: String,
    pub index: IndexDef,

    /// Key expressions the predicate restricts, within the sarg length.
    pub sarg_keys: Vec<Expr>,

    pub min: usize,
    pub max: usize,
    pub sum: usize,

    /// Keys the index condition fixes to a single value.
    pub eq_conds: usize,

    pub spans: SargSpans,
    pub exact: bool,
    pub pushdown: PushdownFlags,
    pub cost: CostEstimate,
}

impl IndexEntry {
    #[must_use]
    pub fn new(
        index: &IndexDef,
        sargability: &Sargability,
        spans: SargSpans,
        pushdown: PushdownFlags,
    ) -> Self {
        let n = sarg_length(index.api, sargability);
        let sarg_keys = index
            .keys
            .iter()
            .zip(&sargability.keys)
            .take(n)
            .filter(|(_, flag)| flag.is_sargable())
            .map(|(key, _)| key.expr.clone())
            .collect();

        Self {
            name: index.name.clone(),
            index: index.clone(),
            sarg_keys,
            min: sargability.min,
            max: sargability.max,
            sum: sargability.sum,
            eq_conds: index.condition_equalities(),
            exact: spans.is_exact(),
            spans,
            pushdown,
            cost: CostEstimate::UNAVAILABLE,
        }
    }

    /// Keys restricted by the predicate or pinned by the index condition.
    #[must_use]
    pub const fn key_count(&self) -> usize {
        self.sum + self.eq_conds
    }

    #[must_use]
    pub const fn has_condition(&self) -> bool {
        self.index.condition.is_some()
    }
}
