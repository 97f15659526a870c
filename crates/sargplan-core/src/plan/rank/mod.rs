//! Module: plan::rank
//! Responsibility: reduce sargable candidates to the access-path winners.
//! Does not own: span derivation, pushdown eligibility or cost formulas.
//!
//! Ranking is one-shot. Candidates are visited in name order so the
//! outcome never depends on input order.

#[cfg(test)]
mod tests;

use crate::{
    config::RankConfig,
    error::InternalError,
    expr::Expr,
    obs::sink::{PlannerEvent, SelectionMode, record},
    plan::{
        cost::CostModel,
        entry::IndexEntry,
        index::pins_equality,
        pushdown::{PushdownFlags, QueryShape},
        subset::implies,
    },
};
use std::cmp::{Ordering, Reverse};

///
/// Ranker
///

pub(crate) struct Ranker<'a> {
    pred: &'a Expr,
    shape: &'a QueryShape,
    cost_model: &'a dyn CostModel,
    config: &'a RankConfig,
}

impl<'a> Ranker<'a> {
    pub(crate) const fn new(
        pred: &'a Expr,
        shape: &'a QueryShape,
        cost_model: &'a dyn CostModel,
        config: &'a RankConfig,
    ) -> Self {
        Self {
            pred,
            shape,
            cost_model,
            config,
        }
    }

    /// Eliminate dominated candidates, then break ties by cost when every
    /// survivor has an estimate, else by key-set containment.
    pub(crate) fn select(
        &self,
        mut entries: Vec<IndexEntry>,
    ) -> Result<(Vec<IndexEntry>, SelectionMode), InternalError> {
        if entries.is_empty() {
            return Ok((entries, SelectionMode::None));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let survivors = eliminate_dominated(entries);
        if survivors.is_empty() {
            return Err(InternalError::rank_invariant(
                "dominance elimination removed every candidate",
            ));
        }
        if survivors.len() == 1 {
            return Ok((survivors, SelectionMode::Structural));
        }

        if self.config.use_cost_model && self.costs_available(&survivors) {
            let winner = survivors
                .into_iter()
                .min_by(|a, b| self.cost_order(a, b))
                .into_iter()
                .collect();
            return Ok((winner, SelectionMode::CostBased));
        }

        Ok((self.drop_subsumed(survivors), SelectionMode::Structural))
    }

    fn costs_available(&self, entries: &[IndexEntry]) -> bool {
        let mut available = true;
        for entry in entries.iter().filter(|e| !e.cost.is_available()) {
            record(PlannerEvent::CostModelUnavailable { index: &entry.name });
            available = false;
        }
        available
    }

    /// Scan cost plus the sort and group work the scan leaves behind.
    /// Work the model cannot price is charged as a penalty ratio.
    pub(crate) fn effective_cost(&self, entry: &IndexEntry) -> f64 {
        let mut cost = entry.cost.cost;
        let mut unpriced = false;

        if self.shape.needs_order() && !entry.pushdown.contains(PushdownFlags::ORDER) {
            match self.cost_model.sort_cost(entry.cost.cardinality) {
                Some(sort) => cost += sort,
                None => unpriced = true,
            }
        }
        if self.shape.group.is_some() && !entry.pushdown.contains(PushdownFlags::GROUPAGGS) {
            match self.cost_model.group_cost(entry.cost.cardinality) {
                Some(group) => cost += group,
                None => unpriced = true,
            }
        }

        if unpriced {
            cost *= 1.0 + self.config.missing_cost_penalty;
        }
        cost
    }

    fn cost_order(&self, a: &IndexEntry, b: &IndexEntry) -> Ordering {
        self.effective_cost(a)
            .total_cmp(&self.effective_cost(b))
            .then(a.cost.cardinality.total_cmp(&b.cost.cardinality))
            .then(b.key_count().cmp(&a.key_count()))
            .then(b.pushdown.cmp(&a.pushdown))
            .then(a.name.cmp(&b.name))
    }

    // Of two candidates whose keys cover each other's, both stay; a
    // candidate whose keys are strictly covered by another's is dropped.
    fn drop_subsumed(&self, entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
        let mut alive = vec![true; entries.len()];

        for s in 0..entries.len() {
            for t in 0..entries.len() {
                if s == t || !alive[s] || !alive[t] {
                    continue;
                }
                let (se, te) = (&entries[s], &entries[t]);
                if self.covers(se, te) && !self.covers(te, se) {
                    record(PlannerEvent::CandidateEliminated {
                        index: &te.name,
                        by: &se.name,
                    });
                    alive[t] = false;
                }
            }
        }

        entries
            .into_iter()
            .zip(alive)
            .filter_map(|(e, keep)| keep.then_some(e))
            .collect()
    }

    /// Every sargable key of `te` is matched by a key of `se` or by a
    /// condition of `se` on a key the predicate does not fix.
    pub(crate) fn covers(&self, se: &IndexEntry, te: &IndexEntry) -> bool {
        te.sarg_keys.iter().all(|tk| {
            key_matched(se, tk)
                || se.index.condition.as_ref().is_some_and(|cond| {
                    pins_equality(cond, tk)
                        || (!pins_equality(self.pred, tk) && cond.depends_on(tk))
                })
        })
    }
}

fn key_matched(se: &IndexEntry, key: &Expr) -> bool {
    se.sarg_keys
        .iter()
        .any(|sk| implies(sk, key) || sk.depends_on(key))
}

fn eliminate_dominated(entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    let mut alive = vec![true; entries.len()];

    for s in 0..entries.len() {
        for t in 0..entries.len() {
            if s == t || !alive[s] || !alive[t] {
                continue;
            }
            if narrower_or_equivalent(&entries[s], &entries[t]) {
                record(PlannerEvent::CandidateEliminated {
                    index: &entries[t].name,
                    by: &entries[s].name,
                });
                alive[t] = false;
            }
        }
    }

    entries
        .into_iter()
        .zip(alive)
        .filter_map(|(e, keep)| keep.then_some(e))
        .collect()
}

/// Whether `se` is at least as good an access path as `te`.
///
/// `se` must restrict at least as many keys, its condition must imply any
/// condition of `te`, and every sargable key of `te` must be matched by a
/// key of `se` or fixed by its condition. Among such pairs the order is:
/// - leading key run (`min`)
/// - keys restricted or fixed by the condition
/// - pushdown bits
/// - having a condition
/// - fewer index keys
/// - name
#[must_use]
pub fn narrower_or_equivalent(se: &IndexEntry, te: &IndexEntry) -> bool {
    if te.sarg_keys.len() > se.sarg_keys.len() {
        return false;
    }

    if let Some(te_cond) = &te.index.condition {
        match &se.index.condition {
            Some(se_cond) if implies(se_cond, te_cond) => {}
            _ => return false,
        }
    }

    let matched = te
        .sarg_keys
        .iter()
        .all(|tk| key_matched(se, tk) || se.index.condition_pins(tk));
    if !matched {
        return false;
    }

    structural_key(se) > structural_key(te)
}

type StructuralKey<'a> = (
    usize,
    usize,
    PushdownFlags,
    bool,
    Reverse<usize>,
    Reverse<&'a str>,
);

fn structural_key(entry: &IndexEntry) -> StructuralKey<'_> {
    (
        entry.min,
        entry.key_count(),
        entry.pushdown,
        entry.has_condition(),
        Reverse(entry.index.keys.len()),
        Reverse(entry.name.as_str()),
    )
}
