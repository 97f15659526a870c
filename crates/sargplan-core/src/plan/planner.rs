//! Module: plan::planner
//! Responsibility: the access-path selection entry point.
//! Does not own: span derivation, pushdown eligibility or ranking rules.

use crate::{
    config::PlannerConfig,
    error::{InternalError, PlannerError},
    expr::Expr,
    obs::sink::{PlannerEvent, RejectReason, SelectionMode, record},
    plan::{
        cost::CostModel,
        entry::IndexEntry,
        index::IndexDef,
        normalize::{expand_pattern_indexes, normalize},
        pushdown::{QueryShape, pushdown_flags},
        rank::Ranker,
        sarg::{sarg_for, sarg_length},
        sargable::{Sargability, sargable_for},
        span::{SELECTIVITY_UNKNOWN, SargSpans},
        subset::implies,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// Rejection
/// An index that did not become a candidate, and why.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rejection {
    pub index: String,
    pub reason: RejectReason,
}

///
/// AccessSelection
///
/// Outcome of one planning call. `winners` is empty when no index can
/// restrict the scan; the caller then falls back to a primary scan.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AccessSelection {
    /// The predicate after normalization and pattern-index expansion.
    pub predicate: Expr,
    pub winners: Vec<IndexEntry>,
    pub mode: SelectionMode,
    pub rejected: Vec<Rejection>,
}

impl AccessSelection {
    #[must_use]
    pub fn winner_names(&self) -> Vec<&str> {
        self.winners.iter().map(|e| e.name.as_str()).collect()
    }
}

/// Choose the index access paths for `predicate`.
///
/// Indexes whose condition the predicate does not imply, or that the
/// predicate cannot restrict, are rejected. Every remaining index gets
/// spans, pushdown flags and a cost estimate before ranking.
pub fn plan_access(
    predicate: &Expr,
    indexes: &[IndexDef],
    shape: &QueryShape,
    cost_model: &dyn CostModel,
    config: &PlannerConfig,
) -> Result<AccessSelection, PlannerError> {
    config.validate()?;
    validate_indexes(indexes)?;

    let predicate = expand_pattern_indexes(&normalize(predicate, &config.dnf), indexes);
    let mut entries = Vec::new();
    let mut rejected = Vec::new();

    for index in indexes {
        match candidate(&predicate, index, shape, cost_model, config)? {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                record(PlannerEvent::CandidateRejected {
                    index: &index.name,
                    reason,
                });
                rejected.push(Rejection {
                    index: index.name.clone(),
                    reason,
                });
            }
        }
    }

    let (winners, mode) =
        Ranker::new(&predicate, shape, cost_model, &config.rank).select(entries)?;
    record(PlannerEvent::AccessSelected {
        mode,
        winners: winners.len(),
    });

    Ok(AccessSelection {
        predicate,
        winners,
        mode,
        rejected,
    })
}

fn validate_indexes(indexes: &[IndexDef]) -> Result<(), InternalError> {
    let mut seen = BTreeSet::new();
    for index in indexes {
        if !seen.insert(index.name.as_str()) {
            return Err(InternalError::planner_invariant(format!(
                "duplicate index name '{}'",
                index.name
            )));
        }
        index.validate()?;
    }

    Ok(())
}

// Outer error aborts planning; inner error rejects this index only.
fn candidate(
    predicate: &Expr,
    index: &IndexDef,
    shape: &QueryShape,
    cost_model: &dyn CostModel,
    config: &PlannerConfig,
) -> Result<Result<IndexEntry, RejectReason>, InternalError> {
    if let Some(condition) = &index.condition
        && !implies(predicate, condition)
    {
        return Ok(Err(RejectReason::ConditionNotImplied));
    }

    let sargability = sargable_for(predicate, &index.keys)?;
    if !usable(index, &sargability) {
        return Ok(Err(RejectReason::NotSargable));
    }
    record(PlannerEvent::CandidateSargable { index: &index.name });

    let spans = sarg_for(predicate, index, &sargability, &config.span)?;
    let spans = with_selectivity(spans, index, cost_model);
    let pushdown = pushdown_flags(index, &spans, spans.is_exact(), shape);

    let mut entry = IndexEntry::new(index, &sargability, spans, pushdown);
    entry.cost = cost_model.index_scan_cost(index, &entry.sarg_keys, &entry.spans);

    Ok(Ok(entry))
}

// Rows whose leading key is MISSING are absent from the index unless the
// key includes MISSING, so such an index needs a restricted leading key.
pub(crate) fn usable(index: &IndexDef, sargability: &Sargability) -> bool {
    let leading_missing = index.keys.first().is_some_and(|k| k.attrs.missing);

    sarg_length(index.api, sargability) > 0 && (sargability.min > 0 || leading_missing)
}

// selec1 is the key's own selectivity; selec2 the product over the key
// and every key before it, known only when each factor is.
fn with_selectivity(spans: SargSpans, index: &IndexDef, cost_model: &dyn CostModel) -> SargSpans {
    match spans {
        SargSpans::Term(mut term) => {
            for span in &mut term.spans {
                let mut cumulative = Some(1.0);
                for (position, range) in span.ranges.iter_mut().enumerate() {
                    let selec1 = cost_model.selectivity(index, position, range);
                    cumulative = cumulative.zip(selec1).map(|(acc, s)| acc * s);
                    range.selec1 = selec1.unwrap_or(SELECTIVITY_UNKNOWN);
                    range.selec2 = cumulative.unwrap_or(SELECTIVITY_UNKNOWN);
                }
            }
            SargSpans::Term(term)
        }
        SargSpans::Union(mut u) => {
            u.children = u
                .children
                .into_iter()
                .map(|c| with_selectivity(c, index, cost_model))
                .collect();
            SargSpans::Union(u)
        }
        SargSpans::Intersect(mut i) => {
            i.children = i
                .children
                .into_iter()
                .map(|c| with_selectivity(c, index, cost_model))
                .collect();
            SargSpans::Intersect(i)
        }
        sentinel @ SargSpans::Sentinel(_) => sentinel,
    }
}
