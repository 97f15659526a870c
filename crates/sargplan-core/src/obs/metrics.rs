use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// PlannerCounters
/// Ephemeral, in-memory counters for planning activity.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlannerCounters {
    // Normalization
    pub normalized: u64,
    pub dnf_expansions_capped: u64,

    // Span derivation
    pub composite_fanout_exceeded: u64,
    pub or_fanout_collapsed: u64,
    pub spans_empty: u64,

    // Candidates
    pub candidates_sargable: u64,
    pub candidates_rejected: u64,
    pub candidates_eliminated: u64,

    // Selection
    pub cost_model_unavailable: u64,
    pub selections_structural: u64,
    pub selections_cost_based: u64,
    pub selections_none: u64,
}

///
/// IndexCounters
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IndexCounters {
    pub sargable: u64,
    pub rejected: u64,
    pub eliminated: u64,
}

///
/// PlannerReport
/// Point-in-time snapshot of the counters.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlannerReport {
    pub counters: PlannerCounters,
    pub indexes: BTreeMap<String, IndexCounters>,
}

thread_local! {
    static PLANNER_STATE: RefCell<PlannerReport> = RefCell::new(PlannerReport::default());
}

/// Borrow counters immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&PlannerReport) -> R) -> R {
    PLANNER_STATE.with(|m| f(&m.borrow()))
}

/// Borrow counters mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut PlannerReport) -> R) -> R {
    PLANNER_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = PlannerReport::default());
}

pub(crate) fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}
