//! Planner event sink boundary.
//!
//! This module is the only bridge between planning logic and the
//! thread-local counter state.

use crate::obs::metrics::{self, PlannerReport, bump};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn PlannerSink>> = RefCell::new(None);
}

///
/// RejectReason
/// Why an index did not become a candidate.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RejectReason {
    ConditionNotImplied,
    NotSargable,
}

///
/// SelectionMode
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SelectionMode {
    /// No sargable candidate.
    None,
    /// Dominance elimination only.
    Structural,
    /// Dominance elimination followed by the cost tie-break.
    CostBased,
}

///
/// PlannerEvent
///

#[derive(Clone, Copy, Debug)]
pub enum PlannerEvent<'a> {
    Normalized,
    DnfExpansionCapped,
    CompositeFanoutExceeded { size: usize, limit: usize },
    OrFanoutCollapsed { ranges: usize, limit: usize },
    SpanEmpty { index: &'a str },
    CandidateSargable { index: &'a str },
    CandidateRejected { index: &'a str, reason: RejectReason },
    CandidateEliminated { index: &'a str, by: &'a str },
    CostModelUnavailable { index: &'a str },
    AccessSelected { mode: SelectionMode, winners: usize },
}

///
/// PlannerSink
///

pub trait PlannerSink {
    fn record(&self, event: PlannerEvent<'_>);
}

/// GlobalPlannerSink
/// Default sink that writes into the thread-local counters.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalPlannerSink;

impl PlannerSink for GlobalPlannerSink {
    fn record(&self, event: PlannerEvent<'_>) {
        metrics::with_state_mut(|m| match event {
            PlannerEvent::Normalized => bump(&mut m.counters.normalized),
            PlannerEvent::DnfExpansionCapped => bump(&mut m.counters.dnf_expansions_capped),
            PlannerEvent::CompositeFanoutExceeded { .. } => {
                bump(&mut m.counters.composite_fanout_exceeded);
            }
            PlannerEvent::OrFanoutCollapsed { .. } => bump(&mut m.counters.or_fanout_collapsed),
            PlannerEvent::SpanEmpty { .. } => bump(&mut m.counters.spans_empty),
            PlannerEvent::CandidateSargable { index } => {
                bump(&mut m.counters.candidates_sargable);
                bump(&mut m.indexes.entry(index.to_string()).or_default().sargable);
            }
            PlannerEvent::CandidateRejected { index, .. } => {
                bump(&mut m.counters.candidates_rejected);
                bump(&mut m.indexes.entry(index.to_string()).or_default().rejected);
            }
            PlannerEvent::CandidateEliminated { index, .. } => {
                bump(&mut m.counters.candidates_eliminated);
                bump(&mut m.indexes.entry(index.to_string()).or_default().eliminated);
            }
            PlannerEvent::CostModelUnavailable { .. } => {
                bump(&mut m.counters.cost_model_unavailable);
            }
            PlannerEvent::AccessSelected { mode, .. } => match mode {
                SelectionMode::None => bump(&mut m.counters.selections_none),
                SelectionMode::Structural => bump(&mut m.counters.selections_structural),
                SelectionMode::CostBased => bump(&mut m.counters.selections_cost_based),
            },
        });
    }
}

pub(crate) const GLOBAL_PLANNER_SINK: GlobalPlannerSink = GlobalPlannerSink;

pub(crate) fn record(event: PlannerEvent<'_>) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // Preconditions:
        // - `ptr` was produced from a valid `&dyn PlannerSink` in `with_planner_sink`.
        // - `with_planner_sink` always restores the previous pointer before returning,
        //   including unwind paths via `Guard::drop`.
        // - `record` is synchronous and never stores `ptr` beyond this call.
        //
        // Aliasing:
        // - Only a shared reference is materialized, matching the shared borrow
        //   used to install the override.
        unsafe { (&*ptr).record(event) };
    } else {
        GLOBAL_PLANNER_SINK.record(event);
    }
}

/// Snapshot the current planner counters.
#[must_use]
pub fn planner_report() -> PlannerReport {
    metrics::with_state(Clone::clone)
}

/// Reset all planner counters.
pub fn planner_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary planner sink override.
pub fn with_planner_sink<T>(sink: &dyn PlannerSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<*const dyn PlannerSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0;
            });
        }
    }

    // SAFETY:
    // Preconditions:
    // - `sink_ptr` is installed only for this dynamic scope.
    // - `Guard` always restores the previous slot on all exits, including panic.
    // - `record` only dereferences synchronously and never persists `sink_ptr`.
    //
    // What would break this:
    // - Any deferred use of `sink_ptr` beyond this scope.
    // - Any path that bypasses Guard restoration.
    let sink_ptr =
        unsafe { std::mem::transmute::<&dyn PlannerSink, *const dyn PlannerSink>(sink) };
    let prev = SINK_OVERRIDE.with(|cell| {
        let mut slot = cell.borrow_mut();
        slot.replace(sink_ptr)
    });
    let _guard = Guard(prev);

    f()
}
