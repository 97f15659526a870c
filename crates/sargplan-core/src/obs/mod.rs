//! Observability: planner event counters and the sink abstraction.
//!
//! Planning logic never touches `metrics` directly; every event flows
//! through `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{IndexCounters, PlannerCounters, PlannerReport};
pub use sink::{
    PlannerEvent, PlannerSink, RejectReason, SelectionMode, planner_report, planner_reset_all,
    with_planner_sink,
};
