//! Deterministic, read-only rendering of an access selection.

use crate::plan::{entry::IndexEntry, planner::AccessSelection, span::SargSpans};
use serde_json::{Value as JsonValue, json};

impl AccessSelection {
    /// Explain document for plan construction and debugging.
    ///
    /// Fields and candidate lists are emitted in a fixed order, so equal
    /// selections always render byte-identical JSON.
    #[must_use]
    pub fn explain(&self) -> JsonValue {
        let mut rejected: Vec<_> = self.rejected.iter().collect();
        rejected.sort_by(|a, b| a.index.cmp(&b.index));

        json!({
            "predicate": self.predicate.to_string(),
            "mode": format!("{:?}", self.mode),
            "winners": self.winners.iter().map(explain_entry).collect::<Vec<_>>(),
            "rejected": rejected
                .into_iter()
                .map(|r| json!({ "index": r.index, "reason": format!("{:?}", r.reason) }))
                .collect::<Vec<_>>(),
        })
    }
}

fn explain_entry(entry: &IndexEntry) -> JsonValue {
    let cost = entry
        .cost
        .is_available()
        .then(|| json!({ "cost": entry.cost.cost, "cardinality": entry.cost.cardinality }));

    json!({
        "index": entry.name,
        "sarg_keys": entry.sarg_keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "spans": entry.spans.to_string(),
        "span_kind": span_kind(&entry.spans),
        "exact": entry.exact,
        "pushdown": entry.pushdown.to_string(),
        "cost": cost,
        "vector": entry.spans.vector().map(|v| json!({
            "metric": v.metric.as_str(),
            "query": v.query.to_string(),
        })),
    })
}

const fn span_kind(spans: &SargSpans) -> &'static str {
    match spans {
        SargSpans::Sentinel(_) => "sentinel",
        SargSpans::Term(_) => "term",
        SargSpans::Union(_) => "union",
        SargSpans::Intersect(_) => "intersect",
    }
}
