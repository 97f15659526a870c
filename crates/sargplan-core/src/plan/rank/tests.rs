use super::*;
use crate::{
    config::SpanConfig,
    obs::{PlannerSink, with_planner_sink},
    plan::{
        cost::{CostEstimate, NoCostModel},
        index::IndexDef,
        pushdown::{OrderTerm, pushdown_flags},
        sarg::sarg_for,
        sargable::sargable_for,
        span::SargSpans,
    },
};
use std::cell::RefCell;

#[derive(Default)]
struct CaptureSink {
    events: RefCell<Vec<String>>,
}

impl PlannerSink for CaptureSink {
    fn record(&self, event: PlannerEvent<'_>) {
        self.events.borrow_mut().push(format!("{event:?}"));
    }
}

// Prices scans only; sorts and groups are unknown.
struct ScanOnly;

impl CostModel for ScanOnly {
    fn index_scan_cost(&self, _: &IndexDef, _: &[Expr], _: &SargSpans) -> CostEstimate {
        CostEstimate::UNAVAILABLE
    }
}

fn f(name: &str) -> Expr {
    Expr::field(name)
}

fn int(v: i64) -> Expr {
    Expr::constant(v)
}

fn entry(pred: &Expr, index: &IndexDef, shape: &QueryShape) -> IndexEntry {
    let sargability = sargable_for(pred, &index.keys).unwrap();
    let spans = sarg_for(pred, index, &sargability, &SpanConfig::default()).unwrap();
    let pushdown = pushdown_flags(index, &spans, spans.is_exact(), shape);

    IndexEntry::new(index, &sargability, spans, pushdown)
}

fn priced(mut e: IndexEntry, cost: f64, cardinality: f64) -> IndexEntry {
    e.cost = CostEstimate::new(cost, cardinality, 1.0, 0.0);
    e
}

fn names(entries: &[IndexEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

fn a1_b_gt0() -> Expr {
    Expr::and(vec![Expr::eq(f("a"), int(1)), Expr::gt(f("b"), int(0))])
}

fn composite_and_partial(shape: &QueryShape) -> (IndexEntry, IndexEntry) {
    let pred = a1_b_gt0();
    let composite = IndexDef::on_fields("ix_ab", &["a", "b"]);
    let partial = IndexDef::on_fields("ix_a_bpos", &["a"]).with_condition(Expr::gt(f("b"), int(0)));

    (entry(&pred, &composite, shape), entry(&pred, &partial, shape))
}

fn run(
    entries: Vec<IndexEntry>,
    pred: &Expr,
    shape: &QueryShape,
    model: &dyn CostModel,
    config: &RankConfig,
) -> (Vec<IndexEntry>, SelectionMode, Vec<String>) {
    let capture = CaptureSink::default();
    let (winners, mode) = with_planner_sink(&capture, || {
        Ranker::new(pred, shape, model, config).select(entries).unwrap()
    });

    (winners, mode, capture.events.into_inner())
}

//
// DOMINANCE
//

#[test]
fn no_candidates_selects_nothing() {
    let pred = a1_b_gt0();
    let shape = QueryShape::default();
    let (winners, mode, events) = run(
        Vec::new(),
        &pred,
        &shape,
        &NoCostModel,
        &RankConfig::default(),
    );

    assert!(winners.is_empty());
    assert_eq!(mode, SelectionMode::None);
    assert!(events.is_empty());
}

#[test]
fn longer_equality_prefix_dominates() {
    let pred = Expr::and(vec![Expr::eq(f("a"), int(1)), Expr::eq(f("b"), int(2))]);
    let shape = QueryShape::default();
    let ab = entry(&pred, &IndexDef::on_fields("ix_ab", &["a", "b"]), &shape);
    let a = entry(&pred, &IndexDef::on_fields("ix_a", &["a"]), &shape);

    assert!(narrower_or_equivalent(&ab, &a));
    assert!(!narrower_or_equivalent(&a, &ab));

    let (winners, mode, events) = run(
        vec![a, ab],
        &pred,
        &shape,
        &NoCostModel,
        &RankConfig::default(),
    );
    assert_eq!(names(&winners), vec!["ix_ab"]);
    assert_eq!(mode, SelectionMode::Structural);
    assert_eq!(
        events,
        vec!["CandidateEliminated { index: \"ix_a\", by: \"ix_ab\" }"]
    );
}

#[test]
fn identical_definitions_keep_the_first_name() {
    let pred = Expr::eq(f("a"), int(1));
    let shape = QueryShape::default();
    let x = entry(&pred, &IndexDef::on_fields("ix_x", &["a"]), &shape);
    let y = entry(&pred, &IndexDef::on_fields("ix_y", &["a"]), &shape);

    let config = RankConfig::default();
    let (forward, _, _) = run(
        vec![x.clone(), y.clone()],
        &pred,
        &shape,
        &NoCostModel,
        &config,
    );
    let (backward, _, _) = run(vec![y, x], &pred, &shape, &NoCostModel, &config);

    assert_eq!(names(&forward), vec!["ix_x"]);
    assert_eq!(names(&backward), vec!["ix_x"]);
}

#[test]
fn partial_index_with_implied_condition_is_not_eliminated() {
    let shape = QueryShape::default();
    let (composite, partial) = composite_and_partial(&shape);

    assert!(!narrower_or_equivalent(&composite, &partial));
    assert!(!narrower_or_equivalent(&partial, &composite));

    let pred = a1_b_gt0();
    let (winners, mode, events) = run(
        vec![composite, partial],
        &pred,
        &shape,
        &NoCostModel,
        &RankConfig::default(),
    );

    assert_eq!(names(&winners), vec!["ix_a_bpos", "ix_ab"]);
    assert_eq!(mode, SelectionMode::Structural);
    assert_eq!(
        events,
        vec![
            "CostModelUnavailable { index: \"ix_a_bpos\" }",
            "CostModelUnavailable { index: \"ix_ab\" }",
        ]
    );
}

#[test]
fn stronger_condition_outranks_weaker_one() {
    let pred = Expr::and(vec![Expr::eq(f("a"), int(1)), Expr::gt(f("b"), int(5))]);
    let shape = QueryShape::default();
    let strong = IndexDef::on_fields("ix_strong", &["a"]).with_condition(Expr::gt(f("b"), int(3)));
    let weak = IndexDef::on_fields("ix_weak", &["a"]).with_condition(Expr::gt(f("b"), int(0)));

    let strong = entry(&pred, &strong, &shape);
    let weak = entry(&pred, &weak, &shape);

    // Equal structure, so the name decides; only the stronger condition
    // implies the weaker one.
    assert!(narrower_or_equivalent(&strong, &weak));
    assert!(!narrower_or_equivalent(&weak, &strong));
}

//
// STRUCTURAL TIE-BREAK
//

#[test]
fn strictly_covered_key_set_is_dropped() {
    let pred = Expr::and(vec![
        Expr::eq(f("a"), int(1)),
        Expr::eq(f("b"), int(2)),
        Expr::eq(f("c"), int(7)),
    ]);
    let shape = QueryShape::default();
    let partial = entry(
        &pred,
        &IndexDef::on_fields("ix_a_c7", &["a"]).with_condition(Expr::eq(f("c"), int(7))),
        &shape,
    );
    let ab = entry(&pred, &IndexDef::on_fields("ix_ab", &["a", "b"]), &shape);

    // The condition keeps the partial index out of reach of dominance.
    assert!(!narrower_or_equivalent(&ab, &partial));
    assert!(!narrower_or_equivalent(&partial, &ab));

    let config = RankConfig {
        use_cost_model: false,
        ..RankConfig::default()
    };
    let ranker = Ranker::new(&pred, &shape, &NoCostModel, &config);
    assert!(ranker.covers(&ab, &partial));
    assert!(!ranker.covers(&partial, &ab));

    let (winners, mode, events) = run(vec![partial, ab], &pred, &shape, &NoCostModel, &config);
    assert_eq!(names(&winners), vec!["ix_ab"]);
    assert_eq!(mode, SelectionMode::Structural);
    assert_eq!(
        events,
        vec!["CandidateEliminated { index: \"ix_a_c7\", by: \"ix_ab\" }"]
    );
}

//
// COST TIE-BREAK
//

#[test]
fn cheaper_candidate_wins_when_all_costs_known() {
    let shape = QueryShape::default();
    let (composite, partial) = composite_and_partial(&shape);
    let pred = a1_b_gt0();

    let (winners, mode, _) = run(
        vec![priced(composite, 10.0, 100.0), priced(partial, 5.0, 100.0)],
        &pred,
        &shape,
        &ScanOnly,
        &RankConfig::default(),
    );

    assert_eq!(names(&winners), vec!["ix_a_bpos"]);
    assert_eq!(mode, SelectionMode::CostBased);
}

#[test]
fn unpriced_sort_is_penalized() {
    let shape = QueryShape::default().with_order(vec![OrderTerm::asc(f("b"))]);
    let (composite, partial) = composite_and_partial(&shape);
    assert!(composite.pushdown.contains(PushdownFlags::ORDER));
    assert!(!partial.pushdown.contains(PushdownFlags::ORDER));

    let pred = a1_b_gt0();
    let config = RankConfig::default();
    let ranker = Ranker::new(&pred, &shape, &ScanOnly, &config);
    let partial = priced(partial, 5.0, 100.0);
    assert!((ranker.effective_cost(&partial) - 5.5).abs() < 1e-9);

    let (winners, mode, _) = run(
        vec![priced(composite, 5.2, 100.0), partial],
        &pred,
        &shape,
        &ScanOnly,
        &config,
    );
    assert_eq!(names(&winners), vec!["ix_ab"]);
    assert_eq!(mode, SelectionMode::CostBased);
}

#[test]
fn equal_cost_prefers_lower_cardinality_then_name() {
    let shape = QueryShape::default();
    let pred = a1_b_gt0();

    let (composite, partial) = composite_and_partial(&shape);
    let (winners, _, _) = run(
        vec![priced(composite, 5.0, 10.0), priced(partial, 5.0, 20.0)],
        &pred,
        &shape,
        &ScanOnly,
        &RankConfig::default(),
    );
    assert_eq!(names(&winners), vec!["ix_ab"]);
}

#[test]
fn missing_estimate_falls_back_to_structural() {
    let shape = QueryShape::default();
    let (composite, partial) = composite_and_partial(&shape);
    let pred = a1_b_gt0();

    let (winners, mode, events) = run(
        vec![priced(composite, 5.0, 10.0), partial],
        &pred,
        &shape,
        &ScanOnly,
        &RankConfig::default(),
    );

    assert_eq!(winners.len(), 2);
    assert_eq!(mode, SelectionMode::Structural);
    assert_eq!(
        events,
        vec!["CostModelUnavailable { index: \"ix_a_bpos\" }"]
    );
}

#[test]
fn disabled_cost_model_ignores_estimates() {
    let shape = QueryShape::default();
    let (composite, partial) = composite_and_partial(&shape);
    let pred = a1_b_gt0();
    let config = RankConfig {
        use_cost_model: false,
        ..RankConfig::default()
    };

    let (winners, mode, events) = run(
        vec![priced(composite, 10.0, 10.0), priced(partial, 1.0, 1.0)],
        &pred,
        &shape,
        &ScanOnly,
        &config,
    );

    assert_eq!(winners.len(), 2);
    assert_eq!(mode, SelectionMode::Structural);
    assert!(events.is_empty());
}
