use super::*;
use crate::{
    expr::Expr,
    obs::{PlannerEvent, PlannerSink, with_planner_sink},
    value::Value,
};
use std::cell::RefCell;

const FANOUT: usize = 8192;

#[derive(Default)]
struct CaptureSink {
    events: RefCell<Vec<String>>,
}

impl PlannerSink for CaptureSink {
    fn record(&self, event: PlannerEvent<'_>) {
        self.events.borrow_mut().push(format!("{event:?}"));
    }
}

fn int(v: i64) -> Expr {
    Expr::constant(v)
}

fn point(v: i64) -> SargSpans {
    SargSpans::term(vec![Span::single(Range::point(int(v)))])
}

fn above(v: i64) -> SargSpans {
    SargSpans::term(vec![Span::single(Range::new(
        Some(int(v)),
        None,
        Inclusion::NEITHER,
    ))])
}

fn below(v: i64) -> SargSpans {
    SargSpans::term(vec![Span::single(Range::new(
        Some(Expr::constant(Value::Null)),
        Some(int(v)),
        Inclusion::NEITHER,
    ))])
}

fn sentinels() -> impl Iterator<Item = Sentinel> {
    Sentinel::ALL
        .into_iter()
        .filter(|s| *s != Sentinel::SelfSpan)
}

//
// SENTINEL TABLES
//

#[test]
fn constrain_with_empty_is_empty() {
    for s in Sentinel::ALL {
        let x = SargSpans::Sentinel(s);
        assert_eq!(constrain(SargSpans::EMPTY, x.clone(), FANOUT), SargSpans::EMPTY);
        assert_eq!(constrain(x, SargSpans::EMPTY, FANOUT), SargSpans::EMPTY);
    }
}

#[test]
fn self_is_identity_for_constrain_and_absorbing_for_union() {
    for s in sentinels() {
        let x = SargSpans::Sentinel(s);
        assert_eq!(constrain(SargSpans::SELF, x.clone(), FANOUT), x);
        if s != Sentinel::Empty {
            assert_eq!(union(SargSpans::SELF, x.clone(), FANOUT), SargSpans::SELF);
        }
        assert_eq!(union(SargSpans::EMPTY, x.clone(), FANOUT), x);
    }
}

#[test]
fn constrain_table_matches_class_intersection() {
    for a in sentinels() {
        for b in sentinels() {
            let result = constrain(SargSpans::Sentinel(a), SargSpans::Sentinel(b), FANOUT);
            let classes = a.classes().intersect(b.classes());

            if classes.is_empty() {
                assert_eq!(result, SargSpans::EMPTY, "{a} AND {b}");
                continue;
            }
            assert_eq!(result.classes(), classes, "{a} AND {b}");
            assert_eq!(
                result.is_exact(),
                a.is_exact() && b.is_exact(),
                "{a} AND {b}"
            );
        }
    }
}

#[test]
fn union_table_matches_class_union() {
    for a in sentinels() {
        for b in sentinels() {
            let result = union(SargSpans::Sentinel(a), SargSpans::Sentinel(b), FANOUT);
            let classes = a.classes().with(b.classes());
            let covers = |x: Sentinel, y: Sentinel| {
                x.is_exact() && x.classes().contains(y.classes())
            };
            let exact = (a.is_exact() && b.is_exact()) || covers(a, b) || covers(b, a);

            assert_eq!(result.classes(), classes, "{a} OR {b}");
            assert_eq!(result.is_exact(), exact, "{a} OR {b}");
        }
    }
}

#[test]
fn missing_union_full_is_whole() {
    assert_eq!(
        union(
            SargSpans::Sentinel(Sentinel::Missing),
            SargSpans::Sentinel(Sentinel::ExactFull),
            FANOUT
        ),
        SargSpans::Sentinel(Sentinel::ExactWhole)
    );
    assert_eq!(
        union(
            SargSpans::Sentinel(Sentinel::Missing),
            SargSpans::Sentinel(Sentinel::Full),
            FANOUT
        ),
        SargSpans::WHOLE
    );
    assert_eq!(
        union(
            SargSpans::Sentinel(Sentinel::Null),
            SargSpans::Sentinel(Sentinel::Missing),
            FANOUT
        ),
        SargSpans::Sentinel(Sentinel::NotValued)
    );
}

#[test]
fn missing_or_valued_materializes_two_ranges() {
    let spans = union(
        SargSpans::Sentinel(Sentinel::Missing),
        SargSpans::Sentinel(Sentinel::ExactValued),
        FANOUT,
    );

    assert!(matches!(spans, SargSpans::Term(_)));
    assert_eq!(spans.size(), 2);
    assert!(spans.is_exact());
}

#[test]
fn sentinel_ranges_round_trip_through_of_range() {
    for s in sentinels() {
        let ranges = s.ranges();
        if ranges.len() == 1 && s != Sentinel::SelfSpan {
            let expected = if s.classes() == ClassSet::ALL {
                Sentinel::from_classes(ClassSet::ALL, s.is_exact())
            } else {
                Some(s)
            };
            assert_eq!(Sentinel::of_range(&ranges[0]), expected, "{s}");
        }
    }
}

//
// TERMS
//

#[test]
fn or_of_points_keeps_both_ranges() {
    let spans = union(point(1), point(2), FANOUT);

    assert_eq!(spans.size(), 2);
    assert!(spans.is_exact());
    assert_eq!(spans.to_string(), "[{[1, 1]}, {[2, 2]}]");
}

#[test]
fn contradictory_bounds_constrain_to_empty() {
    assert_eq!(constrain(above(5), below(3), FANOUT), SargSpans::EMPTY);
}

#[test]
fn overlapping_bounds_tighten() {
    let spans = constrain(above(1), below(9), FANOUT);

    assert_eq!(spans.to_string(), "[{(1, 9)}]");
    assert!(spans.is_exact());
}

#[test]
fn duplicate_spans_are_deduplicated() {
    let spans = union(point(4), point(4), FANOUT);

    assert_eq!(spans.size(), 1);
}

#[test]
fn exact_full_member_collapses_term() {
    let full = SargSpans::Sentinel(Sentinel::ExactFull);
    let spans = union(point(4), full, FANOUT);

    assert_eq!(spans, SargSpans::Sentinel(Sentinel::ExactFull));
}

#[test]
fn or_fanout_collapses_to_inexact_sentinel() {
    let capture = CaptureSink::default();

    let spans = with_planner_sink(&capture, || {
        let two = union(point(1), point(2), 2);
        union(two, point(3), 2)
    });

    assert_eq!(spans, SargSpans::Sentinel(Sentinel::Valued));
    assert!(!spans.is_exact());
    assert!(
        capture.events.borrow()[0].starts_with("OrFanoutCollapsed"),
        "{:?}",
        capture.events.borrow()
    );
}

#[test]
fn constrain_fanout_keeps_smaller_side_inexact() {
    let capture = CaptureSink::default();
    let three = union(union(point(1), point(2), FANOUT), point(3), FANOUT);
    let two = union(point(2), point(3), FANOUT);

    let spans = with_planner_sink(&capture, || constrain(three, two, 4));

    assert_eq!(spans.size(), 2);
    assert!(!spans.is_exact());
    assert_eq!(capture.events.borrow().len(), 1);
}

#[test]
fn compose_prefixes_ranges() {
    let spans = compose(point(1), above(5));

    assert_eq!(spans.to_string(), "[{[1, 1]; (5, +inf)}]");
    assert_eq!(spans.arity(), 2);
    assert!(spans.is_exact());
}

#[test]
fn compose_distributes_over_union() {
    let key = union(point(1), point(2), FANOUT);
    let rest = union(point(7), point(8), FANOUT);

    let spans = compose(key, rest);

    assert_eq!(spans.size(), 4);
    assert!(spans.is_exact());
}

#[test]
fn compose_with_empty_is_empty() {
    assert_eq!(compose(point(1), SargSpans::EMPTY), SargSpans::EMPTY);
    assert_eq!(compose(SargSpans::EMPTY, point(1)), SargSpans::EMPTY);
}

//
// ARRAY KEYS
//

#[test]
fn array_conditions_intersect() {
    let spans = add_array_keys(above(3), below(10));

    let SargSpans::Intersect(intersect) = &spans else {
        panic!("expected intersect spans, got {spans}");
    };
    assert_eq!(intersect.children.len(), 2);
    assert_eq!(spans.size(), 2);
}

#[test]
fn array_sentinels_resolve_by_containment() {
    let spans = add_array_keys(
        SargSpans::Sentinel(Sentinel::ExactValued),
        SargSpans::Sentinel(Sentinel::ExactFull),
    );
    assert_eq!(spans, SargSpans::Sentinel(Sentinel::ExactValued));

    let spans = add_array_keys(SargSpans::EMPTY, above(3));
    assert_eq!(spans, SargSpans::EMPTY);

    let spans = add_array_keys(SargSpans::WHOLE, above(3));
    assert_eq!(spans, above(3).into_inexact());
}

#[test]
fn intersect_streamline_drops_exact_whole() {
    let spans = streamline(SargSpans::Intersect(IntersectSpans {
        children: vec![SargSpans::Sentinel(Sentinel::ExactWhole), point(2)],
    }));

    assert_eq!(spans, point(2));
}

//
// RANGES
//

#[test]
fn descending_keys_reverse_bounds() {
    let spans = compose(point(1), above(5)).with_descending(&[false, true]);
    let SargSpans::Term(term) = spans else {
        panic!("expected term spans");
    };

    let range = &term[0].ranges[1];
    assert!(range.low.is_none());
    assert_eq!(range.high, Some(int(5)));
    assert_eq!(range.inclusion, Inclusion::NEITHER);
}

#[test]
fn inclusive_missing_low_is_unbounded() {
    let range = Range::new(
        Some(Expr::constant(Value::Missing)),
        None,
        Inclusion::LOW,
    );

    assert!(range.is_whole());
}

#[test]
fn range_contains_respects_inclusion() {
    let range = Range::new(Some(int(1)), Some(int(3)), Inclusion::LOW);

    assert_eq!(range.contains(&Value::Int(1)), Some(true));
    assert_eq!(range.contains(&Value::Int(3)), Some(false));
    assert_eq!(
        Range::new(Some(Expr::param("p")), None, Inclusion::LOW).contains(&Value::Int(1)),
        None
    );
}

#[test]
fn dynamic_bounds_lose_exactness() {
    let left = Range::new(Some(Expr::param("p")), None, Inclusion::LOW);
    let right = Range::new(Some(int(4)), None, Inclusion::LOW);

    let range = left.constrain(&right).expect("dynamic range is never empty");
    assert!(!range.exact);
}
