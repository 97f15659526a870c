//! Span algebra: constrain (AND), union (OR), composite composition,
//! array-key combination and streamlining.
//!
//! Every operation consumes its operands and returns a new value; sentinels
//! are plain constants and are never mutated in place.

use crate::{
    obs::sink::{PlannerEvent, record},
    plan::span::{ClassSet, IntersectSpans, SargSpans, Sentinel, Span, TermSpans, UnionSpans},
};
use std::collections::BTreeMap;

///
/// CONSTRAIN
///

/// Intersect two span sets over the same keys.
///
/// Term pairs are tightened range by range. When the cross product would
/// exceed `fanout` scans the smaller operand is kept and exactness is
/// dropped.
#[must_use]
pub fn constrain(left: SargSpans, right: SargSpans, fanout: usize) -> SargSpans {
    let result = match (left, right) {
        (SargSpans::Sentinel(Sentinel::Empty), _) | (_, SargSpans::Sentinel(Sentinel::Empty)) => {
            return SargSpans::EMPTY;
        }
        (SargSpans::Sentinel(Sentinel::SelfSpan), other)
        | (other, SargSpans::Sentinel(Sentinel::SelfSpan)) => return other,

        (SargSpans::Sentinel(a), SargSpans::Sentinel(b)) => {
            SargSpans::of_classes(a.classes().intersect(b.classes()), a.is_exact() && b.is_exact())
        }

        (SargSpans::Sentinel(s), other) | (other, SargSpans::Sentinel(s))
            if s.classes() == ClassSet::ALL =>
        {
            if s.is_exact() { other } else { other.into_inexact() }
        }

        (SargSpans::Union(u), other) | (other, SargSpans::Union(u)) => SargSpans::Union(UnionSpans {
            children: u
                .children
                .into_iter()
                .map(|child| constrain(child, other.clone(), fanout))
                .collect(),
        }),

        (SargSpans::Intersect(mut a), SargSpans::Intersect(b)) => {
            a.children.extend(b.children);
            SargSpans::Intersect(a)
        }
        (SargSpans::Intersect(mut i), other) | (other, SargSpans::Intersect(mut i)) => {
            i.children.push(other);
            SargSpans::Intersect(i)
        }

        (left, right) => {
            let arity = left.arity().max(right.arity());
            constrain_terms(left.into_term(arity), right.into_term(arity), fanout)
        }
    };

    streamline(result)
}

fn constrain_terms(left: TermSpans, right: TermSpans, fanout: usize) -> SargSpans {
    let size = left.len().saturating_mul(right.len());
    if size > fanout {
        record(PlannerEvent::CompositeFanoutExceeded {
            size,
            limit: fanout,
        });
        let mut kept = if left.len() <= right.len() { left } else { right };
        kept.spans = kept.spans.into_iter().map(Span::into_inexact).collect();

        return SargSpans::Term(kept);
    }

    let mut out = TermSpans {
        spans: Vec::with_capacity(size),
        ..TermSpans::default()
    };
    out.absorb_side_channels(&left);
    out.absorb_side_channels(&right);

    for a in &left {
        for b in &right {
            if let Some(span) = constrain_span(a, b) {
                out.spans.push(span);
            }
        }
    }

    if out.spans.is_empty() {
        SargSpans::EMPTY
    } else {
        SargSpans::Term(out)
    }
}

/// Positional intersection of two spans. `None` when any key range is
/// provably empty.
fn constrain_span(left: &Span, right: &Span) -> Option<Span> {
    let arity = left.arity().max(right.arity());
    let left = left.clone().padded(arity);
    let right = right.clone().padded(arity);

    let ranges = left
        .ranges
        .iter()
        .zip(&right.ranges)
        .map(|(l, r)| l.constrain(r))
        .collect::<Option<Vec<_>>>()?;

    Some(Span {
        ranges,
        exact: left.exact && right.exact,
    })
}

///
/// UNION
///

/// Union two span sets over the same keys. Collapses to the covering
/// class sentinel, inexact, once the result exceeds `fanout` scans.
#[must_use]
pub fn union(left: SargSpans, right: SargSpans, fanout: usize) -> SargSpans {
    let result = streamline(union_pair(left, right));

    let size = result.size();
    if size > fanout {
        record(PlannerEvent::OrFanoutCollapsed {
            ranges: size,
            limit: fanout,
        });
        return SargSpans::of_classes(result.classes(), false);
    }

    result
}

fn union_pair(left: SargSpans, right: SargSpans) -> SargSpans {
    match (left, right) {
        (SargSpans::Sentinel(Sentinel::Empty), other)
        | (other, SargSpans::Sentinel(Sentinel::Empty)) => other,
        (SargSpans::Sentinel(Sentinel::SelfSpan), _)
        | (_, SargSpans::Sentinel(Sentinel::SelfSpan)) => SargSpans::SELF,

        (SargSpans::Sentinel(a), SargSpans::Sentinel(b)) => union_sentinels(a, b),

        (SargSpans::Union(mut a), SargSpans::Union(b)) => {
            a.children.extend(b.children);
            SargSpans::Union(a)
        }
        (SargSpans::Union(mut u), other) | (other, SargSpans::Union(mut u)) => {
            u.children.push(other);
            SargSpans::Union(u)
        }

        (left @ SargSpans::Intersect(_), right) | (right, left @ SargSpans::Intersect(_)) => {
            SargSpans::Union(UnionSpans {
                children: vec![left, right],
            })
        }

        (left, right) => {
            let arity = left.arity().max(right.arity());
            let mut term = left.into_term(arity);
            let other = right.into_term(arity);
            term.absorb_side_channels(&other);
            term.spans.extend(other.spans);

            SargSpans::Term(term)
        }
    }
}

/// Class union. Exact when both sides are exact, or when an exact side
/// already admits every class of the other.
fn union_sentinels(a: Sentinel, b: Sentinel) -> SargSpans {
    let covers = |x: Sentinel, y: Sentinel| x.is_exact() && x.classes().contains(y.classes());
    let exact = (a.is_exact() && b.is_exact()) || covers(a, b) || covers(b, a);

    SargSpans::of_classes(a.classes().with(b.classes()), exact)
}

///
/// COMPOSE
///

/// Prefix every span of `rest` (keys `i+1..`) with every span of `key`
/// (key `i`). The caller enforces the composition budget.
#[must_use]
pub fn compose(key: SargSpans, rest: SargSpans) -> SargSpans {
    let result = match (key, rest) {
        (SargSpans::Sentinel(Sentinel::Empty), _) | (_, SargSpans::Sentinel(Sentinel::Empty)) => {
            return SargSpans::EMPTY;
        }

        (SargSpans::Union(u), rest) => SargSpans::Union(UnionSpans {
            children: u
                .children
                .into_iter()
                .map(|child| compose(child, rest.clone()))
                .collect(),
        }),
        (key, SargSpans::Union(u)) => SargSpans::Union(UnionSpans {
            children: u
                .children
                .into_iter()
                .map(|child| compose(key.clone(), child))
                .collect(),
        }),

        (SargSpans::Intersect(i), rest) => SargSpans::Intersect(IntersectSpans {
            children: i
                .children
                .into_iter()
                .map(|child| compose(child, rest.clone()))
                .collect(),
        }),
        (key, SargSpans::Intersect(i)) => SargSpans::Intersect(IntersectSpans {
            children: i
                .children
                .into_iter()
                .map(|child| compose(key.clone(), child))
                .collect(),
        }),

        (key, rest) => {
            let key_arity = key.arity();
            let rest_arity = rest.arity();
            SargSpans::Term(compose_terms(
                &key.into_term(key_arity),
                &rest.into_term(rest_arity),
            ))
        }
    };

    streamline(result)
}

fn compose_terms(key: &TermSpans, rest: &TermSpans) -> TermSpans {
    let mut out = TermSpans {
        spans: Vec::with_capacity(key.len().saturating_mul(rest.len())),
        ..TermSpans::default()
    };
    out.absorb_side_channels(key);
    out.absorb_side_channels(rest);

    for a in key {
        for b in rest {
            let mut ranges = a.ranges.clone();
            ranges.extend(b.ranges.iter().cloned());
            out.spans.push(Span {
                ranges,
                exact: a.exact && b.exact,
            });
        }
    }

    out
}

///
/// ARRAY KEYS
///

/// Combine the spans of two conditions on the same array key. Each may be
/// satisfied by a different element, so the result is an intersect scan
/// unless one sentinel's classes contain the other's.
#[must_use]
pub fn add_array_keys(left: SargSpans, right: SargSpans) -> SargSpans {
    let result = match (left, right) {
        (SargSpans::Sentinel(Sentinel::Empty), _) | (_, SargSpans::Sentinel(Sentinel::Empty)) => {
            return SargSpans::EMPTY;
        }
        (SargSpans::Sentinel(Sentinel::SelfSpan), other)
        | (other, SargSpans::Sentinel(Sentinel::SelfSpan)) => return other,

        (SargSpans::Sentinel(a), SargSpans::Sentinel(b)) => {
            let exact = a.is_exact() && b.is_exact();
            if b.classes().contains(a.classes()) {
                SargSpans::of_classes(a.classes(), exact)
            } else if a.classes().contains(b.classes()) {
                SargSpans::of_classes(b.classes(), exact)
            } else {
                SargSpans::Intersect(IntersectSpans {
                    children: vec![SargSpans::Sentinel(a), SargSpans::Sentinel(b)],
                })
            }
        }

        (SargSpans::Sentinel(s), other) | (other, SargSpans::Sentinel(s))
            if s.classes() == ClassSet::ALL =>
        {
            if s.is_exact() { other } else { other.into_inexact() }
        }

        (SargSpans::Intersect(mut a), SargSpans::Intersect(b)) => {
            a.children.extend(b.children);
            SargSpans::Intersect(a)
        }
        (SargSpans::Intersect(mut i), other) | (other, SargSpans::Intersect(mut i)) => {
            i.children.push(other);
            SargSpans::Intersect(i)
        }

        (left, right) => SargSpans::Intersect(IntersectSpans {
            children: vec![left, right],
        }),
    };

    streamline(result)
}

///
/// STREAMLINE
///

/// Canonicalize a span set: strip empty spans, deduplicate by canonical
/// form, flatten nested unions and intersects, and collapse to a sentinel
/// where one is equivalent.
#[must_use]
pub fn streamline(spans: SargSpans) -> SargSpans {
    match spans {
        SargSpans::Sentinel(_) => spans,
        SargSpans::Term(term) => streamline_term(term),
        SargSpans::Union(u) => streamline_union(u),
        SargSpans::Intersect(i) => streamline_intersect(i),
    }
}

fn streamline_term(term: TermSpans) -> SargSpans {
    let TermSpans {
        spans,
        vector,
        array_id,
    } = term;

    // Identical spans keep the exact copy: its region satisfies one branch.
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans.into_iter().filter(|s| !s.is_empty()) {
        let key = span.to_string();
        match seen.get(&key) {
            Some(&at) => {
                if span.is_exact() && !kept[at].is_exact() {
                    kept[at] = span;
                }
            }
            None => {
                seen.insert(key, kept.len());
                kept.push(span);
            }
        }
    }

    if kept.is_empty() {
        return SargSpans::EMPTY;
    }

    if vector.is_none() {
        if let Some(collapsed) = collapse_to_sentinel(&kept) {
            return collapsed;
        }
    }

    SargSpans::Term(TermSpans {
        spans: kept,
        vector,
        array_id,
    })
}

// A member equivalent to WHOLE or FULL admits the leading classes of all
// other members, so the set reduces to the union of their classes.
fn collapse_to_sentinel(spans: &[Span]) -> Option<SargSpans> {
    let sentinels: Vec<Option<Sentinel>> = spans.iter().map(Span::as_sentinel).collect();
    let broad = ClassSet::NULL.with(ClassSet::VALUED);

    if !sentinels
        .iter()
        .flatten()
        .any(|s| s.classes().contains(broad))
    {
        return None;
    }

    let classes = spans
        .iter()
        .fold(ClassSet::NONE, |acc, s| acc.with(s.leading_classes()));
    let all_exact_sentinels = sentinels.iter().all(|s| s.is_some_and(Sentinel::is_exact));
    let covered = sentinels
        .iter()
        .flatten()
        .any(|s| s.is_exact() && s.classes().contains(classes));

    Some(SargSpans::of_classes(classes, all_exact_sentinels || covered))
}

fn streamline_union(union_spans: UnionSpans) -> SargSpans {
    let mut merged = SargSpans::EMPTY;
    let mut intersects = Vec::new();

    let mut stack: Vec<SargSpans> = union_spans.children.into_iter().rev().collect();
    while let Some(child) = stack.pop() {
        match streamline(child) {
            SargSpans::Union(inner) => stack.extend(inner.children.into_iter().rev()),
            SargSpans::Sentinel(Sentinel::SelfSpan) => return SargSpans::SELF,
            SargSpans::Intersect(i) => intersects.push(SargSpans::Intersect(i)),
            other => merged = union_pair(merged, other),
        }
    }

    let merged = match merged {
        SargSpans::Term(term) => streamline_term(term),
        other => other,
    };

    if intersects.is_empty() {
        return merged;
    }
    if !merged.is_empty() {
        intersects.insert(0, merged);
    }
    if intersects.len() == 1 {
        return intersects.remove(0);
    }

    SargSpans::Union(UnionSpans {
        children: intersects,
    })
}

fn streamline_intersect(intersect: IntersectSpans) -> SargSpans {
    let mut exact = true;
    let mut children = Vec::new();

    let mut stack: Vec<SargSpans> = intersect.children.into_iter().rev().collect();
    while let Some(child) = stack.pop() {
        match streamline(child) {
            SargSpans::Sentinel(Sentinel::Empty) => return SargSpans::EMPTY,
            SargSpans::Sentinel(Sentinel::SelfSpan | Sentinel::ExactWhole) => {}
            SargSpans::Sentinel(Sentinel::Whole) => exact = false,
            SargSpans::Intersect(inner) => stack.extend(inner.children.into_iter().rev()),
            other => children.push(other),
        }
    }

    let mut result = match children.len() {
        0 => {
            return if exact {
                SargSpans::Sentinel(Sentinel::ExactWhole)
            } else {
                SargSpans::WHOLE
            };
        }
        1 => children.remove(0),
        _ => SargSpans::Intersect(IntersectSpans { children }),
    };

    if !exact {
        result = result.into_inexact();
    }

    result
}
