//! Composite sarging: per-key spans folded into multi-key spans for one
//! index.

mod derive;


pub(crate) use derive::KeyDeriver;

use crate::{
    config::SpanConfig,
    error::InternalError,
    expr::Expr,
    obs::sink::{PlannerEvent, record},
    plan::{
        index::{IndexApi, IndexDef},
        sargable::{KeySarg, Sargability, sargable_for},
        span::{SargSpans, Sentinel, add_array_keys, compose, constrain, streamline, union},
        subset::implies,
    },
};

/// Derive the spans `pred` allows on `index`.
///
/// A top-level OR is sarged branch by branch and the branch spans are
/// unioned. Each branch is exact only if every conjunct it contains is
/// represented by some composed key.
pub fn sarg_for(
    pred: &Expr,
    index: &IndexDef,
    sargability: &Sargability,
    config: &SpanConfig,
) -> Result<SargSpans, InternalError> {
    let spans = match pred {
        Expr::Or(branches) => {
            let mut acc = SargSpans::EMPTY;
            for branch in branches {
                let branch_sarg = sargable_for(branch, &index.keys)?;
                let spans = sarg_conjunction(branch, index, &branch_sarg, config)?;
                acc = union(acc, spans, config.or_span_fanout);
            }
            acc
        }
        _ => sarg_conjunction(pred, index, sargability, config)?,
    };

    if spans.is_empty() {
        record(PlannerEvent::SpanEmpty { index: &index.name });
        return Ok(spans);
    }

    let arity = spans.arity().min(index.keys.len());
    let desc: Vec<bool> = index.keys[..arity].iter().map(|k| k.attrs.desc).collect();
    let array_id = index.keys[..arity].iter().position(|k| k.is_array());

    Ok(tag_array(spans.with_descending(&desc), array_id))
}

/// Number of keys the index API lets a sarg reach.
#[must_use]
pub const fn sarg_length(api: IndexApi, sargability: &Sargability) -> usize {
    match api {
        IndexApi::V3 => sargability.max,
        IndexApi::V1 | IndexApi::V2 => sargability.min,
    }
}

fn sarg_conjunction(
    pred: &Expr,
    index: &IndexDef,
    sargability: &Sargability,
    config: &SpanConfig,
) -> Result<SargSpans, InternalError> {
    let n = sarg_length(index.api, sargability);
    if n == 0 {
        return Ok(SargSpans::WHOLE);
    }

    let conjuncts: Vec<&Expr> = match pred {
        Expr::And(operands) => operands.iter().collect(),
        _ => vec![pred],
    };
    // Conjuncts the index condition already guarantees need no key.
    let mut covered: Vec<bool> = conjuncts
        .iter()
        .map(|c| index.condition.as_ref().is_some_and(|cond| implies(cond, c)))
        .collect();

    let mut key_spans = Vec::with_capacity(n);
    for (position, key) in index.keys[..n].iter().enumerate() {
        let deriver = KeyDeriver::new(key, position, config);

        let mut acc: Option<SargSpans> = None;
        for (conjunct, covered) in conjuncts.iter().zip(covered.iter_mut()) {
            let Some(spans) = deriver.derive(conjunct)? else {
                continue;
            };
            if spans != SargSpans::SELF {
                *covered = true;
            }
            acc = Some(match acc {
                None => spans,
                Some(prev) if key.is_array() => add_array_keys(prev, spans),
                Some(prev) => constrain(prev, spans, config.full_span_fanout),
            });
        }

        // Keys restricted only by the conjunction as a whole, such as a
        // boolean key implied by several conjuncts together.
        if acc.is_none() && conjuncts.len() > 1 {
            acc = deriver.derive(pred)?;
        }

        let flag = sargability.keys.get(position).copied().unwrap_or_default();
        let spans = match acc {
            Some(SargSpans::Sentinel(Sentinel::SelfSpan)) => SargSpans::WHOLE,
            Some(spans) => spans,
            None if flag == KeySarg::Restricted => {
                return Err(InternalError::span_invariant(format!(
                    "key {position} of index '{}' is sargable but derived no span",
                    index.name
                )));
            }
            None => SargSpans::Sentinel(Sentinel::ExactWhole),
        };

        // Nothing can satisfy this key; the rest does not matter.
        if spans.is_empty() {
            return Ok(SargSpans::EMPTY);
        }
        key_spans.push(spans);
    }

    let mut exact = covered.iter().all(|c| *c);

    // Compose right to left, restarting from the current key when the
    // product of range counts exceeds the budget.
    let mut composed: Option<SargSpans> = None;
    for spans in key_spans.into_iter().rev() {
        composed = Some(match composed {
            None => spans,
            Some(rest) => {
                let size = spans.size().saturating_mul(rest.size());
                if size > config.full_span_fanout {
                    record(PlannerEvent::CompositeFanoutExceeded {
                        size,
                        limit: config.full_span_fanout,
                    });
                    exact = false;
                    spans
                } else {
                    compose(spans, rest)
                }
            }
        });
    }
    let mut composed = composed.unwrap_or(SargSpans::WHOLE);

    if index.api == IndexApi::V1 && !leading_points_only(&composed) {
        exact = false;
    }
    if !exact {
        composed = composed.into_inexact();
    }

    Ok(streamline(composed))
}

// A V1 scan filters only on its last restricted key; every key before it
// must be an equality.
fn leading_points_only(spans: &SargSpans) -> bool {
    match spans {
        SargSpans::Sentinel(_) => true,
        SargSpans::Term(term) => term.iter().all(|span| {
            let last = span.ranges.iter().rposition(|r| !r.is_whole());
            last.is_none_or(|last| span.ranges[..last].iter().all(|r| r.is_point()))
        }),
        SargSpans::Union(u) => u.children.iter().all(leading_points_only),
        SargSpans::Intersect(i) => i.children.iter().all(leading_points_only),
    }
}

fn tag_array(spans: SargSpans, array_id: Option<usize>) -> SargSpans {
    if array_id.is_none() {
        return spans;
    }

    match spans {
        SargSpans::Term(mut term) => {
            term.array_id = array_id;
            SargSpans::Term(term)
        }
        SargSpans::Union(mut u) => {
            u.children = u
                .children
                .into_iter()
                .map(|c| tag_array(c, array_id))
                .collect();
            SargSpans::Union(u)
        }
        SargSpans::Intersect(mut i) => {
            i.children = i
                .children
                .into_iter()
                .map(|c| tag_array(c, array_id))
                .collect();
            SargSpans::Intersect(i)
        }
        sentinel @ SargSpans::Sentinel(_) => sentinel,
    }
}
