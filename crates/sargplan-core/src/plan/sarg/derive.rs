//! Per-key span derivation.

use crate::{
    config::SpanConfig,
    error::InternalError,
    expr::{CollectionKind, CompareOp, Expr, IsTest, PatternKind, TypeKind},
    plan::{
        index::IndexKey,
        normalize::pattern::PatternPrefix,
        sargable::{element_predicate, missing_is_indexed},
        span::{
            Inclusion, Range, SargSpans, Sentinel, Span, TermSpans, VectorSearch, add_array_keys,
            constrain, union,
        },
        subset::implies,
    },
    value::Value,
};

///
/// KeyDeriver
///
/// Derives the spans one predicate allows on one index key. `None` means
/// the predicate places no restriction on the key at all.
///

pub(crate) struct KeyDeriver<'a> {
    key: &'a IndexKey,
    position: usize,
    config: &'a SpanConfig,
}

impl<'a> KeyDeriver<'a> {
    pub(crate) const fn new(key: &'a IndexKey, position: usize, config: &'a SpanConfig) -> Self {
        Self {
            key,
            position,
            config,
        }
    }

    pub(crate) fn derive(&self, pred: &Expr) -> Result<Option<SargSpans>, InternalError> {
        let k = &self.key.expr;

        if pred.is_static() {
            return Ok(None);
        }
        if pred.equivalent_to(k) {
            return Ok(Some(point(Expr::TRUE)));
        }
        if implies(pred, k) {
            return Ok(Some(SargSpans::SELF));
        }

        match pred {
            Expr::And(operands) => self.derive_and(operands),
            Expr::Or(operands) => self.derive_or(operands),

            Expr::Compare { op, left, right } => {
                if let Some(spans) = self.derive_vector(left, right)? {
                    return Ok(Some(spans));
                }
                if left.equivalent_to(k) && right.is_static() {
                    Ok(Some(compare_spans(*op, right)))
                } else if right.equivalent_to(k) && left.is_static() {
                    Ok(Some(compare_spans(op.flip(), left)))
                } else {
                    Ok(self.propagated(pred))
                }
            }
            Expr::Between { operand, low, high }
                if operand.equivalent_to(k) && low.is_static() && high.is_static() =>
            {
                Ok(Some(between_spans(low, high)))
            }
            Expr::Like {
                kind,
                operand,
                pattern,
            } if operand.equivalent_to(k) && pattern.is_static() => {
                Ok(Some(pattern_spans(*kind, pattern)))
            }
            Expr::In { operand, list } if operand.equivalent_to(k) && list.is_static() => {
                Ok(Some(self.in_spans(list)))
            }
            Expr::Is { test, operand } if operand.equivalent_to(k) => Ok(self.is_spans(*test)),
            Expr::TypeCheck { kind, operand } if operand.equivalent_to(k) => {
                Ok(Some(type_spans(*kind)))
            }

            Expr::Collection {
                kind: kind @ (CollectionKind::Any | CollectionKind::AnyEvery),
                bindings,
                satisfies,
            } => {
                let Some((element_pred, element_key)) =
                    element_predicate(bindings, satisfies, self.key)
                else {
                    return Ok(None);
                };
                let element = KeyDeriver::new(&element_key, self.position, self.config);
                let spans = element.derive(&element_pred)?;

                // ANY AND EVERY also constrains the other elements.
                Ok(match kind {
                    CollectionKind::AnyEvery => spans.map(SargSpans::into_inexact),
                    _ => spans,
                })
            }

            _ => Ok(self.propagated(pred)),
        }
    }

    // Operands that leave the key unrestricted are not represented in the
    // result, so their presence costs exactness.
    fn derive_and(&self, operands: &[Expr]) -> Result<Option<SargSpans>, InternalError> {
        let mut acc: Option<SargSpans> = None;
        let mut exact = true;

        for operand in operands {
            let Some(spans) = self.derive(operand)? else {
                exact = false;
                continue;
            };
            if spans == SargSpans::SELF {
                exact = false;
            }
            acc = Some(match acc {
                None => spans,
                Some(prev) if self.key.is_array() => add_array_keys(prev, spans),
                Some(prev) => constrain(prev, spans, self.config.full_span_fanout),
            });
        }

        Ok(acc.map(|spans| if exact { spans } else { spans.into_inexact() }))
    }

    fn derive_or(&self, operands: &[Expr]) -> Result<Option<SargSpans>, InternalError> {
        let mut derived = Vec::with_capacity(operands.len());
        for operand in operands {
            derived.push(self.derive(operand)?);
        }
        if derived.iter().all(Option::is_none) {
            return Ok(None);
        }

        let mut acc = SargSpans::EMPTY;
        for spans in derived {
            let spans = spans.unwrap_or(SargSpans::WHOLE);
            acc = union(acc, spans, self.config.or_span_fanout);
        }

        Ok(Some(acc))
    }

    fn derive_vector(&self, left: &Expr, right: &Expr) -> Result<Option<SargSpans>, InternalError> {
        let (distance, bound) = match (left, right) {
            (d @ Expr::VectorDistance { .. }, b) | (b, d @ Expr::VectorDistance { .. }) => (d, b),
            _ => return Ok(None),
        };
        let Expr::VectorDistance {
            metric,
            operand,
            query,
        } = distance
        else {
            return Ok(None);
        };
        if !operand.equivalent_to(&self.key.expr)
            || self.key.attrs.vector != Some(*metric)
            || !bound.is_static()
        {
            return Ok(None);
        }
        if !query.is_static() {
            return Err(InternalError::span_unsupported(format!(
                "vector query for key {} is not a constant or parameter",
                self.key.expr
            )));
        }

        // Nearest-neighbour scans are approximate; the key itself is not
        // bounded.
        let term = TermSpans {
            spans: vec![Span::single(Range::whole().with_exact(false))],
            vector: Some(VectorSearch {
                metric: *metric,
                query: query.as_ref().clone(),
            }),
            array_id: None,
        };

        Ok(Some(SargSpans::Term(term)))
    }

    fn in_spans(&self, list: &Expr) -> SargSpans {
        let items: Vec<Expr> = match list {
            Expr::ArrayConstruct(items) => items.clone(),
            Expr::Constant(Value::Array(items)) => {
                items.iter().cloned().map(Expr::Constant).collect()
            }
            Expr::Constant(_) => return SargSpans::EMPTY,
            _ => return SargSpans::Sentinel(Sentinel::Valued),
        };

        items
            .into_iter()
            .filter(|item| !item.static_value().is_some_and(|v| v.is_unknown()))
            .fold(SargSpans::EMPTY, |acc, item| {
                let spans = bounded_by(point(item.clone()), &[&item]);
                union(acc, spans, self.config.or_span_fanout)
            })
    }

    fn is_spans(&self, test: IsTest) -> Option<SargSpans> {
        let sentinel = match test {
            IsTest::Null => Sentinel::Null,
            IsTest::NotNull | IsTest::Valued => Sentinel::ExactValued,
            IsTest::NotMissing => Sentinel::ExactFull,
            IsTest::Missing | IsTest::NotValued
                if !missing_is_indexed(self.key, self.position) =>
            {
                return None;
            }
            IsTest::Missing => Sentinel::Missing,
            IsTest::NotValued => Sentinel::NotValued,
        };

        Some(SargSpans::Sentinel(sentinel))
    }

    // A predicate that cannot be true while the key is unknown still rules
    // out the unknown classes.
    fn propagated(&self, pred: &Expr) -> Option<SargSpans> {
        let k = &self.key.expr;
        if pred.propagates_null_from(k) {
            Some(SargSpans::Sentinel(Sentinel::Valued))
        } else if pred.propagates_missing_from(k) {
            Some(SargSpans::Sentinel(Sentinel::Full))
        } else {
            None
        }
    }
}

fn point(value: Expr) -> SargSpans {
    SargSpans::term(vec![Span::single(Range::point(value))])
}

fn single(low: Option<Expr>, high: Option<Expr>, inclusion: Inclusion) -> SargSpans {
    SargSpans::term(vec![Span::single(Range::new(low, high, inclusion))])
}

fn null_bound() -> Option<Expr> {
    Some(Expr::Constant(Value::Null))
}

fn is_unknown_constant(expr: &Expr) -> bool {
    expr.static_value().is_some_and(|v| v.is_unknown())
}

// A bound only known at execution time may turn out NULL or MISSING, which
// no range can express.
fn bounded_by(spans: SargSpans, bounds: &[&Expr]) -> SargSpans {
    if bounds.iter().all(|b| b.static_value().is_some()) {
        spans
    } else {
        spans.into_inexact()
    }
}

// `key op value` with the key on the left.
fn compare_spans(op: CompareOp, value: &Expr) -> SargSpans {
    if is_unknown_constant(value) {
        return SargSpans::EMPTY;
    }
    let v = || Some(value.clone());

    let spans = match op {
        CompareOp::Eq => point(value.clone()),
        CompareOp::Ne => SargSpans::term(vec![
            Span::single(Range::new(null_bound(), v(), Inclusion::NEITHER)),
            Span::single(Range::new(v(), None, Inclusion::NEITHER)),
        ]),
        CompareOp::Lt => single(null_bound(), v(), Inclusion::NEITHER),
        CompareOp::Le => single(null_bound(), v(), Inclusion::HIGH),
        CompareOp::Gt => single(v(), None, Inclusion::NEITHER),
        CompareOp::Ge => single(v(), None, Inclusion::LOW),
    };

    bounded_by(spans, &[value])
}

fn between_spans(low: &Expr, high: &Expr) -> SargSpans {
    if is_unknown_constant(low) || is_unknown_constant(high) {
        return SargSpans::EMPTY;
    }

    let spans = single(Some(low.clone()), Some(high.clone()), Inclusion::BOTH);
    bounded_by(spans, &[low, high])
}

fn pattern_spans(kind: PatternKind, pattern: &Expr) -> SargSpans {
    let Some(Value::Text(text)) = pattern.static_value() else {
        return match pattern {
            Expr::Param(_) => SargSpans::Sentinel(Sentinel::Valued),
            _ => SargSpans::EMPTY,
        };
    };

    let prefix = PatternPrefix::of(kind, &text);
    if prefix.complete {
        return point(Expr::Constant(Value::Text(prefix.prefix)));
    }

    let (low, high) = prefix.bounds();
    let spans = single(Some(low), Some(high), Inclusion::LOW);
    if prefix.exact { spans } else { spans.into_inexact() }
}

// Collation blocks per type.
fn type_spans(kind: TypeKind) -> SargSpans {
    let c = |v: Value| Some(Expr::Constant(v));
    let empty_text = || c(Value::Text(String::new()));

    match kind {
        TypeKind::Boolean => single(null_bound(), c(Value::Bool(true)), Inclusion::HIGH),
        TypeKind::Number => single(c(Value::Bool(true)), empty_text(), Inclusion::NEITHER),
        TypeKind::String => single(empty_text(), c(Value::empty_array()), Inclusion::LOW),
        TypeKind::Array => single(
            c(Value::empty_array()),
            c(Value::empty_object()),
            Inclusion::LOW,
        ),
        TypeKind::Object => single(c(Value::empty_object()), None, Inclusion::LOW),
    }
}
