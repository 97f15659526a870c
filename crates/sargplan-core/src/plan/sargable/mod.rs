//! Sargability analysis: which index keys a predicate can restrict.


use crate::{
    error::InternalError,
    expr::{Binding, CollectionKind, Expr, IsTest},
    plan::{index::IndexKey, subset::implies},
};
use serde::{Deserialize, Serialize};

///
/// KeySarg
///
/// How far a predicate restricts one index key. Ordered from weakest.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum KeySarg {
    #[default]
    None,

    /// The key only has to be known (not NULL or MISSING) for the
    /// predicate to hold.
    Propagated,

    /// The predicate bounds the key's value.
    Restricted,
}

impl KeySarg {
    #[must_use]
    pub const fn is_sargable(self) -> bool {
        !matches!(self, Self::None)
    }
}

///
/// Sargability
///
/// `min` is the leading run of sargable keys, `max` the position after the
/// last sargable key, and `sum` the number of sargable keys.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Sargability {
    pub min: usize,
    pub max: usize,
    pub sum: usize,
    pub keys: Vec<KeySarg>,
}

impl Sargability {
    #[must_use]
    pub const fn is_sargable(&self) -> bool {
        self.max > 0
    }

    fn from_keys(keys: Vec<KeySarg>) -> Self {
        let min = keys.iter().take_while(|k| k.is_sargable()).count();
        let max = keys
            .iter()
            .rposition(|k| k.is_sargable())
            .map_or(0, |i| i + 1);
        let sum = keys.iter().filter(|k| k.is_sargable()).count();

        Self {
            min,
            max,
            sum,
            keys,
        }
    }
}

/// Analyze `pred` against the ordered index keys.
///
/// Keys are walked left to right and the walk stops at a constant key.
/// A top-level OR is sargable only if every branch is: the weakest branch
/// bounds the leading run.
pub fn sargable_for(pred: &Expr, keys: &[IndexKey]) -> Result<Sargability, InternalError> {
    if let Expr::Or(branches) = pred {
        let mut combined: Option<Sargability> = None;
        for branch in branches {
            let s = sargable_for(branch, keys)?;
            if !s.is_sargable() {
                return Ok(Sargability {
                    keys: vec![KeySarg::None; keys.len()],
                    ..Sargability::default()
                });
            }

            combined = Some(match combined {
                None => s,
                Some(acc) => Sargability {
                    min: acc.min.min(s.min),
                    max: acc.max.max(s.max),
                    sum: acc.sum.max(s.sum),
                    keys: acc.keys.iter().zip(&s.keys).map(|(a, b)| *a.max(b)).collect(),
                },
            });
        }

        return Ok(combined.unwrap_or_default());
    }

    let mut flags = vec![KeySarg::None; keys.len()];
    for (position, key) in keys.iter().enumerate() {
        if key.expr.is_static() {
            break;
        }
        flags[position] = key_sarg(pred, key, position)?;
    }

    Ok(Sargability::from_keys(flags))
}

/// Per-key visitor.
pub(crate) fn key_sarg(
    pred: &Expr,
    key: &IndexKey,
    position: usize,
) -> Result<KeySarg, InternalError> {
    let k = &key.expr;

    if pred.is_static() {
        return Ok(KeySarg::None);
    }
    if pred.equivalent_to(k) || implies(pred, k) {
        return Ok(KeySarg::Restricted);
    }

    let sarg = match pred {
        Expr::And(operands) => {
            let mut best = KeySarg::None;
            for operand in operands {
                best = best.max(key_sarg(operand, key, position)?);
            }
            best
        }
        Expr::Or(operands) => {
            let mut worst = KeySarg::Restricted;
            for operand in operands {
                worst = worst.min(key_sarg(operand, key, position)?);
            }
            worst
        }

        Expr::Compare { left, right, .. } => {
            if let Some(sarg) = vector_sarg(left, right, key)? {
                return Ok(sarg);
            }
            if (left.equivalent_to(k) && right.is_static())
                || (right.equivalent_to(k) && left.is_static())
            {
                KeySarg::Restricted
            } else {
                propagated(pred, k)
            }
        }
        Expr::Between { operand, low, high }
            if operand.equivalent_to(k) && low.is_static() && high.is_static() =>
        {
            KeySarg::Restricted
        }
        Expr::Like {
            operand, pattern, ..
        } if operand.equivalent_to(k) && pattern.is_static() => KeySarg::Restricted,
        Expr::In { operand, list } if operand.equivalent_to(k) && list.is_static() => {
            KeySarg::Restricted
        }
        Expr::Is { test, operand } if operand.equivalent_to(k) => {
            if matches!(test, IsTest::Missing | IsTest::NotValued)
                && !missing_is_indexed(key, position)
            {
                KeySarg::None
            } else {
                KeySarg::Restricted
            }
        }
        Expr::TypeCheck { operand, .. } if operand.equivalent_to(k) => KeySarg::Restricted,

        Expr::Collection {
            kind: CollectionKind::Any | CollectionKind::AnyEvery,
            bindings,
            satisfies,
        } => match element_predicate(bindings, satisfies, key) {
            Some((element_pred, element_key)) => key_sarg(&element_pred, &element_key, position)?,
            None => KeySarg::None,
        },

        _ => propagated(pred, k),
    };

    Ok(sarg)
}

fn propagated(pred: &Expr, key: &Expr) -> KeySarg {
    if pred.propagates_null_from(key) || pred.propagates_missing_from(key) {
        KeySarg::Propagated
    } else {
        KeySarg::None
    }
}

/// Entries with a MISSING key exist only for non-leading keys or keys
/// declared to index MISSING.
pub(crate) const fn missing_is_indexed(key: &IndexKey, position: usize) -> bool {
    position > 0 || key.attrs.missing
}

// Nearest-neighbour predicates only sarg a vector key of the same metric.
fn vector_sarg(
    left: &Expr,
    right: &Expr,
    key: &IndexKey,
) -> Result<Option<KeySarg>, InternalError> {
    let (distance, bound) = match (left, right) {
        (d @ Expr::VectorDistance { .. }, other) | (other, d @ Expr::VectorDistance { .. }) => {
            (d, other)
        }
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
    if !operand.equivalent_to(&key.expr) {
        return Ok(None);
    }
    if key.attrs.vector != Some(*metric) || !bound.is_static() {
        return Ok(Some(KeySarg::None));
    }
    if !query.is_static() {
        return Err(InternalError::sargable_invariant(format!(
            "vector query for key {} is not a constant or parameter",
            key.expr
        )));
    }

    Ok(Some(KeySarg::Restricted))
}

/// For an array key `ARRAY m FOR v IN src END` and a collection predicate
/// over the same source, the per-element predicate and the element key.
/// The predicate's variable is renamed to the key's when they differ.
pub(crate) fn element_predicate(
    bindings: &[Binding],
    satisfies: &Expr,
    key: &IndexKey,
) -> Option<(Expr, IndexKey)> {
    let Expr::ArrayMap {
        mapping,
        bindings: key_bindings,
        ..
    } = &key.expr
    else {
        return None;
    };
    let ([pred_binding], [key_binding]) = (bindings, key_bindings.as_slice()) else {
        return None;
    };
    if !pred_binding.expr.equivalent_to(&key_binding.expr) {
        return None;
    }

    let element_pred = if pred_binding.variable == key_binding.variable {
        satisfies.clone()
    } else if satisfies.references_variable(&key_binding.variable) {
        // Renaming would capture a variable of the outer scope.
        return None;
    } else {
        satisfies.rename_variable(&pred_binding.variable, &key_binding.variable)
    };

    let element_key = IndexKey {
        expr: mapping.as_ref().clone(),
        attrs: key.attrs,
    };

    Some((element_pred, element_key))
}
