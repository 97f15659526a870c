//! Static implication between predicates.
//!
//! `implies(a, b)` is conservative: `true` is a proof that every row
//! satisfying `a` satisfies `b`; `false` only means no proof was found.

#[cfg(test)]
mod tests;

use crate::{
    expr::{CollectionKind, CompareOp, Expr, IsTest},
    value::{Value, collation_cmp},
};
use std::cmp::Ordering;

/// Whether `a` being true guarantees `b` is true.
#[must_use]
pub fn implies(a: &Expr, b: &Expr) -> bool {
    // A constant consequent holds or fails on its own; a constant
    // antecedent that is never true implies anything.
    if let Some(value) = b.static_value() {
        return value.is_true() || a.static_value().is_some_and(|v| !v.is_true());
    }
    if a.static_value().is_some_and(|v| !v.is_true()) {
        return true;
    }
    if a.equivalent_to(b) {
        return true;
    }

    match (a, b) {
        (_, Expr::And(conjuncts)) => conjuncts.iter().all(|c| implies(a, c)),
        (Expr::Or(disjuncts), _) => disjuncts.iter().all(|d| implies(d, b)),
        (Expr::And(conjuncts), _) if conjuncts.iter().any(|c| implies(c, b)) => true,
        (_, Expr::Or(disjuncts)) if disjuncts.iter().any(|d| implies(a, d)) => true,
        (Expr::And(_), _) | (_, Expr::Or(_)) => false,

        _ => implies_leaf(a, b),
    }
}

fn implies_leaf(a: &Expr, b: &Expr) -> bool {
    // Unknown-propagating antecedents prove their operand is known.
    if let Expr::Is { test, operand } = b {
        let proved = match test {
            IsTest::NotMissing => a.propagates_missing_from(operand),
            IsTest::NotNull | IsTest::Valued => a.propagates_null_from(operand),
            _ => false,
        };
        if proved {
            return true;
        }
    }

    match (a, b) {
        (
            Expr::Is {
                test: ta,
                operand: xa,
            },
            Expr::Is {
                test: tb,
                operand: xb,
            },
        ) => xa.equivalent_to(xb) && is_test_implies(*ta, *tb),

        (
            Expr::In {
                operand,
                list,
            },
            _,
        ) => match list.static_value() {
            Some(Value::Array(items)) => items
                .into_iter()
                .all(|item| implies(&Expr::eq(operand.as_ref().clone(), Expr::Constant(item)), b)),
            _ => false,
        },

        (
            Expr::Collection {
                kind: ka,
                bindings: ba,
                satisfies: sa,
            },
            Expr::Collection {
                kind: kb,
                bindings: bb,
                satisfies: sb,
            },
        ) => {
            collection_kind_implies(*ka, *kb)
                && ba.len() == bb.len()
                && ba.iter().zip(bb).all(|(x, y)| {
                    x.variable == y.variable && x.expr.equivalent_to(&y.expr)
                })
                && implies(sa, sb)
        }

        _ => match (Bound::of(a), b) {
            (Some(bound), Expr::In { operand, list }) if bound.op == CompareOp::Eq => {
                bound.operand.equivalent_to(operand)
                    && list
                        .static_value()
                        .and_then(|l| l.as_array().map(|items| items.contains(&bound.value)))
                        .unwrap_or(false)
            }
            (Some(bound), _) => {
                Bound::of(b).is_some_and(|other| {
                    bound.operand.equivalent_to(other.operand) && bound.implies(&other)
                })
            }
            (None, _) => false,
        },
    }
}

const fn is_test_implies(a: IsTest, b: IsTest) -> bool {
    matches!(
        (a, b),
        (IsTest::Null, IsTest::Null | IsTest::NotMissing | IsTest::NotValued)
            | (IsTest::NotNull, IsTest::NotNull | IsTest::NotMissing | IsTest::Valued)
            | (IsTest::Missing, IsTest::Missing | IsTest::NotValued)
            | (IsTest::NotMissing, IsTest::NotMissing)
            | (IsTest::Valued, IsTest::Valued | IsTest::NotNull | IsTest::NotMissing)
            | (IsTest::NotValued, IsTest::NotValued)
    )
}

const fn collection_kind_implies(a: CollectionKind, b: CollectionKind) -> bool {
    matches!(
        (a, b),
        (CollectionKind::Any, CollectionKind::Any)
            | (CollectionKind::AnyEvery, _)
            | (CollectionKind::Every, CollectionKind::Every)
    )
}

///
/// Bound
///
/// A comparison viewed as `operand op value` with a valued constant.
///

struct Bound<'a> {
    operand: &'a Expr,
    op: CompareOp,
    value: Value,
}

impl<'a> Bound<'a> {
    fn of(expr: &'a Expr) -> Option<Self> {
        let Expr::Compare { op, left, right } = expr else {
            return None;
        };

        let (operand, op, value) = match (left.static_value(), right.static_value()) {
            (None, Some(v)) => (left.as_ref(), *op, v),
            (Some(v), None) => (right.as_ref(), op.flip(), v),
            _ => return None,
        };
        if value.is_unknown() {
            return None;
        }

        Some(Self { operand, op, value })
    }

    /// Whether every value satisfying `self` satisfies `other`, for the
    /// same operand.
    fn implies(&self, other: &Self) -> bool {
        let (j, k) = (&self.value, &other.value);
        let jk = collation_cmp(j, k);

        match (self.op, other.op) {
            // Only k itself is excluded.
            (op, CompareOp::Ne) => !op.accepts(collation_cmp(k, j)),
            (CompareOp::Eq, op) => op.accepts(jk),

            (CompareOp::Lt, CompareOp::Lt | CompareOp::Le)
            | (CompareOp::Le, CompareOp::Le)
            | (CompareOp::Gt, CompareOp::Gt | CompareOp::Ge)
            | (CompareOp::Ge, CompareOp::Ge) => match (self.op, jk) {
                (CompareOp::Lt | CompareOp::Le, Ordering::Less | Ordering::Equal) => true,
                (CompareOp::Gt | CompareOp::Ge, Ordering::Greater | Ordering::Equal) => true,
                _ => false,
            },
            (CompareOp::Le, CompareOp::Lt) => jk == Ordering::Less,
            (CompareOp::Ge, CompareOp::Gt) => jk == Ordering::Greater,

            _ => false,
        }
    }
}
