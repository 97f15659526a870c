use crate::value::Value;
use std::cmp::Ordering;

///
/// Collation Rank
///
/// Cross-type ordering used by index collation:
/// MISSING < NULL < BOOLEAN < NUMBER < STRING < ARRAY < OBJECT.
///
/// Rank order is part of span semantics; every range bound relies on it.
///
#[must_use]
pub const fn collation_rank(value: &Value) -> u8 {
    match value {
        Value::Missing => 0,
        Value::Null => 1,
        Value::Bool(_) => 2,
        Value::Int(_) | Value::Float(_) => 3,
        Value::Text(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total collation comparator.
///
/// Ordering rules:
/// 1. Collation rank
/// 2. Variant-specific comparison for same-ranked values
///
/// Int and Float share a rank and compare numerically.
#[must_use]
pub fn collation_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = collation_rank(left).cmp(&collation_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    collation_cmp_same_rank(left, right)
}

fn collation_cmp_same_rank(left: &Value, right: &Value) -> Ordering {
    #[expect(clippy::match_same_arms)]
    match (left, right) {
        (Value::Missing, Value::Missing) | (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.cmp(b),
        (Value::Int(a), Value::Float(b)) => cmp_int_float(*a, b.get()),
        (Value::Float(a), Value::Int(b)) => cmp_int_float(*b, a.get()).reverse(),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => collation_cmp_list(a, b),
        (Value::Object(a), Value::Object(b)) => {
            // Objects order by size first, then entry by entry.
            a.len().cmp(&b.len()).then_with(|| {
                for ((lk, lv), (rk, rv)) in a.iter().zip(b.iter()) {
                    let ord = lk.cmp(rk).then_with(|| collation_cmp(lv, rv));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }

                Ordering::Equal
            })
        }
        _ => Ordering::Equal,
    }
}

// 2^63 is exactly representable; i64 covers [-2^63, 2^63).
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact comparison of an integer against a finite float, without rounding
/// the integer through f64.
#[expect(clippy::cast_possible_truncation)]
fn cmp_int_float(int: i64, float: f64) -> Ordering {
    if float >= I64_BOUND {
        return Ordering::Less;
    }
    if float < -I64_BOUND {
        return Ordering::Greater;
    }

    let floor = float.floor();
    let whole = floor as i64;
    if floor == float {
        return int.cmp(&whole);
    }

    // float lies strictly between whole and whole + 1
    if int <= whole {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn collation_cmp_list(left: &[Value], right: &[Value]) -> Ordering {
    for (l, r) in left.iter().zip(right.iter()) {
        let ord = collation_cmp(l, r);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len())
}
