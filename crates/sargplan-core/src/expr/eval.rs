//! Reference three-valued evaluator.
//!
//! The planner never evaluates data; this module exists so that rewrite and
//! span soundness can be checked against brute-force evaluation.

use crate::{
    expr::{ArithOp, Binding, CollectionKind, Expr, IsTest, PatternKind, TypeKind, VectorMetric},
    value::{Value, collation_cmp},
};
use regex::Regex;
use std::cmp::Ordering;

///
/// Row
///
/// Document accessor. Absent fields read as MISSING.
///

pub trait Row {
    fn field(&self, name: &str) -> Value;

    /// Statement parameter binding; unbound parameters read as MISSING.
    fn param(&self, _name: &str) -> Value {
        Value::Missing
    }
}

/// Evaluate `expr` against `row`.
#[must_use]
pub fn eval<R: Row + ?Sized>(row: &R, expr: &Expr) -> Value {
    Evaluator {
        row,
        scope: Vec::new(),
    }
    .eval(expr)
}

/// Whether `expr` evaluates to TRUE for `row`.
#[must_use]
pub fn is_true<R: Row + ?Sized>(row: &R, expr: &Expr) -> bool {
    eval(row, expr).is_true()
}

struct Evaluator<'a, R: Row + ?Sized> {
    row: &'a R,
    scope: Vec<(String, Value)>,
}

impl<R: Row + ?Sized> Evaluator<'_, R> {
    #[allow(clippy::too_many_lines)]
    fn eval(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Constant(v) => v.clone(),
            Expr::Field(path) => self.field(path),
            Expr::Param(name) => self.row.param(name),
            Expr::Var(name) => self
                .scope
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map_or(Value::Missing, |(_, v)| v.clone()),

            Expr::Compare { op, left, right } => {
                let (l, r) = (self.eval(left), self.eval(right));
                unknown_of(&[&l, &r])
                    .unwrap_or_else(|| Value::Bool(op.accepts(collation_cmp(&l, &r))))
            }
            Expr::Between { operand, low, high } => {
                let (v, lo, hi) = (self.eval(operand), self.eval(low), self.eval(high));
                unknown_of(&[&v, &lo, &hi]).unwrap_or_else(|| {
                    Value::Bool(
                        collation_cmp(&v, &lo) != Ordering::Less
                            && collation_cmp(&v, &hi) != Ordering::Greater,
                    )
                })
            }
            Expr::Like {
                kind,
                operand,
                pattern,
            } => {
                let (v, p) = (self.eval(operand), self.eval(pattern));
                if let Some(unknown) = unknown_of(&[&v, &p]) {
                    return unknown;
                }
                match (v.as_text(), p.as_text()) {
                    (Some(text), Some(pattern)) => pattern_matches(*kind, pattern, text),
                    _ => Value::Null,
                }
            }
            Expr::In { operand, list } => {
                let (v, l) = (self.eval(operand), self.eval(list));
                if let Some(unknown) = unknown_of(&[&v, &l]) {
                    return unknown;
                }
                match l.as_array() {
                    Some(items) => Value::Bool(items.iter().any(|item| *item == v)),
                    None => Value::Null,
                }
            }

            Expr::And(operands) => {
                let values: Vec<Value> = operands.iter().map(|e| self.eval(e)).collect();
                if values.iter().any(|v| matches!(v, Value::Bool(false))) {
                    Value::Bool(false)
                } else if values.iter().any(Value::is_missing) {
                    Value::Missing
                } else if values.iter().all(Value::is_true) {
                    Value::Bool(true)
                } else {
                    Value::Null
                }
            }
            Expr::Or(operands) => {
                let values: Vec<Value> = operands.iter().map(|e| self.eval(e)).collect();
                if values.iter().any(Value::is_true) {
                    Value::Bool(true)
                } else if values.iter().all(|v| matches!(v, Value::Bool(false))) {
                    Value::Bool(false)
                } else if values
                    .iter()
                    .any(|v| !v.is_missing() && !matches!(v, Value::Bool(false)))
                {
                    Value::Null
                } else {
                    Value::Missing
                }
            }
            Expr::Not(operand) => match self.eval(operand) {
                Value::Missing => Value::Missing,
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            },

            Expr::Is { test, operand } => {
                let v = self.eval(operand);
                match test {
                    IsTest::Null if v.is_missing() => Value::Missing,
                    IsTest::NotNull if v.is_missing() => Value::Missing,
                    IsTest::Null => Value::Bool(v.is_null()),
                    IsTest::NotNull => Value::Bool(!v.is_null()),
                    IsTest::Missing => Value::Bool(v.is_missing()),
                    IsTest::NotMissing => Value::Bool(!v.is_missing()),
                    IsTest::Valued => Value::Bool(!v.is_unknown()),
                    IsTest::NotValued => Value::Bool(v.is_unknown()),
                }
            }
            Expr::TypeCheck { kind, operand } => {
                let v = self.eval(operand);
                if v.is_unknown() {
                    return v;
                }
                Value::Bool(matches!(
                    (kind, &v),
                    (TypeKind::Boolean, Value::Bool(_))
                        | (TypeKind::Number, Value::Int(_) | Value::Float(_))
                        | (TypeKind::String, Value::Text(_))
                        | (TypeKind::Array, Value::Array(_))
                        | (TypeKind::Object, Value::Object(_))
                ))
            }

            Expr::Collection {
                kind,
                bindings,
                satisfies,
            } => {
                let Some(rows) = self.bind(bindings) else {
                    return Value::Bool(false);
                };
                let mut hits = 0usize;
                for frame in &rows {
                    let depth = self.scope.len();
                    self.scope.extend(frame.iter().cloned());
                    let ok = self.eval(satisfies).is_true();
                    self.scope.truncate(depth);
                    if ok {
                        hits += 1;
                    }
                }
                Value::Bool(match kind {
                    CollectionKind::Any => hits > 0,
                    CollectionKind::Every => hits == rows.len(),
                    CollectionKind::AnyEvery => !rows.is_empty() && hits == rows.len(),
                })
            }
            Expr::ArrayMap {
                distinct,
                mapping,
                bindings,
            } => {
                let sources: Vec<Value> = bindings.iter().map(|b| self.eval(&b.expr)).collect();
                if sources.iter().any(Value::is_missing) {
                    return Value::Missing;
                }
                let Some(rows) = self.bind(bindings) else {
                    return Value::Null;
                };
                let mut out: Vec<Value> = Vec::new();
                for frame in &rows {
                    let depth = self.scope.len();
                    self.scope.extend(frame.iter().cloned());
                    let v = self.eval(mapping);
                    self.scope.truncate(depth);
                    if v.is_missing() || (*distinct && out.contains(&v)) {
                        continue;
                    }
                    out.push(v);
                }
                Value::Array(out)
            }
            Expr::ArrayConstruct(items) => {
                Value::Array(items.iter().map(|e| self.eval(e)).collect())
            }
            Expr::Function { name, args } => {
                let values: Vec<Value> = args.iter().map(|e| self.eval(e)).collect();
                call_function(name, &values)
            }
            Expr::Arith { op, left, right } => {
                let (l, r) = (self.eval(left), self.eval(right));
                unknown_of(&[&l, &r]).unwrap_or_else(|| arith(*op, &l, &r))
            }
            Expr::VectorDistance {
                metric,
                operand,
                query,
            } => {
                let (v, q) = (self.eval(operand), self.eval(query));
                unknown_of(&[&v, &q]).unwrap_or_else(|| vector_distance(*metric, &v, &q))
            }
        }
    }

    fn field(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Value::Missing;
        };

        let mut current = self.row.field(first);
        for segment in segments {
            current = match current {
                Value::Object(mut entries) => entries.remove(segment).unwrap_or(Value::Missing),
                _ => Value::Missing,
            };
        }

        current
    }

    // Evaluate bindings into per-element frames. Multiple bindings iterate
    // in lockstep; None when any source is not an array.
    fn bind(&mut self, bindings: &[Binding]) -> Option<Vec<Vec<(String, Value)>>> {
        let mut sources = Vec::with_capacity(bindings.len());
        for binding in bindings {
            match self.eval(&binding.expr) {
                Value::Array(items) => sources.push((binding.variable.clone(), items)),
                _ => return None,
            }
        }

        let len = sources.iter().map(|(_, items)| items.len()).min().unwrap_or(0);
        Some(
            (0..len)
                .map(|i| {
                    sources
                        .iter()
                        .map(|(var, items)| (var.clone(), items[i].clone()))
                        .collect()
                })
                .collect(),
        )
    }
}

// MISSING dominates NULL when any operand is unknown.
fn unknown_of(values: &[&Value]) -> Option<Value> {
    if values.iter().any(|v| v.is_missing()) {
        Some(Value::Missing)
    } else if values.iter().any(|v| v.is_null()) {
        Some(Value::Null)
    } else {
        None
    }
}

fn pattern_matches(kind: PatternKind, pattern: &str, text: &str) -> Value {
    let source = match kind {
        PatternKind::Like => like_to_regex(pattern),
        PatternKind::Regex => format!("^(?s:{pattern})$"),
    };

    match Regex::new(&source) {
        Ok(re) => Value::Bool(re.is_match(text)),
        Err(_) => Value::Null,
    }
}

fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("^(?s:");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push_str(")$");
    out
}

fn call_function(name: &str, args: &[Value]) -> Value {
    if let Some(unknown) = unknown_of(&args.iter().collect::<Vec<_>>()) {
        return unknown;
    }

    match (name.to_ascii_lowercase().as_str(), args) {
        ("lower", [Value::Text(s)]) => Value::Text(s.to_lowercase()),
        ("upper", [Value::Text(s)]) => Value::Text(s.to_uppercase()),
        ("length", [Value::Text(s)]) => {
            Value::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX))
        }
        ("suffixes", [Value::Text(s)]) => Value::Array(
            s.char_indices()
                .map(|(i, _)| Value::Text(s[i..].to_string()))
                .collect(),
        ),
        ("tokens", [Value::Text(s), ..]) => Value::Array(tokens(s)),
        ("contains", [Value::Text(s), Value::Text(sub)]) => Value::Bool(s.contains(sub.as_str())),
        ("contains_token", [Value::Text(s), token, ..]) => Value::Bool(tokens(s).contains(token)),
        ("regexp_contains", [Value::Text(s), Value::Text(pattern)]) => {
            match Regex::new(&format!("(?s:{pattern})")) {
                Ok(re) => Value::Bool(re.is_match(s)),
                Err(_) => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

// Distinct lowercase alphanumeric runs.
fn tokens(text: &str) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let token = Value::Text(word.to_lowercase());
        if !word.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }

    out
}

#[expect(clippy::cast_precision_loss)]
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(f.get()),
        _ => None,
    }
}

fn arith(op: ArithOp, left: &Value, right: &Value) -> Value {
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let exact = match op {
            ArithOp::Add => a.checked_add(*b),
            ArithOp::Sub => a.checked_sub(*b),
            ArithOp::Mul => a.checked_mul(*b),
            ArithOp::Div => None,
        };
        if let Some(n) = exact {
            return Value::Int(n);
        }
    }

    let (Some(a), Some(b)) = (as_f64(left), as_f64(right)) else {
        return Value::Null;
    };
    let out = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    };

    Value::float(out).unwrap_or(Value::Null)
}

fn vector_distance(metric: VectorMetric, left: &Value, right: &Value) -> Value {
    let (Some(a), Some(b)) = (left.as_array(), right.as_array()) else {
        return Value::Null;
    };
    let (Some(a), Some(b)) = (
        a.iter().map(as_f64).collect::<Option<Vec<_>>>(),
        b.iter().map(as_f64).collect::<Option<Vec<_>>>(),
    ) else {
        return Value::Null;
    };
    if a.len() != b.len() {
        return Value::Null;
    }

    let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    let distance = match metric {
        VectorMetric::L2 => a.iter().zip(&b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
        VectorMetric::Dot => -dot,
        VectorMetric::Cosine => {
            let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt()
                * b.iter().map(|y| y * y).sum::<f64>().sqrt();
            1.0 - dot / norm
        }
    };

    Value::float(distance).unwrap_or(Value::Null)
}
