//! Predicate normalization: NOT pushdown, lowering of pattern, range and
//! type-check predicates into comparisons, constant folding, and bounded
//! DNF expansion.

pub(crate) mod pattern;
mod pattern_index;


use crate::{
    config::DnfConfig,
    expr::{CompareOp, Expr, PatternKind, TypeKind},
    obs::sink::{PlannerEvent, record},
    plan::normalize::pattern::PatternPrefix,
    value::Value,
};

pub use pattern_index::expand_pattern_indexes;

///
/// Normalize a predicate into a deterministic, sargable form.
///
/// Normalization guarantees:
/// - a row satisfies the result exactly when it satisfies the input
/// - NOT only remains above operators without a usable dual
/// - BETWEEN, type checks and prefix patterns become comparisons
/// - nested AND / OR nodes are flattened, constant-folded, deduplicated
///   and ordered by canonical form
/// - AND over OR is distributed while the expansion stays inside the
///   `DnfConfig` budget; past it the AND is left unexpanded
///
#[must_use]
pub fn normalize(predicate: &Expr, config: &DnfConfig) -> Expr {
    let normalized = Normalizer {
        config,
        branches: 0,
    }
    .normalize(predicate);
    record(PlannerEvent::Normalized);

    normalized
}

struct Normalizer<'a> {
    config: &'a DnfConfig,

    /// OR branches produced by expansion so far.
    branches: usize,
}

impl Normalizer<'_> {
    fn normalize(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::And(operands) => self.normalize_and(operands),
            Expr::Or(operands) => self.normalize_or(operands),
            Expr::Not(inner) => self.normalize_not(inner),

            Expr::Between { operand, low, high } => self.normalize_and(&[
                Expr::ge(operand.as_ref().clone(), low.as_ref().clone()),
                Expr::le(operand.as_ref().clone(), high.as_ref().clone()),
            ]),
            Expr::Like {
                kind,
                operand,
                pattern,
            } => lower_pattern(*kind, operand, pattern).unwrap_or_else(|| expr.clone()),
            Expr::TypeCheck { kind, operand } => lower_type_check(*kind, operand),
            Expr::In { operand, list } => lower_in(operand, list).unwrap_or_else(|| expr.clone()),

            Expr::Collection {
                kind,
                bindings,
                satisfies,
            } => Expr::Collection {
                kind: *kind,
                bindings: bindings.clone(),
                satisfies: Box::new(self.normalize(satisfies)),
            },

            _ => expr.clone(),
        }
    }

    ///
    /// Normalize a NOT expression.
    ///
    /// The negation is pushed into the operand when the operand has a dual
    /// that is true exactly when the operand is false. Otherwise NOT stays,
    /// over an operand that is normalized but not lowered.
    ///
    fn normalize_not(&mut self, inner: &Expr) -> Expr {
        match negate(inner) {
            Some(pushed) => self.normalize(&pushed),
            None => match inner {
                Expr::Collection {
                    kind,
                    bindings,
                    satisfies,
                } => Expr::not(Expr::Collection {
                    kind: *kind,
                    bindings: bindings.clone(),
                    satisfies: Box::new(self.normalize(satisfies)),
                }),
                other => Expr::not(other.clone()),
            },
        }
    }

    ///
    /// Normalize an AND expression.
    ///
    /// Rules:
    /// - AND(TRUE, x)       → x
    /// - AND(FALSE, x)      → FALSE
    /// - AND(AND(a, b), c)  → AND(a, b, c)
    /// - AND()              → TRUE
    /// - AND(a, OR(b, c))   → OR(AND(a, b), AND(a, c)) within budget
    ///
    fn normalize_and(&mut self, operands: &[Expr]) -> Expr {
        let normalized: Vec<Expr> = operands.iter().map(|e| self.normalize(e)).collect();
        let folded = fold_and(normalized);

        match folded {
            Expr::And(children) => self.distribute(children),
            other => other,
        }
    }

    ///
    /// Normalize an OR expression.
    ///
    /// Rules:
    /// - OR(FALSE, x)      → x
    /// - OR(TRUE, x)       → TRUE
    /// - OR(OR(a, b), c)   → OR(a, b, c)
    /// - OR()              → FALSE
    ///
    fn normalize_or(&mut self, operands: &[Expr]) -> Expr {
        let normalized: Vec<Expr> = operands.iter().map(|e| self.normalize(e)).collect();

        fold_or(normalized)
    }

    // Distribute a folded AND over its OR operands, subject to the budget.
    fn distribute(&mut self, children: Vec<Expr>) -> Expr {
        let disjunct_counts: Vec<usize> = children
            .iter()
            .filter_map(|c| match c {
                Expr::Or(branches) => Some(branches.len()),
                _ => None,
            })
            .collect();
        if disjunct_counts.is_empty() {
            return Expr::And(children);
        }

        let operand_count = children.len();
        let complexity = disjunct_counts
            .iter()
            .fold(1usize, |acc, n| acc.saturating_mul(*n));

        if operand_count > self.config.max_and_operands
            || complexity.saturating_mul(operand_count) > self.config.max_term_fanout
            || self.branches.saturating_add(complexity) >= self.config.max_branches
        {
            record(PlannerEvent::DnfExpansionCapped);
            return Expr::And(children);
        }
        self.branches += complexity;

        let mut terms: Vec<Vec<Expr>> = vec![Vec::new()];
        for child in children {
            match child {
                Expr::Or(branches) => {
                    terms = terms
                        .into_iter()
                        .flat_map(|term| {
                            branches.iter().map(move |branch| {
                                let mut next = term.clone();
                                next.push(branch.clone());
                                next
                            })
                        })
                        .collect();
                }
                other => {
                    for term in &mut terms {
                        term.push(other.clone());
                    }
                }
            }
        }

        fold_or(terms.into_iter().map(fold_and).collect())
    }
}

fn fold_and(operands: Vec<Expr>) -> Expr {
    let mut out = Vec::with_capacity(operands.len());

    for operand in operands {
        match operand {
            e if e.is_true_constant() => {}
            e if e.is_false_constant() => return Expr::FALSE,
            Expr::And(grandchildren) => out.extend(grandchildren),
            other => out.push(other),
        }
    }

    finish(out, Expr::TRUE, Expr::And)
}

fn fold_or(operands: Vec<Expr>) -> Expr {
    let mut out = Vec::with_capacity(operands.len());

    for operand in operands {
        match operand {
            e if e.is_false_constant() => {}
            e if e.is_true_constant() => return Expr::TRUE,
            Expr::Or(grandchildren) => out.extend(grandchildren),
            other => out.push(other),
        }
    }

    finish(out, Expr::FALSE, Expr::Or)
}

// Sort by canonical form, drop duplicates and unwrap singletons.
fn finish(mut out: Vec<Expr>, neutral: Expr, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    out.sort_by_cached_key(Expr::canonical);
    out.dedup_by(|a, b| a.canonical() == b.canonical());

    match out.len() {
        0 => neutral,
        1 => out.remove(0),
        _ => wrap(out),
    }
}

///
/// NOT PUSHDOWN
///

/// An expression that is true exactly when `expr` is false, if one exists
/// without NOT at the root.
fn negate(expr: &Expr) -> Option<Expr> {
    let negated = match expr {
        Expr::Constant(Value::Bool(b)) => Expr::Constant(Value::Bool(!b)),
        Expr::Not(inner) => inner.as_ref().clone(),
        Expr::And(operands) => Expr::Or(operands.iter().map(|e| Expr::not(e.clone())).collect()),
        Expr::Or(operands) => Expr::And(operands.iter().map(|e| Expr::not(e.clone())).collect()),

        Expr::Compare { op, left, right } => {
            let (left, right) = (left.as_ref().clone(), right.as_ref().clone());
            match op {
                CompareOp::Eq => Expr::or(vec![
                    Expr::lt(left.clone(), right.clone()),
                    Expr::gt(left, right),
                ]),
                CompareOp::Ne => Expr::eq(left, right),
                CompareOp::Lt => Expr::ge(left, right),
                CompareOp::Le => Expr::gt(left, right),
                CompareOp::Gt => Expr::le(left, right),
                CompareOp::Ge => Expr::lt(left, right),
            }
        }
        Expr::Is { test, operand } => Expr::is(test.negate(), operand.as_ref().clone()),

        // Only with valued static bounds: an unknown bound leaves BETWEEN
        // unknown while one side of the dual could still be true.
        Expr::Between { operand, low, high } if is_valued_static(low) && is_valued_static(high) => {
            Expr::or(vec![
                Expr::lt(operand.as_ref().clone(), low.as_ref().clone()),
                Expr::gt(operand.as_ref().clone(), high.as_ref().clone()),
            ])
        }
        Expr::In { operand, list } => {
            let items = match list.static_value() {
                Some(Value::Array(items)) if !items.is_empty() => items,
                _ => return None,
            };
            if items.iter().any(Value::is_unknown) {
                return None;
            }
            Expr::and(
                items
                    .into_iter()
                    .map(|item| Expr::ne(operand.as_ref().clone(), Expr::Constant(item)))
                    .collect(),
            )
        }

        _ => return None,
    };

    Some(negated)
}

fn is_valued_static(expr: &Expr) -> bool {
    expr.static_value().is_some_and(|v| !v.is_unknown())
}

///
/// LOWERING
///

// Patterns with a literal prefix become a text range; the pattern itself
// stays as a residual conjunct unless the range captures it exactly.
fn lower_pattern(kind: PatternKind, operand: &Expr, pattern: &Expr) -> Option<Expr> {
    let Some(Value::Text(text)) = pattern.static_value() else {
        return None;
    };
    let prefix = PatternPrefix::of(kind, &text);
    let operand = operand.clone();

    if prefix.complete {
        return Some(Expr::eq(operand, Expr::Constant(Value::Text(prefix.prefix))));
    }
    if prefix.prefix.is_empty() {
        return None;
    }

    let (low, high) = prefix.bounds();
    let mut conjuncts = vec![Expr::ge(operand.clone(), low), Expr::lt(operand.clone(), high)];
    if !prefix.exact {
        conjuncts.push(Expr::Like {
            kind,
            operand: Box::new(operand),
            pattern: Box::new(pattern.clone()),
        });
    }

    Some(fold_and(conjuncts))
}

// Each type occupies one contiguous collation block.
fn lower_type_check(kind: TypeKind, operand: &Expr) -> Expr {
    let x = || operand.clone();
    let empty_text = || Expr::constant("");
    let empty_array = || Expr::Constant(Value::empty_array());
    let empty_object = || Expr::Constant(Value::empty_object());

    match kind {
        TypeKind::Boolean => Expr::le(x(), Expr::TRUE),
        TypeKind::Number => {
            fold_and(vec![Expr::gt(x(), Expr::TRUE), Expr::lt(x(), empty_text())])
        }
        TypeKind::String => {
            fold_and(vec![Expr::ge(x(), empty_text()), Expr::lt(x(), empty_array())])
        }
        TypeKind::Array => {
            fold_and(vec![Expr::ge(x(), empty_array()), Expr::lt(x(), empty_object())])
        }
        TypeKind::Object => Expr::ge(x(), empty_object()),
    }
}

// IN over a single valued constant is an equality.
fn lower_in(operand: &Expr, list: &Expr) -> Option<Expr> {
    match list.static_value() {
        Some(Value::Array(items)) if items.len() == 1 && !items[0].is_unknown() => Some(Expr::eq(
            operand.clone(),
            Expr::Constant(items[0].clone()),
        )),
        _ => None,
    }
}
