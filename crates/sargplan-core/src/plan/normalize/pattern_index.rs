//! Module: plan::normalize::pattern_index
//! Responsibility: make infix pattern predicates sargable through array
//! indexes over `SUFFIXES(x)` or `TOKENS(x)`.
//! Does not own: prefix lowering, which stays in the normalizer.

use crate::{
    expr::{Expr, PatternKind},
    plan::{
        index::IndexDef,
        normalize::{
            fold_and, fold_or, lower_pattern,
            pattern::{escape_like, suffix_pattern},
        },
        subset::implies,
    },
    value::Value,
};
use std::collections::BTreeMap;

///
/// ArraySource
/// The binding of an array index key over a pattern source.
///

#[derive(Clone, Debug)]
struct ArraySource {
    variable: String,
    function: String,
}

impl ArraySource {
    // `options` follow the source, as in `TOKENS(x, options)`.
    fn over(&self, source: &Expr, options: &[Expr]) -> Expr {
        let mut args = vec![source.clone()];
        args.extend(options.iter().cloned());

        Expr::function(self.function.clone(), args)
    }
}

///
/// PatternIndexes
///
/// Sources covered by a `SUFFIXES` or `TOKENS` array index usable for the
/// predicate, keyed by canonical form.
///

#[derive(Debug, Default)]
struct PatternIndexes {
    suffixes: BTreeMap<String, ArraySource>,
    tokens: BTreeMap<String, ArraySource>,
}

impl PatternIndexes {
    fn collect(predicate: &Expr, indexes: &[IndexDef]) -> Self {
        let mut found = Self::default();

        for index in indexes {
            if index
                .condition
                .as_ref()
                .is_some_and(|cond| !implies(predicate, cond))
            {
                continue;
            }

            for key in &index.keys {
                if let Some((kind, source, array)) = array_source(&key.expr) {
                    let map = match kind {
                        SourceKind::Suffixes => &mut found.suffixes,
                        SourceKind::Tokens => &mut found.tokens,
                    };
                    map.entry(source.canonical()).or_insert(array);
                    break;
                }
            }
        }

        found
    }

    fn is_empty(&self) -> bool {
        self.suffixes.is_empty() && self.tokens.is_empty()
    }

    fn rewrite(&self, expr: &Expr) -> Expr {
        let extra = match expr {
            Expr::And(operands) => {
                return fold_and(operands.iter().map(|e| self.rewrite(e)).collect());
            }
            Expr::Or(operands) => {
                return fold_or(operands.iter().map(|e| self.rewrite(e)).collect());
            }
            Expr::Like {
                kind,
                operand,
                pattern,
            } => self.suffix_like(*kind, operand, pattern),
            Expr::Function { name, args } => self.function(name, args),
            _ => None,
        };

        match extra {
            Some(any) => fold_and(vec![expr.clone(), any]),
            None => expr.clone(),
        }
    }

    // `x LIKE '%p'` holds when some suffix of x matches `p`.
    fn suffix_like(&self, kind: PatternKind, source: &Expr, pattern: &Expr) -> Option<Expr> {
        let array = self.suffixes.get(&source.canonical())?;
        let Some(Value::Text(text)) = pattern.static_value() else {
            return None;
        };
        let suffix = suffix_pattern(kind, &text)?;

        quantified(array, source, kind, &suffix)
    }

    fn function(&self, name: &str, args: &[Expr]) -> Option<Expr> {
        let (source, rest) = args.split_first()?;
        let arg = rest.first()?;
        let name = name.to_ascii_lowercase();

        match name.as_str() {
            "contains" | "regexp_contains" => {
                let array = self.suffixes.get(&source.canonical())?;
                let Some(Value::Text(text)) = arg.static_value() else {
                    return None;
                };
                let (kind, pattern) = if name == "contains" {
                    (PatternKind::Like, format!("{}%", escape_like(&text)))
                } else {
                    (PatternKind::Regex, format!("(?:{text}).*"))
                };

                quantified(array, source, kind, &pattern)
            }
            "contains_token" | "contains_token_like" | "contains_token_regexp" => {
                let array = self.tokens.get(&source.canonical())?;
                let token = Expr::var(array.variable.clone());
                let satisfies = match name.as_str() {
                    "contains_token" => Expr::eq(token, arg.clone()),
                    "contains_token_like" => lowered(PatternKind::Like, &token, arg),
                    _ => lowered(PatternKind::Regex, &token, arg),
                };
                let over = array.over(source, &rest[1..]);

                Some(Expr::any(array.variable.clone(), over, satisfies))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum SourceKind {
    Suffixes,
    Tokens,
}

// `ARRAY v FOR v IN SUFFIXES(x) END` or the TOKENS equivalent.
fn array_source(key: &Expr) -> Option<(SourceKind, &Expr, ArraySource)> {
    let Expr::ArrayMap { mapping, bindings, .. } = key else {
        return None;
    };
    let [binding] = bindings.as_slice() else {
        return None;
    };
    if !matches!(mapping.as_ref(), Expr::Var(v) if *v == binding.variable) {
        return None;
    }
    let Expr::Function { name, args } = binding.expr.as_ref() else {
        return None;
    };
    let (source, options) = args.split_first()?;

    let kind = match name.to_ascii_lowercase().as_str() {
        "suffixes" if options.is_empty() => SourceKind::Suffixes,
        "tokens" => SourceKind::Tokens,
        _ => return None,
    };
    let array = ArraySource {
        variable: binding.variable.clone(),
        function: name.clone(),
    };

    Some((kind, source, array))
}

fn quantified(
    array: &ArraySource,
    source: &Expr,
    kind: PatternKind,
    pattern: &str,
) -> Option<Expr> {
    let element = Expr::var(array.variable.clone());
    let pattern = Expr::Constant(Value::Text(pattern.to_string()));

    // Without a literal prefix the element predicate restricts nothing.
    let satisfies = lower_pattern(kind, &element, &pattern)?;

    Some(Expr::any(array.variable.clone(), array.over(source, &[]), satisfies))
}

fn lowered(kind: PatternKind, operand: &Expr, pattern: &Expr) -> Expr {
    lower_pattern(kind, operand, pattern).unwrap_or_else(|| Expr::Like {
        kind,
        operand: Box::new(operand.clone()),
        pattern: Box::new(pattern.clone()),
    })
}

/// Add an `ANY v IN SUFFIXES(x)` or `ANY v IN TOKENS(x)` conjunct beside
/// each pattern predicate over `x` that an array index of `indexes` can
/// serve. The result is true for exactly the rows `predicate` is true for.
///
/// Indexes whose condition `predicate` does not imply are ignored.
#[must_use]
pub fn expand_pattern_indexes(predicate: &Expr, indexes: &[IndexDef]) -> Expr {
    let found = PatternIndexes::collect(predicate, indexes);
    if found.is_empty() {
        return predicate.clone();
    }

    found.rewrite(predicate)
}
