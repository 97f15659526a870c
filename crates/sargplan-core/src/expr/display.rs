use crate::expr::{Binding, CollectionKind, Expr, PatternKind};
use std::fmt::{self, Display, Write};

// Canonical rendering. Pure function of structure; used as a dedup key.
impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Field(path) => f.write_str(path),
            Self::Param(name) => write!(f, "${name}"),
            Self::Var(name) => f.write_str(name),
            Self::Compare { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::Between { operand, low, high } => {
                write!(f, "({operand} BETWEEN {low} AND {high})")
            }
            Self::Like {
                kind: PatternKind::Like,
                operand,
                pattern,
            } => write!(f, "({operand} LIKE {pattern})"),
            Self::Like {
                kind: PatternKind::Regex,
                operand,
                pattern,
            } => write!(f, "REGEXP_LIKE({operand}, {pattern})"),
            Self::In { operand, list } => write!(f, "({operand} IN {list})"),
            Self::And(operands) => write_joined(f, operands, " AND "),
            Self::Or(operands) => write_joined(f, operands, " OR "),
            Self::Not(operand) => write!(f, "(NOT {operand})"),
            Self::Is { test, operand } => write!(f, "({operand} {})", test.keyword()),
            Self::TypeCheck { kind, operand } => {
                write!(f, "{}({operand})", kind.function_name())
            }
            Self::Collection {
                kind,
                bindings,
                satisfies,
            } => {
                let keyword = match kind {
                    CollectionKind::Any => "ANY",
                    CollectionKind::AnyEvery => "ANY AND EVERY",
                    CollectionKind::Every => "EVERY",
                };
                write!(
                    f,
                    "{keyword} {} SATISFIES {satisfies} END",
                    render_bindings(bindings)
                )
            }
            Self::ArrayMap {
                distinct,
                mapping,
                bindings,
            } => {
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                write!(f, "ARRAY {mapping} FOR {} END", render_bindings(bindings))
            }
            Self::ArrayConstruct(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Self::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_char(')')
            }
            Self::Arith { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Self::VectorDistance {
                metric,
                operand,
                query,
            } => write!(f, "VECTOR_DISTANCE({operand}, {query}, {:?})", metric.as_str()),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Expr], sep: &str) -> fmt::Result {
    if operands.is_empty() {
        // empty conjunction / disjunction never survives normalization
        return f.write_str(if sep == " AND " { "true" } else { "false" });
    }

    f.write_char('(')?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{operand}")?;
    }
    f.write_char(')')
}

fn render_bindings(bindings: &[Binding]) -> String {
    bindings
        .iter()
        .map(|b| format!("{} IN {}", b.variable, b.expr))
        .collect::<Vec<_>>()
        .join(", ")
}
