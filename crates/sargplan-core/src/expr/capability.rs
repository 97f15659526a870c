use crate::{
    expr::{Binding, Expr, IsTest},
    value::Value,
};

///
/// Structural capabilities consumed by the planner.
///
/// Propagation vocabulary:
/// - "propagates missing": a MISSING operand makes the node MISSING
/// - "propagates null": a NULL or MISSING operand makes the node NULL or MISSING
///
/// Either property on the path to an operand means the node cannot be
/// TRUE unless that operand has the corresponding class excluded.
///

impl Expr {
    /// Direct children in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Self> {
        match self {
            Self::Constant(_) | Self::Field(_) | Self::Param(_) | Self::Var(_) => Vec::new(),
            Self::Compare { left, right, .. } | Self::Arith { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Self::Between { operand, low, high } => {
                vec![operand.as_ref(), low.as_ref(), high.as_ref()]
            }
            Self::Like {
                operand, pattern, ..
            } => vec![operand.as_ref(), pattern.as_ref()],
            Self::In { operand, list } => vec![operand.as_ref(), list.as_ref()],
            Self::And(operands) | Self::Or(operands) | Self::ArrayConstruct(operands) => {
                operands.iter().collect()
            }
            Self::Function { args, .. } => args.iter().collect(),
            Self::Not(operand) | Self::Is { operand, .. } | Self::TypeCheck { operand, .. } => {
                vec![operand.as_ref()]
            }
            Self::Collection {
                bindings,
                satisfies,
                ..
            } => bindings
                .iter()
                .map(|b| b.expr.as_ref())
                .chain(std::iter::once(satisfies.as_ref()))
                .collect(),
            Self::ArrayMap {
                mapping, bindings, ..
            } => bindings
                .iter()
                .map(|b| b.expr.as_ref())
                .chain(std::iter::once(mapping.as_ref()))
                .collect(),
            Self::VectorDistance { operand, query, .. } => vec![operand.as_ref(), query.as_ref()],
        }
    }

    /// Rebuild this node with every direct child passed through `f`.
    #[must_use]
    pub fn map_children(&self, mut f: impl FnMut(&Self) -> Self) -> Self {
        let mut bx = |e: &Self| Box::new(f(e));

        match self {
            Self::Constant(_) | Self::Field(_) | Self::Param(_) | Self::Var(_) => self.clone(),
            Self::Compare { op, left, right } => Self::Compare {
                op: *op,
                left: bx(left),
                right: bx(right),
            },
            Self::Arith { op, left, right } => Self::Arith {
                op: *op,
                left: bx(left),
                right: bx(right),
            },
            Self::Between { operand, low, high } => Self::Between {
                operand: bx(operand),
                low: bx(low),
                high: bx(high),
            },
            Self::Like {
                kind,
                operand,
                pattern,
            } => Self::Like {
                kind: *kind,
                operand: bx(operand),
                pattern: bx(pattern),
            },
            Self::In { operand, list } => Self::In {
                operand: bx(operand),
                list: bx(list),
            },
            Self::And(operands) => Self::And(operands.iter().map(|e| *bx(e)).collect()),
            Self::Or(operands) => Self::Or(operands.iter().map(|e| *bx(e)).collect()),
            Self::ArrayConstruct(operands) => {
                Self::ArrayConstruct(operands.iter().map(|e| *bx(e)).collect())
            }
            Self::Function { name, args } => Self::Function {
                name: name.clone(),
                args: args.iter().map(|e| *bx(e)).collect(),
            },
            Self::Not(operand) => Self::Not(bx(operand)),
            Self::Is { test, operand } => Self::Is {
                test: *test,
                operand: bx(operand),
            },
            Self::TypeCheck { kind, operand } => Self::TypeCheck {
                kind: *kind,
                operand: bx(operand),
            },
            Self::Collection {
                kind,
                bindings,
                satisfies,
            } => Self::Collection {
                kind: *kind,
                bindings: bindings
                    .iter()
                    .map(|b| Binding {
                        variable: b.variable.clone(),
                        expr: bx(&b.expr),
                    })
                    .collect(),
                satisfies: bx(satisfies),
            },
            Self::ArrayMap {
                distinct,
                mapping,
                bindings,
            } => Self::ArrayMap {
                distinct: *distinct,
                bindings: bindings
                    .iter()
                    .map(|b| Binding {
                        variable: b.variable.clone(),
                        expr: bx(&b.expr),
                    })
                    .collect(),
                mapping: bx(mapping),
            },
            Self::VectorDistance {
                metric,
                operand,
                query,
            } => Self::VectorDistance {
                metric: *metric,
                operand: bx(operand),
                query: bx(query),
            },
        }
    }

    /// Compile-time value of this expression, if it has one.
    #[must_use]
    pub fn static_value(&self) -> Option<Value> {
        match self {
            Self::Constant(v) => Some(v.clone()),
            Self::ArrayConstruct(items) => items
                .iter()
                .map(Self::static_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_true_constant(&self) -> bool {
        matches!(self, Self::Constant(Value::Bool(true)))
    }

    #[must_use]
    pub const fn is_false_constant(&self) -> bool {
        matches!(self, Self::Constant(Value::Bool(false)))
    }

    /// Fixed for the lifetime of one statement: no field or variable
    /// references. Parameters qualify even though their value is unknown.
    #[must_use]
    pub fn is_static(&self) -> bool {
        match self {
            Self::Field(_) | Self::Var(_) => false,
            Self::Constant(_) | Self::Param(_) => true,
            _ => self.children().into_iter().all(Self::is_static),
        }
    }

    /// Structural equivalence, tolerant of swapped comparison operands and
    /// AND/OR operand order.
    #[must_use]
    pub fn equivalent_to(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Compare {
                    op: a,
                    left: l1,
                    right: r1,
                },
                Self::Compare {
                    op: b,
                    left: l2,
                    right: r2,
                },
            ) => {
                (a == b && l1.equivalent_to(l2) && r1.equivalent_to(r2))
                    || (a.flip() == *b && l1.equivalent_to(r2) && r1.equivalent_to(l2))
            }
            (Self::And(xs), Self::And(ys)) | (Self::Or(xs), Self::Or(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().all(|x| ys.iter().any(|y| x.equivalent_to(y)))
                    && ys.iter().all(|y| xs.iter().any(|x| x.equivalent_to(y)))
            }
            (Self::Not(a), Self::Not(b)) => a.equivalent_to(b),
            _ => self == other,
        }
    }

    /// Whether `other` occurs anywhere inside this expression.
    /// A field path depends on each of its parent paths.
    #[must_use]
    pub fn depends_on(&self, other: &Self) -> bool {
        if self.equivalent_to(other) {
            return true;
        }

        if let (Self::Field(path), Self::Field(parent)) = (self, other)
            && path.len() > parent.len()
            && path.starts_with(parent.as_str())
            && path.as_bytes()[parent.len()] == b'.'
        {
            return true;
        }

        self.children().into_iter().any(|c| c.depends_on(other))
    }

    /// Whether this expression references bound variable `name` freely.
    #[must_use]
    pub fn references_variable(&self, name: &str) -> bool {
        match self {
            Self::Var(v) => v == name,
            Self::Collection {
                bindings,
                satisfies,
                ..
            } => binder_references(bindings, satisfies, name),
            Self::ArrayMap {
                bindings, mapping, ..
            } => binder_references(bindings, mapping, name),
            _ => self
                .children()
                .into_iter()
                .any(|c| c.references_variable(name)),
        }
    }

    /// A MISSING operand makes this node MISSING.
    #[must_use]
    pub const fn propagates_missing(&self) -> bool {
        match self {
            Self::Field(_)
            | Self::Compare { .. }
            | Self::Between { .. }
            | Self::Like { .. }
            | Self::In { .. }
            | Self::Not(_)
            | Self::TypeCheck { .. }
            | Self::Arith { .. }
            | Self::VectorDistance { .. }
            | Self::ArrayMap { .. } => true,
            Self::Is { test, .. } => matches!(test, IsTest::Null | IsTest::NotNull),
            _ => false,
        }
    }

    /// A NULL or MISSING operand makes this node NULL or MISSING.
    #[must_use]
    pub const fn propagates_null(&self) -> bool {
        matches!(
            self,
            Self::Field(_)
                | Self::Compare { .. }
                | Self::Between { .. }
                | Self::Like { .. }
                | Self::In { .. }
                | Self::Not(_)
                | Self::TypeCheck { .. }
                | Self::Arith { .. }
                | Self::VectorDistance { .. }
                | Self::ArrayMap { .. }
        )
    }

    /// A MISSING `operand` keeps this node from being TRUE.
    #[must_use]
    pub fn propagates_missing_from(&self, operand: &Self) -> bool {
        if self.equivalent_to(operand) {
            return true;
        }

        if let (Self::Field(_), Self::Field(_)) = (self, operand) {
            return self.depends_on(operand);
        }

        (self.propagates_missing() || self.propagates_null())
            && self
                .propagating_children()
                .into_iter()
                .any(|c| c.propagates_missing_from(operand))
    }

    /// A NULL or MISSING `operand` keeps this node from being TRUE.
    #[must_use]
    pub fn propagates_null_from(&self, operand: &Self) -> bool {
        if self.equivalent_to(operand) {
            return true;
        }

        if let (Self::Field(_), Self::Field(_)) = (self, operand) {
            return self.depends_on(operand);
        }

        self.propagates_null()
            && self
                .propagating_children()
                .into_iter()
                .any(|c| c.propagates_null_from(operand))
    }

    // Children an unknown operand can flow out of. Array mappings only
    // propagate through their source arrays, not the per-element mapping.
    fn propagating_children(&self) -> Vec<&Self> {
        match self {
            Self::ArrayMap { bindings, .. } => bindings.iter().map(|b| b.expr.as_ref()).collect(),
            _ => self.children(),
        }
    }

    /// Rename free occurrences of variable `from` to `to`.
    #[must_use]
    pub fn rename_variable(&self, from: &str, to: &str) -> Self {
        match self {
            Self::Var(v) if v == from => Self::Var(to.to_string()),
            Self::Collection {
                kind,
                bindings,
                satisfies,
            } => {
                let shadowed = bindings.iter().any(|b| b.variable == from);
                Self::Collection {
                    kind: *kind,
                    bindings: rename_bindings(bindings, from, to),
                    satisfies: Box::new(if shadowed {
                        satisfies.as_ref().clone()
                    } else {
                        satisfies.rename_variable(from, to)
                    }),
                }
            }
            Self::ArrayMap {
                distinct,
                mapping,
                bindings,
            } => {
                let shadowed = bindings.iter().any(|b| b.variable == from);
                Self::ArrayMap {
                    distinct: *distinct,
                    bindings: rename_bindings(bindings, from, to),
                    mapping: Box::new(if shadowed {
                        mapping.as_ref().clone()
                    } else {
                        mapping.rename_variable(from, to)
                    }),
                }
            }
            _ => self.map_children(|c| c.rename_variable(from, to)),
        }
    }
}

fn binder_references(bindings: &[Binding], body: &Expr, name: &str) -> bool {
    bindings.iter().any(|b| b.expr.references_variable(name))
        || (!bindings.iter().any(|b| b.variable == name) && body.references_variable(name))
}

fn rename_bindings(bindings: &[Binding], from: &str, to: &str) -> Vec<Binding> {
    bindings
        .iter()
        .map(|b| Binding {
            variable: b.variable.clone(),
            expr: Box::new(b.expr.rename_variable(from, to)),
        })
        .collect()
}
