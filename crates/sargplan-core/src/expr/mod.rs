//! Predicate expression tree.
//!
//! Trees are immutable values; every rewrite returns a new tree.

mod capability;
mod display;
pub mod eval;

#[cfg(test)]
mod tests;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator with its operands swapped: `a < b` is `b > a`.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// Whether an ordering between the operands satisfies the operator.
    #[must_use]
    pub const fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ord, Ordering::Equal),
            Self::Ne => !matches!(ord, Ordering::Equal),
            Self::Lt => matches!(ord, Ordering::Less),
            Self::Le => !matches!(ord, Ordering::Greater),
            Self::Gt => matches!(ord, Ordering::Greater),
            Self::Ge => !matches!(ord, Ordering::Less),
        }
    }
}

///
/// PatternKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PatternKind {
    Like,
    Regex,
}

///
/// IsTest
/// The IS [NOT] NULL / MISSING / VALUED family.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum IsTest {
    Null,
    NotNull,
    Missing,
    NotMissing,
    Valued,
    NotValued,
}

impl IsTest {
    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::Null => Self::NotNull,
            Self::NotNull => Self::Null,
            Self::Missing => Self::NotMissing,
            Self::NotMissing => Self::Missing,
            Self::Valued => Self::NotValued,
            Self::NotValued => Self::Valued,
        }
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Null => "IS NULL",
            Self::NotNull => "IS NOT NULL",
            Self::Missing => "IS MISSING",
            Self::NotMissing => "IS NOT MISSING",
            Self::Valued => "IS VALUED",
            Self::NotValued => "IS NOT VALUED",
        }
    }
}

///
/// TypeKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum TypeKind {
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl TypeKind {
    #[must_use]
    pub const fn function_name(self) -> &'static str {
        match self {
            Self::Boolean => "IS_BOOLEAN",
            Self::Number => "IS_NUMBER",
            Self::String => "IS_STRING",
            Self::Array => "IS_ARRAY",
            Self::Object => "IS_OBJECT",
        }
    }
}

///
/// CollectionKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CollectionKind {
    Any,
    AnyEvery,
    Every,
}

///
/// ArithOp
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

///
/// VectorMetric
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum VectorMetric {
    L2,
    Cosine,
    Dot,
}

impl VectorMetric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::Dot => "dot",
        }
    }
}

///
/// Binding
/// `variable IN expr` inside a collection predicate or array mapping.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Binding {
    pub variable: String,
    pub expr: Box<Expr>,
}

impl Binding {
    #[must_use]
    pub fn new(variable: impl Into<String>, expr: Expr) -> Self {
        Self {
            variable: variable.into(),
            expr: Box::new(expr),
        }
    }
}

///
/// Expr
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Expr {
    Constant(Value),
    Field(String),
    Param(String),
    Var(String),
    Compare {
        op: CompareOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    Between {
        operand: Box<Self>,
        low: Box<Self>,
        high: Box<Self>,
    },
    Like {
        kind: PatternKind,
        operand: Box<Self>,
        pattern: Box<Self>,
    },
    In {
        operand: Box<Self>,
        list: Box<Self>,
    },
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Is {
        test: IsTest,
        operand: Box<Self>,
    },
    TypeCheck {
        kind: TypeKind,
        operand: Box<Self>,
    },
    Collection {
        kind: CollectionKind,
        bindings: Vec<Binding>,
        satisfies: Box<Self>,
    },
    ArrayMap {
        distinct: bool,
        mapping: Box<Self>,
        bindings: Vec<Binding>,
    },
    ArrayConstruct(Vec<Self>),
    Function {
        name: String,
        args: Vec<Self>,
    },
    Arith {
        op: ArithOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    VectorDistance {
        metric: VectorMetric,
        operand: Box<Self>,
        query: Box<Self>,
    },
}

impl Expr {
    pub const TRUE: Self = Self::Constant(Value::Bool(true));
    pub const FALSE: Self = Self::Constant(Value::Bool(false));

    //
    // Leaves
    //

    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Param(name.into())
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    //
    // Comparisons
    //

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    #[must_use]
    pub fn ne(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Ne, left, right)
    }

    #[must_use]
    pub fn lt(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Lt, left, right)
    }

    #[must_use]
    pub fn le(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Le, left, right)
    }

    #[must_use]
    pub fn gt(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Gt, left, right)
    }

    #[must_use]
    pub fn ge(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Ge, left, right)
    }

    #[must_use]
    pub fn between(operand: Self, low: Self, high: Self) -> Self {
        Self::Between {
            operand: Box::new(operand),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    #[must_use]
    pub fn like(operand: Self, pattern: impl Into<String>) -> Self {
        Self::Like {
            kind: PatternKind::Like,
            operand: Box::new(operand),
            pattern: Box::new(Self::Constant(Value::Text(pattern.into()))),
        }
    }

    #[must_use]
    pub fn regex_like(operand: Self, pattern: impl Into<String>) -> Self {
        Self::Like {
            kind: PatternKind::Regex,
            operand: Box::new(operand),
            pattern: Box::new(Self::Constant(Value::Text(pattern.into()))),
        }
    }

    #[must_use]
    pub fn in_list(operand: Self, list: Self) -> Self {
        Self::In {
            operand: Box::new(operand),
            list: Box::new(list),
        }
    }

    //
    // Logic
    //

    #[must_use]
    pub const fn and(operands: Vec<Self>) -> Self {
        Self::And(operands)
    }

    #[must_use]
    pub const fn or(operands: Vec<Self>) -> Self {
        Self::Or(operands)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Self) -> Self {
        Self::Not(Box::new(operand))
    }

    #[must_use]
    pub fn is(test: IsTest, operand: Self) -> Self {
        Self::Is {
            test,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn type_check(kind: TypeKind, operand: Self) -> Self {
        Self::TypeCheck {
            kind,
            operand: Box::new(operand),
        }
    }

    //
    // Collections
    //

    /// `ANY variable IN over SATISFIES satisfies END`
    #[must_use]
    pub fn any(variable: impl Into<String>, over: Self, satisfies: Self) -> Self {
        Self::collection(CollectionKind::Any, variable, over, satisfies)
    }

    #[must_use]
    pub fn any_every(variable: impl Into<String>, over: Self, satisfies: Self) -> Self {
        Self::collection(CollectionKind::AnyEvery, variable, over, satisfies)
    }

    #[must_use]
    pub fn every(variable: impl Into<String>, over: Self, satisfies: Self) -> Self {
        Self::collection(CollectionKind::Every, variable, over, satisfies)
    }

    #[must_use]
    pub fn collection(
        kind: CollectionKind,
        variable: impl Into<String>,
        over: Self,
        satisfies: Self,
    ) -> Self {
        Self::Collection {
            kind,
            bindings: vec![Binding::new(variable, over)],
            satisfies: Box::new(satisfies),
        }
    }

    /// `[DISTINCT] ARRAY mapping FOR variable IN over END`
    #[must_use]
    pub fn array_map(
        distinct: bool,
        mapping: Self,
        variable: impl Into<String>,
        over: Self,
    ) -> Self {
        Self::ArrayMap {
            distinct,
            mapping: Box::new(mapping),
            bindings: vec![Binding::new(variable, over)],
        }
    }

    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn arith(op: ArithOp, left: Self, right: Self) -> Self {
        Self::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn vector_distance(metric: VectorMetric, operand: Self, query: Self) -> Self {
        Self::VectorDistance {
            metric,
            operand: Box::new(operand),
            query: Box::new(query),
        }
    }

    /// The canonical string form, used as a dedup and sort key.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}
