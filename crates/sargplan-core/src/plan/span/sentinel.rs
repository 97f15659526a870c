use crate::{
    expr::Expr,
    plan::span::{Inclusion, Range},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// ClassSet
///
/// Set of value classes a span admits: MISSING, NULL and VALUED
/// (anything that is neither).
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassSet(u8);

impl ClassSet {
    pub const NONE: Self = Self(0);
    pub const MISSING: Self = Self(1);
    pub const NULL: Self = Self(2);
    pub const VALUED: Self = Self(4);
    pub const ALL: Self = Self(7);

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

///
/// Sentinel
///
/// Frozen special-case spans. Algebra over sentinels reduces to set
/// algebra over their class sets; exactness travels separately.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Sentinel {
    /// The predicate implies the key without bounding it.
    SelfSpan,
    Whole,
    ExactWhole,
    Full,
    ExactFull,
    Valued,
    ExactValued,
    Null,
    Missing,
    NotValued,
    Empty,
}

impl Sentinel {
    pub const ALL: [Self; 11] = [
        Self::SelfSpan,
        Self::Whole,
        Self::ExactWhole,
        Self::Full,
        Self::ExactFull,
        Self::Valued,
        Self::ExactValued,
        Self::Null,
        Self::Missing,
        Self::NotValued,
        Self::Empty,
    ];

    #[must_use]
    pub const fn classes(self) -> ClassSet {
        match self {
            Self::SelfSpan | Self::Whole | Self::ExactWhole => ClassSet::ALL,
            Self::Full | Self::ExactFull => ClassSet::NULL.with(ClassSet::VALUED),
            Self::Valued | Self::ExactValued => ClassSet::VALUED,
            Self::Null => ClassSet::NULL,
            Self::Missing => ClassSet::MISSING,
            Self::NotValued => ClassSet::MISSING.with(ClassSet::NULL),
            Self::Empty => ClassSet::NONE,
        }
    }

    #[must_use]
    pub const fn is_exact(self) -> bool {
        !matches!(self, Self::Whole | Self::Full | Self::Valued)
    }

    /// Exact and inexact forms exist for every class set except the
    /// single-range MISSING/NULL/NOT_VALUED sets, which are exact only.
    #[must_use]
    pub const fn from_classes(classes: ClassSet, exact: bool) -> Option<Self> {
        let sentinel = match (classes.0, exact) {
            (0, _) => Self::Empty,
            (7, true) => Self::ExactWhole,
            (7, false) => Self::Whole,
            (6, true) => Self::ExactFull,
            (6, false) => Self::Full,
            (4, true) => Self::ExactValued,
            (4, false) => Self::Valued,
            (2, true) => Self::Null,
            (1, true) => Self::Missing,
            (3, true) => Self::NotValued,
            _ => return None,
        };

        Some(sentinel)
    }

    /// The inexact counterpart, if one exists.
    #[must_use]
    pub const fn inexact(self) -> Option<Self> {
        match self {
            Self::SelfSpan | Self::Whole | Self::ExactWhole => Some(Self::Whole),
            Self::Full | Self::ExactFull => Some(Self::Full),
            Self::Valued | Self::ExactValued => Some(Self::Valued),
            Self::Empty => Some(Self::Empty),
            Self::Null | Self::Missing | Self::NotValued => None,
        }
    }

    /// Ranges realizing this sentinel on one key. EMPTY has none; MISSING
    /// together with VALUED needs two.
    #[must_use]
    pub fn ranges(self) -> Vec<Range> {
        class_ranges(self.classes())
            .into_iter()
            .map(|r| r.with_exact(self.is_exact()))
            .collect()
    }

    /// Recognize a range that is exactly a sentinel's range.
    #[must_use]
    pub fn of_range(range: &Range) -> Option<Self> {
        let low = range.low.as_ref().map(Expr::static_value);
        let high = range.high.as_ref().map(Expr::static_value);
        let incl = range.inclusion;

        let classes = match (low, high) {
            (None, None) => ClassSet::ALL,
            (Some(Some(Value::Null)), None) if incl.low() => ClassSet::NULL.with(ClassSet::VALUED),
            (Some(Some(Value::Null)), None) => ClassSet::VALUED,
            (Some(Some(Value::Null)), Some(Some(Value::Null))) if incl == Inclusion::BOTH => {
                ClassSet::NULL
            }
            (None, Some(Some(Value::Missing))) if incl.high() => ClassSet::MISSING,
            (None, Some(Some(Value::Null))) if incl.high() => {
                ClassSet::MISSING.with(ClassSet::NULL)
            }
            _ => return None,
        };

        Self::from_classes(classes, range.exact)
    }
}

/// Ranges covering exactly the given classes on one key.
#[must_use]
pub fn class_ranges(classes: ClassSet) -> Vec<Range> {
    let null = || Some(Expr::Constant(Value::Null));
    let missing = || Some(Expr::Constant(Value::Missing));

    match classes.0 {
        0 => Vec::new(),
        1 => vec![Range::new(None, missing(), Inclusion::BOTH)],
        2 => vec![Range::new(null(), null(), Inclusion::BOTH)],
        3 => vec![Range::new(None, null(), Inclusion::BOTH)],
        4 => vec![Range::new(null(), None, Inclusion::NEITHER)],
        5 => vec![
            Range::new(None, missing(), Inclusion::BOTH),
            Range::new(null(), None, Inclusion::NEITHER),
        ],
        6 => vec![Range::new(null(), None, Inclusion::LOW)],
        _ => vec![Range::whole()],
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SelfSpan => "SELF",
            Self::Whole => "WHOLE",
            Self::ExactWhole => "EXACT_WHOLE",
            Self::Full => "FULL",
            Self::ExactFull => "EXACT_FULL",
            Self::Valued => "VALUED",
            Self::ExactValued => "EXACT_VALUED",
            Self::Null => "NULL",
            Self::Missing => "MISSING",
            Self::NotValued => "NOT_VALUED",
            Self::Empty => "EMPTY",
        };
        f.write_str(label)
    }
}
