use crate::plan::span::{ClassSet, Range, Sentinel};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Span
///
/// One range per composed index key, leading key first.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Span {
    pub ranges: Vec<Range>,
    pub exact: bool,
}

impl Span {
    #[must_use]
    pub const fn new(ranges: Vec<Range>) -> Self {
        Self {
            ranges,
            exact: true,
        }
    }

    #[must_use]
    pub fn single(range: Range) -> Self {
        Self::new(vec![range])
    }

    /// Exact only when the span and every range in it are exact.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact && self.ranges.iter().all(|r| r.exact)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(Range::is_empty)
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.ranges.len()
    }

    /// Every range is a point: the span is an equality lookup.
    #[must_use]
    pub fn is_equality(&self) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(Range::is_point)
    }

    /// Classes admitted on the leading key.
    #[must_use]
    pub fn leading_classes(&self) -> ClassSet {
        self.ranges.first().map_or(ClassSet::NONE, Range::classes)
    }

    /// The sentinel this span is equivalent to: a sentinel range on the
    /// leading key with every trailing key unrestricted.
    #[must_use]
    pub fn as_sentinel(&self) -> Option<Sentinel> {
        let (first, rest) = self.ranges.split_first()?;
        if !rest.iter().all(Range::is_whole) {
            return None;
        }

        let mut first = first.clone();
        first.exact = self.is_exact();
        Sentinel::of_range(&first)
    }

    /// Extend with unrestricted ranges up to `arity` keys.
    #[must_use]
    pub fn padded(mut self, arity: usize) -> Self {
        while self.ranges.len() < arity {
            self.ranges.push(Range::whole());
        }
        self
    }

    #[must_use]
    pub fn into_inexact(mut self) -> Self {
        self.exact = false;
        self
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{range}")?;
        }
        f.write_str("}")
    }
}
