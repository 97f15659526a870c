use crate::{
    expr::Expr,
    plan::span::{ClassSet, Inclusion},
    value::{Value, collation_cmp},
};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Selectivity placeholder when the cost model has no estimate.
pub const SELECTIVITY_UNKNOWN: f64 = -1.0;

///
/// Range
///
/// One-dimensional restriction on a single index key. An absent `low`
/// starts below MISSING; an absent `high` ends above every object.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Range {
    pub low: Option<Expr>,
    pub high: Option<Expr>,
    pub inclusion: Inclusion,
    pub exact: bool,
    pub selec1: f64,
    pub selec2: f64,
}

///
/// BoundChoice
/// Outcome of comparing two bounds for restrictiveness.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BoundChoice {
    Left,
    Right,
    Both,
    Unknown,
}

// Bound view used for comparisons. Absent bounds are the extremes.
enum Bound<'a> {
    Unbounded,
    Static(Value),
    Dynamic(&'a Expr),
}

impl<'a> Bound<'a> {
    fn of(expr: Option<&'a Expr>) -> Self {
        match expr {
            None => Self::Unbounded,
            Some(e) => e.static_value().map_or(Self::Dynamic(e), Self::Static),
        }
    }
}

impl Range {
    /// Build an exact range. An inclusive MISSING low bound is stored as absent.
    #[must_use]
    pub fn new(low: Option<Expr>, high: Option<Expr>, inclusion: Inclusion) -> Self {
        let low = match low {
            Some(Expr::Constant(Value::Missing)) if inclusion.low() => None,
            other => other,
        };

        Self {
            low,
            high,
            inclusion,
            exact: true,
            selec1: SELECTIVITY_UNKNOWN,
            selec2: SELECTIVITY_UNKNOWN,
        }
    }

    #[must_use]
    pub fn whole() -> Self {
        Self::new(None, None, Inclusion::NEITHER)
    }

    #[must_use]
    pub fn point(value: Expr) -> Self {
        Self::new(Some(value.clone()), Some(value), Inclusion::BOTH)
    }

    #[must_use]
    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    #[must_use]
    pub const fn with_selectivity(mut self, selec1: f64, selec2: f64) -> Self {
        self.selec1 = selec1;
        self.selec2 = selec2;
        self
    }

    #[must_use]
    pub const fn is_whole(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// Equality range: identical bounds, both inclusive.
    #[must_use]
    pub fn is_point(&self) -> bool {
        match (&self.low, &self.high) {
            (Some(low), Some(high)) => self.inclusion == Inclusion::BOTH && low.equivalent_to(high),
            _ => false,
        }
    }

    /// Provably admits no value. Dynamic bounds are never provably empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let low = match Bound::of(self.low.as_ref()) {
            Bound::Unbounded => Value::Missing,
            Bound::Static(v) => v,
            Bound::Dynamic(_) => return false,
        };
        let Bound::Static(high) = Bound::of(self.high.as_ref()) else {
            return false;
        };
        let low_incl = self.low.is_none() || self.inclusion.low();

        match collation_cmp(&low, &high) {
            Ordering::Greater => true,
            Ordering::Equal => !(low_incl && self.inclusion.high()),
            Ordering::Less => false,
        }
    }

    /// Whether a static value falls inside the range.
    /// `None` when a bound is dynamic.
    #[must_use]
    pub fn contains(&self, value: &Value) -> Option<bool> {
        let above_low = match Bound::of(self.low.as_ref()) {
            Bound::Unbounded => true,
            Bound::Static(low) => match collation_cmp(value, &low) {
                Ordering::Greater => true,
                Ordering::Equal => self.inclusion.low(),
                Ordering::Less => false,
            },
            Bound::Dynamic(_) => return None,
        };
        let below_high = match Bound::of(self.high.as_ref()) {
            Bound::Unbounded => true,
            Bound::Static(high) => match collation_cmp(value, &high) {
                Ordering::Less => true,
                Ordering::Equal => self.inclusion.high(),
                Ordering::Greater => false,
            },
            Bound::Dynamic(_) => return None,
        };

        Some(above_low && below_high)
    }

    /// Value classes this range may intersect. Over-approximates when a
    /// bound is dynamic.
    #[must_use]
    pub fn classes(&self) -> ClassSet {
        if self.is_empty() {
            return ClassSet::NONE;
        }

        let low = Bound::of(self.low.as_ref());
        let high = Bound::of(self.high.as_ref());

        let missing = !matches!(low, Bound::Static(_));
        let low_reaches_null = match &low {
            Bound::Static(v) => match collation_cmp(v, &Value::Null) {
                Ordering::Less => true,
                Ordering::Equal => self.inclusion.low(),
                Ordering::Greater => false,
            },
            _ => true,
        };
        let (high_reaches_null, valued) = match &high {
            Bound::Static(v) => match collation_cmp(v, &Value::Null) {
                Ordering::Greater => (true, true),
                Ordering::Equal => (self.inclusion.high(), false),
                Ordering::Less => (false, false),
            },
            _ => (true, true),
        };

        let mut classes = ClassSet::NONE;
        if missing {
            classes = classes.with(ClassSet::MISSING);
        }
        if low_reaches_null && high_reaches_null {
            classes = classes.with(ClassSet::NULL);
        }
        if valued {
            classes = classes.with(ClassSet::VALUED);
        }

        classes
    }

    /// Bounds swapped for a descending key.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            low: self.high.clone(),
            high: self.low.clone(),
            inclusion: self.inclusion.reversed(),
            exact: self.exact,
            selec1: self.selec2,
            selec2: self.selec1,
        }
    }

    /// Intersect two ranges on the same key. `None` when provably empty.
    /// A bound pair that cannot be ordered statically keeps the left bound
    /// and loses exactness.
    #[must_use]
    pub(crate) fn constrain(&self, other: &Self) -> Option<Self> {
        let low_choice = choose_low(self, other);
        let high_choice = choose_high(self, other);

        let (low, low_incl, selec1) = match low_choice {
            BoundChoice::Right => (other.low.clone(), other.inclusion.low(), other.selec1),
            BoundChoice::Both => (
                self.low.clone(),
                self.inclusion.low() && other.inclusion.low(),
                self.selec1,
            ),
            BoundChoice::Left | BoundChoice::Unknown => {
                (self.low.clone(), self.inclusion.low(), self.selec1)
            }
        };
        let (high, high_incl, selec2) = match high_choice {
            BoundChoice::Right => (other.high.clone(), other.inclusion.high(), other.selec2),
            BoundChoice::Both => (
                self.high.clone(),
                self.inclusion.high() && other.inclusion.high(),
                self.selec2,
            ),
            BoundChoice::Left | BoundChoice::Unknown => {
                (self.high.clone(), self.inclusion.high(), self.selec2)
            }
        };

        let known = low_choice != BoundChoice::Unknown && high_choice != BoundChoice::Unknown;
        let range = Self::new(low, high, Inclusion::new(low_incl, high_incl))
            .with_exact(self.exact && other.exact && known)
            .with_selectivity(selec1, selec2);

        if range.is_empty() { None } else { Some(range) }
    }
}

/// Pick the more restrictive (greater) low bound.
pub(crate) fn choose_low(left: &Range, right: &Range) -> BoundChoice {
    match (Bound::of(left.low.as_ref()), Bound::of(right.low.as_ref())) {
        (Bound::Unbounded, Bound::Unbounded) => BoundChoice::Both,
        (Bound::Unbounded, _) => BoundChoice::Right,
        (_, Bound::Unbounded) => BoundChoice::Left,
        (Bound::Static(l), Bound::Static(r)) => match collation_cmp(&l, &r) {
            Ordering::Greater => BoundChoice::Left,
            Ordering::Less => BoundChoice::Right,
            Ordering::Equal => BoundChoice::Both,
        },
        (Bound::Dynamic(l), Bound::Dynamic(r)) if l.equivalent_to(r) => BoundChoice::Both,
        _ => BoundChoice::Unknown,
    }
}

/// Pick the more restrictive (lesser) high bound.
pub(crate) fn choose_high(left: &Range, right: &Range) -> BoundChoice {
    match (Bound::of(left.high.as_ref()), Bound::of(right.high.as_ref())) {
        (Bound::Unbounded, Bound::Unbounded) => BoundChoice::Both,
        (Bound::Unbounded, _) => BoundChoice::Right,
        (_, Bound::Unbounded) => BoundChoice::Left,
        (Bound::Static(l), Bound::Static(r)) => match collation_cmp(&l, &r) {
            Ordering::Less => BoundChoice::Left,
            Ordering::Greater => BoundChoice::Right,
            Ordering::Equal => BoundChoice::Both,
        },
        (Bound::Dynamic(l), Bound::Dynamic(r)) if l.equivalent_to(r) => BoundChoice::Both,
        _ => BoundChoice::Unknown,
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.low {
            None => f.write_str("(-inf")?,
            Some(low) if self.inclusion.low() => write!(f, "[{low}")?,
            Some(low) => write!(f, "({low}")?,
        }
        f.write_str(", ")?;
        match &self.high {
            None => f.write_str("+inf)"),
            Some(high) if self.inclusion.high() => write!(f, "{high}]"),
            Some(high) => write!(f, "{high})"),
        }
    }
}
