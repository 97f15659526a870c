use crate::{
    expr::{Expr, VectorMetric},
    plan::span::{ClassSet, Range, Sentinel, Span, class_ranges},
};
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// VectorSearch
/// Nearest-neighbour side channel carried by vector-key spans.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct VectorSearch {
    pub metric: VectorMetric,
    pub query: Expr,
}

///
/// TermSpans
///
/// Concrete span list. Each span is one scan; the scans are OR-ed.
///

#[derive(Clone, Debug, Default, Deref, Deserialize, IntoIterator, PartialEq, Serialize)]
pub struct TermSpans {
    #[deref]
    #[into_iterator(owned, ref)]
    pub spans: Vec<Span>,

    pub vector: Option<VectorSearch>,

    /// Position of the array key whose per-element spans are in this set.
    pub array_id: Option<usize>,
}

impl TermSpans {
    #[must_use]
    pub const fn new(spans: Vec<Span>) -> Self {
        Self {
            spans,
            vector: None,
            array_id: None,
        }
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.spans.iter().all(Span::is_exact)
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.spans.iter().map(Span::arity).max().unwrap_or(0)
    }

    #[must_use]
    pub fn padded(mut self, arity: usize) -> Self {
        self.spans = self.spans.into_iter().map(|s| s.padded(arity)).collect();
        self
    }

    // Side channels survive any combination; the first one present wins.
    pub(crate) fn absorb_side_channels(&mut self, other: &Self) {
        if self.vector.is_none() {
            self.vector.clone_from(&other.vector);
        }
        if self.array_id.is_none() {
            self.array_id = other.array_id;
        }
    }
}

///
/// UnionSpans
/// OR of independent scans.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UnionSpans {
    pub children: Vec<SargSpans>,
}

///
/// IntersectSpans
/// AND of scans over the same array key; results are intersected.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IntersectSpans {
    pub children: Vec<SargSpans>,
}

///
/// SargSpans
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum SargSpans {
    Sentinel(Sentinel),
    Term(TermSpans),
    Union(UnionSpans),
    Intersect(IntersectSpans),
}

impl SargSpans {
    pub const EMPTY: Self = Self::Sentinel(Sentinel::Empty);
    pub const WHOLE: Self = Self::Sentinel(Sentinel::Whole);
    pub const SELF: Self = Self::Sentinel(Sentinel::SelfSpan);

    #[must_use]
    pub fn term(spans: Vec<Span>) -> Self {
        Self::Term(TermSpans::new(spans))
    }

    /// Sentinel for a class set when one exists, else the equivalent term.
    #[must_use]
    pub fn of_classes(classes: ClassSet, exact: bool) -> Self {
        match Sentinel::from_classes(classes, exact) {
            Some(sentinel) => Self::Sentinel(sentinel),
            None => Self::term(
                class_ranges(classes)
                    .into_iter()
                    .map(|r| Span::single(r.with_exact(exact)))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        match self {
            Self::Sentinel(s) => s.is_exact(),
            Self::Term(t) => t.is_exact(),
            Self::Union(u) => u.children.iter().all(Self::is_exact),
            Self::Intersect(i) => i.children.iter().all(Self::is_exact),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Sentinel(Sentinel::Empty))
    }

    /// Unrestricted on every key (SELF included).
    #[must_use]
    pub const fn is_whole(&self) -> bool {
        matches!(
            self,
            Self::Sentinel(Sentinel::SelfSpan | Sentinel::Whole | Sentinel::ExactWhole)
        )
    }

    /// Number of scans.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Sentinel(Sentinel::Empty) => 0,
            Self::Sentinel(_) => 1,
            Self::Term(t) => t.len(),
            Self::Union(u) => u.children.iter().map(Self::size).sum(),
            Self::Intersect(i) => i.children.iter().map(Self::size).sum(),
        }
    }

    /// Number of keys the spans restrict.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Sentinel(_) => 1,
            Self::Term(t) => t.arity(),
            Self::Union(u) => u.children.iter().map(Self::arity).max().unwrap_or(0),
            Self::Intersect(i) => i.children.iter().map(Self::arity).max().unwrap_or(0),
        }
    }

    /// Leading-key classes; over-approximates.
    #[must_use]
    pub fn classes(&self) -> ClassSet {
        match self {
            Self::Sentinel(s) => s.classes(),
            Self::Term(t) => t
                .iter()
                .fold(ClassSet::NONE, |acc, s| acc.with(s.leading_classes())),
            Self::Union(u) => u
                .children
                .iter()
                .fold(ClassSet::NONE, |acc, c| acc.with(c.classes())),
            Self::Intersect(i) => i
                .children
                .iter()
                .fold(ClassSet::NONE, |acc, c| acc.with(c.classes())),
        }
    }

    /// Same spans, exactness dropped. Sentinels without an inexact form
    /// are materialized.
    #[must_use]
    pub fn into_inexact(self) -> Self {
        match self {
            Self::Sentinel(s) => match s.inexact() {
                Some(inexact) => Self::Sentinel(inexact),
                None => Self::Term(Self::Sentinel(s).into_term(1)).into_inexact(),
            },
            Self::Term(mut t) => {
                t.spans = t.spans.into_iter().map(Span::into_inexact).collect();
                Self::Term(t)
            }
            Self::Union(u) => Self::Union(UnionSpans {
                children: u.children.into_iter().map(Self::into_inexact).collect(),
            }),
            Self::Intersect(i) => Self::Intersect(IntersectSpans {
                children: i.children.into_iter().map(Self::into_inexact).collect(),
            }),
        }
    }

    /// Materialize as a term list over `arity` keys. Union and intersect
    /// sets are not terms; they flatten into the union of their scans,
    /// which is only exact for unions.
    #[must_use]
    pub fn into_term(self, arity: usize) -> TermSpans {
        match self {
            Self::Sentinel(Sentinel::SelfSpan) => TermSpans::new(vec![
                Span::single(Range::whole()).padded(arity),
            ]),
            Self::Sentinel(s) => TermSpans::new(
                s.ranges()
                    .into_iter()
                    .map(|r| Span::single(r).padded(arity))
                    .collect(),
            ),
            Self::Term(t) => t.padded(arity),
            Self::Union(u) => {
                let mut out = TermSpans::default();
                for child in u.children {
                    let term = child.into_term(arity);
                    out.absorb_side_channels(&term);
                    out.spans.extend(term.spans);
                }
                out
            }
            Self::Intersect(i) => {
                let mut out = TermSpans::default();
                for child in i.children {
                    let term = child.into_term(arity);
                    out.absorb_side_channels(&term);
                    out.spans
                        .extend(term.spans.into_iter().map(Span::into_inexact));
                }
                out
            }
        }
    }

    /// Pad every term to `arity` keys.
    #[must_use]
    pub fn padded(self, arity: usize) -> Self {
        match self {
            Self::Sentinel(_) if arity <= 1 => self,
            Self::Sentinel(Sentinel::Empty) => self,
            Self::Sentinel(_) => Self::Term(self.into_term(arity)),
            Self::Term(t) => Self::Term(t.padded(arity)),
            Self::Union(u) => Self::Union(UnionSpans {
                children: u.children.into_iter().map(|c| c.padded(arity)).collect(),
            }),
            Self::Intersect(i) => Self::Intersect(IntersectSpans {
                children: i.children.into_iter().map(|c| c.padded(arity)).collect(),
            }),
        }
    }

    /// Reverse the ranges of descending key positions. A bounded sentinel
    /// on a descending leading key is materialized first. EMPTY, SELF and
    /// WHOLE carry no bounds and stay as they are.
    #[must_use]
    pub fn with_descending(self, desc: &[bool]) -> Self {
        if !desc.iter().any(|d| *d) {
            return self;
        }

        match self {
            Self::Sentinel(
                Sentinel::Empty | Sentinel::SelfSpan | Sentinel::Whole | Sentinel::ExactWhole,
            ) => self,
            Self::Sentinel(_) if desc.first().copied().unwrap_or(false) => {
                Self::Term(self.into_term(1)).with_descending(desc)
            }
            Self::Sentinel(_) => self,
            Self::Term(mut t) => {
                for span in &mut t.spans {
                    for (range, is_desc) in span.ranges.iter_mut().zip(desc) {
                        if *is_desc {
                            *range = range.reversed();
                        }
                    }
                }
                Self::Term(t)
            }
            Self::Union(u) => Self::Union(UnionSpans {
                children: u
                    .children
                    .into_iter()
                    .map(|c| c.with_descending(desc))
                    .collect(),
            }),
            Self::Intersect(i) => Self::Intersect(IntersectSpans {
                children: i
                    .children
                    .into_iter()
                    .map(|c| c.with_descending(desc))
                    .collect(),
            }),
        }
    }

    /// Whether a scan over these spans returns entries in index order.
    #[must_use]
    pub fn preserves_order(&self) -> bool {
        match self {
            Self::Sentinel(_) => true,
            Self::Term(t) => t.len() <= 1 || t.array_id.is_none(),
            Self::Union(_) | Self::Intersect(_) => false,
        }
    }

    /// Whether one document may be returned more than once.
    #[must_use]
    pub fn may_duplicate(&self) -> bool {
        match self {
            Self::Sentinel(_) => false,
            Self::Term(t) => t.array_id.is_some(),
            Self::Union(_) | Self::Intersect(_) => true,
        }
    }

    #[must_use]
    pub const fn vector(&self) -> Option<&VectorSearch> {
        match self {
            Self::Term(t) => t.vector.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for SargSpans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentinel(s) => write!(f, "{s}"),
            Self::Term(t) => {
                f.write_str("[")?;
                for (i, span) in t.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{span}")?;
                }
                f.write_str("]")
            }
            Self::Union(u) => write_children(f, "UNION", &u.children),
            Self::Intersect(i) => write_children(f, "INTERSECT", &i.children),
        }
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, label: &str, children: &[SargSpans]) -> fmt::Result {
    write!(f, "{label}(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}
