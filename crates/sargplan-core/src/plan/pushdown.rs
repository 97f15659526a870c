//! Module: plan::pushdown
//! Responsibility: which query clauses a candidate scan can absorb.
//! Does not own: span derivation or candidate ranking.

use crate::{
    expr::Expr,
    plan::{
        index::{IndexApi, IndexDef},
        span::SargSpans,
    },
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// PushdownFlags
///
/// Bitmask of clauses delegated to the index scan. Numerically larger
/// masks rank higher.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PushdownFlags(u32);

impl PushdownFlags {
    pub const NONE: Self = Self(0);
    pub const DISTINCT: Self = Self(1);
    pub const EXACTSPANS: Self = Self(1 << 1);
    pub const LIMIT: Self = Self(1 << 2);
    pub const OFFSET: Self = Self(1 << 3);
    pub const ORDER: Self = Self(1 << 4);
    pub const GROUPAGGS: Self = Self(1 << 5);
    pub const FULLGROUPAGGS: Self = Self(1 << 6);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::DISTINCT, "DISTINCT"),
        (Self::EXACTSPANS, "EXACTSPANS"),
        (Self::LIMIT, "LIMIT"),
        (Self::OFFSET, "OFFSET"),
        (Self::ORDER, "ORDER"),
        (Self::GROUPAGGS, "GROUPAGGS"),
        (Self::FULLGROUPAGGS, "FULLGROUPAGGS"),
    ];

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl fmt::Display for PushdownFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }

        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}

///
/// OrderTerm
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OrderTerm {
    pub expr: Expr,
    pub desc: bool,
}

impl OrderTerm {
    #[must_use]
    pub const fn asc(expr: Expr) -> Self {
        Self { expr, desc: false }
    }

    #[must_use]
    pub const fn desc(expr: Expr) -> Self {
        Self { expr, desc: true }
    }
}

///
/// QueryShape
///
/// The clauses around the predicate that a scan may absorb. `distinct`
/// holds the projection of a SELECT DISTINCT.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct QueryShape {
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: Option<Vec<Expr>>,
    pub group: Option<Vec<Expr>>,
}

impl QueryShape {
    #[must_use]
    pub fn with_order(mut self, order: Vec<OrderTerm>) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_distinct(mut self, projection: Vec<Expr>) -> Self {
        self.distinct = Some(projection);
        self
    }

    #[must_use]
    pub fn with_group(mut self, keys: Vec<Expr>) -> Self {
        self.group = Some(keys);
        self
    }

    /// The query sorts or groups outside the scan unless pushed down.
    #[must_use]
    pub fn needs_order(&self) -> bool {
        !self.order.is_empty()
    }
}

/// Pushdowns a scan of `spans` over `index` supports for `shape`.
pub(crate) fn pushdown_flags(
    index: &IndexDef,
    spans: &SargSpans,
    exact: bool,
    shape: &QueryShape,
) -> PushdownFlags {
    let mut flags = PushdownFlags::NONE;
    if !exact {
        // Nothing else is safe to delegate while a residual filter runs.
        if order_matches(index, spans, shape) && shape.group.is_none() {
            flags.insert(PushdownFlags::ORDER);
        }
        return flags;
    }
    flags.insert(PushdownFlags::EXACTSPANS);

    let eq_keys = leading_equalities(spans).min(index.keys.len());
    if let Some(group) = &shape.group
        && group_aggs(index, group)
    {
        flags.insert(PushdownFlags::GROUPAGGS);
        if leading_group(index, group, eq_keys) {
            flags.insert(PushdownFlags::FULLGROUPAGGS);
        }
    }

    if let Some(projection) = &shape.distinct
        && (shape.group.is_none() || flags.contains(PushdownFlags::GROUPAGGS))
        && distinct(index, projection)
    {
        flags.insert(PushdownFlags::DISTINCT);
    }

    let full_group = flags.contains(PushdownFlags::FULLGROUPAGGS);
    let mut exact_limit_offset = true;
    if shape.needs_order() {
        if order_matches(index, spans, shape) && (shape.group.is_none() || full_group) {
            flags.insert(PushdownFlags::ORDER);
        } else {
            exact_limit_offset = false;
        }
    } else if shape.group.is_some() && !full_group {
        exact_limit_offset = false;
    }

    if shape.limit.is_some() && exact_limit_offset {
        flags.insert(PushdownFlags::LIMIT);
    }
    if shape.offset.is_some()
        && exact_limit_offset
        && index.api.allows_offset()
        && !index.has_array_key()
        && spans.size() == 1
        && matches!(spans, SargSpans::Term(_) | SargSpans::Sentinel(_))
    {
        flags.insert(PushdownFlags::OFFSET);
    }

    flags
}

/// Number of leading keys on which every scan is an equality.
#[must_use]
pub(crate) fn leading_equalities(spans: &SargSpans) -> usize {
    let mut n = 0;
    while equality_at(spans, n) {
        n += 1;
    }
    n
}

fn equality_at(spans: &SargSpans, position: usize) -> bool {
    match spans {
        SargSpans::Term(term) => {
            !term.is_empty()
                && term
                    .iter()
                    .all(|s| s.ranges.get(position).is_some_and(|r| r.is_point()))
        }
        SargSpans::Union(u) => {
            !u.children.is_empty() && u.children.iter().all(|c| equality_at(c, position))
        }
        SargSpans::Sentinel(_) | SargSpans::Intersect(_) => false,
    }
}

// ORDER BY terms must walk the index keys in order. A key pinned to one
// value by every scan, or an order term pinned by the index condition,
// may be skipped.
fn order_matches(index: &IndexDef, spans: &SargSpans, shape: &QueryShape) -> bool {
    if !shape.needs_order() || !spans.preserves_order() {
        return false;
    }

    let mut position = 0;
    'terms: for term in &shape.order {
        if term.expr.is_static() {
            continue;
        }

        loop {
            let Some(key) = index.keys.get(position) else {
                if index.condition_pins(&term.expr) {
                    continue 'terms;
                }
                return false;
            };

            if key.attrs.desc == term.desc && term.expr.equivalent_to(&key.expr) {
                position += 1;
                continue 'terms;
            }
            if index.condition_pins(&term.expr) {
                continue 'terms;
            }
            if equality_at(spans, position) {
                position += 1;
                continue;
            }

            return false;
        }
    }

    true
}

fn is_index_key(index: &IndexDef, expr: &Expr) -> bool {
    index.keys.iter().any(|k| k.expr.equivalent_to(expr))
}

fn group_aggs(index: &IndexDef, group: &[Expr]) -> bool {
    index.api.allows_group_aggs()
        && group.iter().all(|g| is_index_key(index, g))
        && index
            .partition_keys
            .iter()
            .all(|p| group.iter().any(|g| g.equivalent_to(p)))
}

// Group keys are exactly the keys following the equality prefix.
fn leading_group(index: &IndexDef, group: &[Expr], eq_keys: usize) -> bool {
    let window = index.keys.iter().skip(eq_keys).take(group.len());

    group.len() <= index.keys.len().saturating_sub(eq_keys)
        && window
            .clone()
            .all(|k| group.iter().any(|g| g.equivalent_to(&k.expr)))
}

fn distinct(index: &IndexDef, projection: &[Expr]) -> bool {
    index.api >= IndexApi::V2
        && index.partition_keys.is_empty()
        && !index.has_array_key()
        && projection
            .iter()
            .filter(|e| !e.is_static())
            .all(|e| is_index_key(index, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SpanConfig,
        plan::{sarg::sarg_for, sargable::sargable_for},
        value::Value,
    };

    fn f(name: &str) -> Expr {
        Expr::field(name)
    }

    fn int(v: i64) -> Expr {
        Expr::constant(v)
    }

    fn flags(pred: &Expr, index: &IndexDef, shape: &QueryShape) -> PushdownFlags {
        let sargability = sargable_for(pred, &index.keys).unwrap();
        let spans = sarg_for(pred, index, &sargability, &SpanConfig::default()).unwrap();

        pushdown_flags(index, &spans, spans.is_exact(), shape)
    }

    fn a1_b_gt5() -> Expr {
        Expr::and(vec![Expr::eq(f("a"), int(1)), Expr::gt(f("b"), int(5))])
    }

    #[test]
    fn display_joins_names_in_bit_order() {
        assert_eq!(PushdownFlags::NONE.to_string(), "NONE");
        assert_eq!(
            PushdownFlags::ORDER.with(PushdownFlags::DISTINCT).to_string(),
            "DISTINCT|ORDER"
        );
        assert!(PushdownFlags::ORDER > PushdownFlags::LIMIT.with(PushdownFlags::OFFSET));
    }

    #[test]
    fn exact_single_scan_absorbs_order_limit_and_offset() {
        let index = IndexDef::on_fields("ix_ab", &["a", "b"]);
        let shape = QueryShape::default()
            .with_order(vec![OrderTerm::asc(f("b"))])
            .with_limit(10)
            .with_offset(5);

        assert_eq!(
            flags(&a1_b_gt5(), &index, &shape).to_string(),
            "EXACTSPANS|LIMIT|OFFSET|ORDER"
        );
    }

    #[test]
    fn inexact_scan_only_absorbs_order() {
        let index = IndexDef::on_fields("ix_a", &["a"]);
        let pred = Expr::and(vec![Expr::gt(f("a"), int(1)), Expr::eq(f("c"), int(3))]);
        let shape = QueryShape::default()
            .with_order(vec![OrderTerm::asc(f("a"))])
            .with_limit(10);

        assert_eq!(flags(&pred, &index, &shape), PushdownFlags::ORDER);
    }

    #[test]
    fn mismatched_direction_blocks_order_and_limit() {
        let index = IndexDef::on_fields("ix_ab", &["a", "b"]);
        let shape = QueryShape::default()
            .with_order(vec![OrderTerm::desc(f("b"))])
            .with_limit(10);

        assert_eq!(flags(&a1_b_gt5(), &index, &shape), PushdownFlags::EXACTSPANS);
    }

    #[test]
    fn condition_pinned_order_term_is_skipped() {
        let index = IndexDef::on_fields("ix_a", &["a"]).with_condition(Expr::eq(f("t"), int(7)));
        let pred = Expr::and(vec![Expr::gt(f("a"), int(1)), Expr::eq(f("t"), int(7))]);
        let shape = QueryShape::default().with_order(vec![
            OrderTerm::asc(f("t")),
            OrderTerm::asc(f("a")),
        ]);

        assert!(flags(&pred, &index, &shape).contains(PushdownFlags::ORDER));
    }

    #[test]
    fn group_keys_after_equality_prefix_are_full_group() {
        let index = IndexDef::on_fields("ix_ab", &["a", "b"]);
        let pred = Expr::eq(f("a"), int(1));

        let shape = QueryShape::default().with_group(vec![f("b")]).with_limit(3);
        assert_eq!(
            flags(&pred, &index, &shape).to_string(),
            "EXACTSPANS|LIMIT|GROUPAGGS|FULLGROUPAGGS"
        );

        // A group key inside the equality prefix breaks the leading run.
        let shape = QueryShape::default().with_group(vec![f("a"), f("b")]).with_limit(3);
        assert_eq!(
            flags(&pred, &index, &shape).to_string(),
            "EXACTSPANS|GROUPAGGS"
        );

        let v2 = index.with_api(IndexApi::V2);
        let shape = QueryShape::default().with_group(vec![f("b")]);
        assert_eq!(flags(&pred, &v2, &shape), PushdownFlags::EXACTSPANS);
    }

    #[test]
    fn distinct_needs_v2_and_key_projection() {
        let pred = Expr::eq(f("a"), int(1));
        let shape = QueryShape::default().with_distinct(vec![f("a"), Expr::constant("x")]);

        let v1 = IndexDef::on_fields("ix_a", &["a"]).with_api(IndexApi::V1);
        assert!(!flags(&pred, &v1, &shape).contains(PushdownFlags::DISTINCT));

        let v2 = IndexDef::on_fields("ix_a", &["a"]).with_api(IndexApi::V2);
        assert!(flags(&pred, &v2, &shape).contains(PushdownFlags::DISTINCT));

        let wide = QueryShape::default().with_distinct(vec![f("a"), f("z")]);
        assert!(!flags(&pred, &v2, &wide).contains(PushdownFlags::DISTINCT));
    }

    #[test]
    fn multi_scan_blocks_offset() {
        let index = IndexDef::on_fields("ix_a", &["a"]);
        let pred = Expr::in_list(f("a"), Expr::constant(vec![Value::Int(1), Value::Int(2)]));
        let shape = QueryShape::default().with_limit(10).with_offset(5);

        assert_eq!(
            flags(&pred, &index, &shape).to_string(),
            "EXACTSPANS|LIMIT"
        );
    }

    #[test]
    fn leading_equalities_counts_point_prefix() {
        let index = IndexDef::on_fields("ix_abc", &["a", "b", "c"]);
        let pred = Expr::and(vec![
            Expr::eq(f("a"), int(1)),
            Expr::eq(f("b"), int(2)),
            Expr::gt(f("c"), int(0)),
        ]);
        let sargability = sargable_for(&pred, &index.keys).unwrap();
        let spans = sarg_for(&pred, &index, &sargability, &SpanConfig::default()).unwrap();

        assert_eq!(leading_equalities(&spans), 2);
        assert_eq!(leading_equalities(&SargSpans::WHOLE), 0);
    }
}
