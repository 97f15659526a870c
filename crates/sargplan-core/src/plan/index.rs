//! Catalog-side index metadata consumed read-only by the planner.

use crate::{
    error::InternalError,
    expr::{CompareOp, Expr, VectorMetric},
};
use serde::{Deserialize, Serialize};

///
/// IndexApi
///
/// Capability tier of the index service. Later tiers are supersets.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum IndexApi {
    /// Composite spans over a single key order; no skip-key filtering.
    V1,
    /// Per-key composite filters and OFFSET pushdown.
    V2,
    /// Skip-key sarging and group/aggregate pushdown.
    #[default]
    V3,
}

impl IndexApi {
    #[must_use]
    pub fn allows_offset(self) -> bool {
        self >= Self::V2
    }

    #[must_use]
    pub fn allows_skip_keys(self) -> bool {
        self >= Self::V3
    }

    #[must_use]
    pub fn allows_group_aggs(self) -> bool {
        self >= Self::V3
    }
}

///
/// KeyAttrs
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyAttrs {
    pub desc: bool,

    /// Entries whose key is MISSING are indexed.
    pub missing: bool,

    pub vector: Option<VectorMetric>,
}

///
/// IndexKey
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IndexKey {
    pub expr: Expr,
    pub attrs: KeyAttrs,
}

impl IndexKey {
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            attrs: KeyAttrs::default(),
        }
    }

    #[must_use]
    pub const fn desc(mut self) -> Self {
        self.attrs.desc = true;
        self
    }

    #[must_use]
    pub const fn include_missing(mut self) -> Self {
        self.attrs.missing = true;
        self
    }

    #[must_use]
    pub const fn vector(mut self, metric: VectorMetric) -> Self {
        self.attrs.vector = Some(metric);
        self
    }

    /// Array keys index one entry per element of a mapped collection.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self.expr, Expr::ArrayMap { .. })
    }
}

///
/// IndexDef
///
/// One candidate index. Key order is significant: position `i` in `keys`
/// is the i-th composite key.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct IndexDef {
    pub name: String,
    pub keys: Vec<IndexKey>,

    /// Partial-index condition; the index holds only rows satisfying it.
    pub condition: Option<Expr>,

    pub partition_keys: Vec<Expr>,
    pub api: IndexApi,
}

impl IndexDef {
    #[must_use]
    pub fn new(name: impl Into<String>, keys: Vec<IndexKey>) -> Self {
        Self {
            name: name.into(),
            keys,
            condition: None,
            partition_keys: Vec::new(),
            api: IndexApi::default(),
        }
    }

    #[must_use]
    pub fn on_fields(name: impl Into<String>, fields: &[&str]) -> Self {
        Self::new(
            name,
            fields
                .iter()
                .map(|f| IndexKey::new(Expr::field(*f)))
                .collect(),
        )
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn with_partition_keys(mut self, keys: Vec<Expr>) -> Self {
        self.partition_keys = keys;
        self
    }

    #[must_use]
    pub const fn with_api(mut self, api: IndexApi) -> Self {
        self.api = api;
        self
    }

    #[must_use]
    pub fn has_array_key(&self) -> bool {
        self.keys.iter().any(IndexKey::is_array)
    }

    #[must_use]
    pub fn key_exprs(&self) -> Vec<&Expr> {
        self.keys.iter().map(|k| &k.expr).collect()
    }

    /// The partial-index condition fixes `expr` to a single value.
    #[must_use]
    pub fn condition_pins(&self, expr: &Expr) -> bool {
        self.condition
            .as_ref()
            .is_some_and(|cond| pins_equality(cond, expr))
    }

    /// Number of keys the condition fixes to a single value.
    #[must_use]
    pub fn condition_equalities(&self) -> usize {
        self.keys
            .iter()
            .filter(|k| self.condition_pins(&k.expr))
            .count()
    }

    /// Reject definitions the planner cannot reason about.
    pub(crate) fn validate(&self) -> Result<(), InternalError> {
        if self.keys.is_empty() {
            return Err(InternalError::planner_invariant(format!(
                "index '{}' has no keys",
                self.name
            )));
        }
        if self.keys.iter().filter(|k| k.attrs.vector.is_some()).count() > 1 {
            return Err(InternalError::planner_invariant(format!(
                "index '{}' declares more than one vector key",
                self.name
            )));
        }

        Ok(())
    }
}

/// Whether some conjunct of `pred` is `expr = constant`.
pub(crate) fn pins_equality(pred: &Expr, expr: &Expr) -> bool {
    let conjuncts = match pred {
        Expr::And(operands) => operands.as_slice(),
        other => std::slice::from_ref(other),
    };

    conjuncts.iter().any(|c| match c {
        Expr::Compare {
            op: CompareOp::Eq,
            left,
            right,
        } => {
            let pinned = |side: &Expr, other: &Expr| {
                side.equivalent_to(expr)
                    && other.is_static()
                    && !other.static_value().is_some_and(|v| v.is_unknown())
            };
            pinned(left, right) || pinned(right, left)
        }
        _ => false,
    })
}
