use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Composite span composition budget (product of per-key range counts).
pub const DEFAULT_FULL_SPAN_FANOUT: usize = 8192;

/// Maximum number of ranges an OR may union before collapsing.
pub const DEFAULT_OR_SPAN_FANOUT: usize = 8192;

///
/// PlannerConfig
///
/// Tunables for one planning session. Every section and field is optional
/// in TOML; omitted values take their defaults.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    pub span: SpanConfig,
    pub dnf: DnfConfig,
    pub rank: RankConfig,
}

///
/// SpanConfig
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpanConfig {
    pub full_span_fanout: usize,
    pub or_span_fanout: usize,
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self {
            full_span_fanout: DEFAULT_FULL_SPAN_FANOUT,
            or_span_fanout: DEFAULT_OR_SPAN_FANOUT,
        }
    }
}

///
/// DnfConfig
///
/// Expansion guard: an AND is distributed only when it has at most
/// `max_and_operands` operands, the expansion yields at most
/// `max_term_fanout` operand copies, and the running branch count stays
/// below `max_branches`.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DnfConfig {
    pub max_and_operands: usize,
    pub max_term_fanout: usize,
    pub max_branches: usize,
}

impl Default for DnfConfig {
    fn default() -> Self {
        Self {
            max_and_operands: 4,
            max_term_fanout: 8,
            max_branches: 16,
        }
    }
}

///
/// RankConfig
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankConfig {
    /// Cost surcharge ratio applied to a candidate that needs a sort or
    /// group step the cost model cannot price.
    pub missing_cost_penalty: f64,

    /// When false, ranking is structural only.
    pub use_cost_model: bool,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            missing_cost_penalty: 0.1,
            use_cost_model: true,
        }
    }
}

impl PlannerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.span.full_span_fanout == 0 {
            return Err(ConfigError::ZeroBudget {
                field: "span.full_span_fanout",
            });
        }
        if self.span.or_span_fanout == 0 {
            return Err(ConfigError::ZeroBudget {
                field: "span.or_span_fanout",
            });
        }
        if self.dnf.max_branches == 0 {
            return Err(ConfigError::ZeroBudget {
                field: "dnf.max_branches",
            });
        }

        let penalty = self.rank.missing_cost_penalty;
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ConfigError::InvalidPenalty { value: penalty });
        }

        Ok(())
    }
}

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid planner config: {0}")]
    Parse(String),

    #[error("planner config field '{field}' must be greater than zero")]
    ZeroBudget { field: &'static str },

    #[error(
        "planner config rank.missing_cost_penalty must be finite and non-negative, got {value}"
    )]
    InvalidPenalty { value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PlannerConfig::from_toml_str("").expect("empty config parses");

        assert_eq!(config, PlannerConfig::default());
        assert_eq!(config.span.full_span_fanout, 8192);
        assert_eq!(config.dnf.max_term_fanout, 8);
        assert!((config.rank.missing_cost_penalty - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PlannerConfig::from_toml_str(
            r"
            [span]
            full_span_fanout = 16

            [rank]
            missing_cost_penalty = 0.25
            ",
        )
        .expect("config parses");

        assert_eq!(config.span.full_span_fanout, 16);
        assert_eq!(config.span.or_span_fanout, DEFAULT_OR_SPAN_FANOUT);
        assert!(config.rank.use_cost_model);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PlannerConfig::from_toml_str("[span]\nfanout = 3\n").expect_err("unknown key");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = PlannerConfig::from_toml_str("[span]\nor_span_fanout = 0\n").expect_err("zero");
        assert!(matches!(
            err,
            ConfigError::ZeroBudget {
                field: "span.or_span_fanout"
            }
        ));
    }

    #[test]
    fn negative_penalty_is_rejected() {
        let err = PlannerConfig::from_toml_str("[rank]\nmissing_cost_penalty = -1.0\n")
            .expect_err("negative penalty");
        assert!(matches!(err, ConfigError::InvalidPenalty { .. }));
    }
}
