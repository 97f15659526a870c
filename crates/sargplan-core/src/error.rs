use crate::config::ConfigError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured planning error with a stable internal classification.
/// Raised only for logic defects; precision loss is never an error.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a sargability-origin invariant violation.
    pub(crate) fn sargable_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Sargable,
            message.into(),
        )
    }

    /// Construct a span-origin invariant violation.
    pub(crate) fn span_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Span,
            message.into(),
        )
    }

    /// Construct a span-origin unsupported error.
    pub(crate) fn span_unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Span, message.into())
    }

    /// Construct a planner-origin invariant violation.
    pub(crate) fn planner_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Planner,
            message.into(),
        )
    }

    /// Construct a rank-origin invariant violation.
    pub(crate) fn rank_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Rank,
            message.into(),
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Internal,
    InvariantViolation,
    Unsupported,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Normalize,
    Subsumption,
    Sargable,
    Span,
    Rank,
    Planner,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Normalize => "normalize",
            Self::Subsumption => "subsumption",
            Self::Sargable => "sargable",
            Self::Span => "span",
            Self::Rank => "rank",
            Self::Planner => "planner",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// PlannerError
///
/// Error surface of the public planning entry points.
///

#[derive(Debug, ThisError)]
pub enum PlannerError {
    #[error("{0}")]
    Internal(Box<InternalError>),

    #[error("{0}")]
    Config(Box<ConfigError>),
}

impl PlannerError {
    /// Internal classification, when this is an internal error.
    #[must_use]
    pub fn internal(&self) -> Option<&InternalError> {
        match self {
            Self::Internal(err) => Some(err),
            Self::Config(_) => None,
        }
    }
}

impl From<InternalError> for PlannerError {
    fn from(err: InternalError) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<ConfigError> for PlannerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_class_renders_stable_labels() {
        let err = InternalError::span_invariant("sargable key produced no span");

        assert_eq!(
            err.display_with_class(),
            "span:invariant_violation: sargable key produced no span"
        );
    }

    #[test]
    fn planner_error_wraps_internal() {
        let err: PlannerError = InternalError::planner_invariant("duplicate index name").into();

        assert_eq!(err.to_string(), "duplicate index name");
        assert_eq!(
            err.internal().map(|e| e.origin),
            Some(ErrorOrigin::Planner)
        );
    }
}
