//! Error types for action primitives

use thiserror::Error;

/// Raised when an action is malformed and must not reach the surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The payload is not an object or carries no kind tag
    #[error("malformed action payload: {0}")]
    Malformed(String),

    /// The kind tag names no supported action
    #[error("unknown action kind: {0}")]
    UnknownKind(String),

    /// A field required by the kind is absent
    #[error("action '{kind}' is missing required field '{field}'")]
    MissingField { kind: String, field: &'static str },

    /// A field is present but has the wrong shape or value
    #[error("action '{kind}' has invalid field '{field}': {reason}")]
    InvalidField {
        kind: String,
        field: &'static str,
        reason: String,
    },
}

impl ActionError {
    pub(crate) fn missing(kind: &str, field: &'static str) -> Self {
        Self::MissingField {
            kind: kind.to_string(),
            field,
        }
    }

    pub(crate) fn invalid(kind: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            kind: kind.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// Failures raised by a surface while capturing or dispatching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface was closed (explicitly released or target gone)
    #[error("surface closed: {0}")]
    Closed(String),

    /// The connection to the surface was lost
    #[error("surface disconnected: {0}")]
    Disconnected(String),

    /// A surface command exceeded its deadline
    #[error("surface command timed out: {0}")]
    Timeout(String),

    /// The surface rejected a command
    #[error("surface protocol error: {0}")]
    Protocol(String),

    /// The surface cannot perform the requested action
    #[error("unsupported on this surface: {0}")]
    Unsupported(String),

    /// Internal error (should not happen in normal operation)
    #[error("internal surface error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_kind_and_field() {
        let err = ActionError::missing("click", "y");
        assert_eq!(err.to_string(), "action 'click' is missing required field 'y'");

        let err = ActionError::invalid("scroll", "x", "expected an integer");
        assert!(err.to_string().contains("expected an integer"));
    }
}
