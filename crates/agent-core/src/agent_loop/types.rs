//! Result types of the action loop.

use action_primitives::ActionKind;
use paperpilot_core_types::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session ended without completing its goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The oracle proposed an action that failed validation.
    InvalidAction(String),
    /// The oracle could not be reached, answered with an error or timed out.
    OracleUnavailable(String),
    /// The surface failed to capture or dispatch.
    SurfaceError(String),
    /// The turn budget ran out before a terminal message.
    TurnBudgetExceeded { max_turns: u32 },
    /// The oracle answered with neither an action nor a message.
    InvalidResponse(String),
    /// A pending safety check was refused by policy.
    SafetyCheckRefused(String),
    Cancelled,
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::InvalidAction(_) => "invalid_action",
            FailureReason::OracleUnavailable(_) => "oracle_unavailable",
            FailureReason::SurfaceError(_) => "surface_error",
            FailureReason::TurnBudgetExceeded { .. } => "turn_budget_exceeded",
            FailureReason::InvalidResponse(_) => "invalid_response",
            FailureReason::SafetyCheckRefused(_) => "safety_check_refused",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidAction(detail) => write!(f, "invalid action: {detail}"),
            FailureReason::OracleUnavailable(detail) => write!(f, "oracle unavailable: {detail}"),
            FailureReason::SurfaceError(detail) => write!(f, "surface error: {detail}"),
            FailureReason::TurnBudgetExceeded { max_turns } => {
                write!(f, "turn budget of {max_turns} exceeded")
            }
            FailureReason::InvalidResponse(detail) => write!(f, "invalid oracle response: {detail}"),
            FailureReason::SafetyCheckRefused(detail) => {
                write!(f, "safety check refused: {detail}")
            }
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TerminalResult {
    Completed { message: String },
    Failed { reason: FailureReason },
}

impl TerminalResult {
    pub fn completed(message: impl Into<String>) -> Self {
        TerminalResult::Completed {
            message: message.into(),
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        TerminalResult::Failed { reason }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TerminalResult::Completed { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            TerminalResult::Failed { reason } => Some(reason),
            TerminalResult::Completed { .. } => None,
        }
    }
}

impl fmt::Display for TerminalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalResult::Completed { message } => write!(f, "completed: {message}"),
            TerminalResult::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// What happened in one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn number.
    pub turn: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ActionKind>,
    /// Redacted action summary, or the terminal message for the last turn.
    pub summary: String,
    /// `Some(false)` when the quiescence wait timed out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiescent: Option<bool>,
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Result of one action-loop session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLoopResult {
    pub session_id: SessionId,
    pub result: TerminalResult,
    /// Oracle turns taken.
    pub turns: u32,
    pub actions_dispatched: u32,
    pub elapsed_ms: u64,
    /// URL of the last captured frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub history: Vec<TurnRecord>,
}

impl ActionLoopResult {
    pub fn is_success(&self) -> bool {
        self.result.is_completed()
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.result.failure()
    }

    /// The terminal message, if the session completed.
    pub fn message(&self) -> Option<&str> {
        match &self.result {
            TerminalResult::Completed { message } => Some(message),
            TerminalResult::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminal_results_serialize_with_status_tags() {
        let done = TerminalResult::completed("3 papers found");
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({"status": "completed", "message": "3 papers found"})
        );

        let failed = TerminalResult::failed(FailureReason::TurnBudgetExceeded { max_turns: 5 });
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "status": "failed",
                "reason": {"reason": "turn_budget_exceeded", "detail": {"max_turns": 5}}
            })
        );
    }

    #[test]
    fn failure_reason_display_is_readable() {
        let reason = FailureReason::SurfaceError("target closed".into());
        assert_eq!(reason.to_string(), "surface error: target closed");
        assert_eq!(reason.kind(), "surface_error");
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
    }
}
