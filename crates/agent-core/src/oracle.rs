//! Planning oracle abstraction.
//!
//! The oracle is the remote model that looks at a frame and either answers
//! the goal or names the next action. Vendors plug in behind
//! [`PlanningOracle`]; [`ScriptedOracle`] replays canned turns for tests and
//! offline runs.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use action_primitives::{Frame, RawAction};
use async_trait::async_trait;
use paperpilot_core_types::{EnvironmentKind, Viewport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

/// What the oracle is told about the surface it is steering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceCapabilities {
    pub viewport: Viewport,
    pub environment: EnvironmentKind,
}

/// Opaque token that continues an oracle conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHandle(String);

impl ConversationHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A safety check the oracle attached to a pending action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of one turn.
#[derive(Debug, Clone)]
pub enum OracleInput {
    /// First turn: the goal and the initial frame.
    Initial { goal: String, frame: Frame },
    /// Later turns: the frame captured after executing `call_id`.
    FollowUp {
        conversation: ConversationHandle,
        call_id: String,
        frame: Frame,
        acknowledged_safety_checks: Vec<SafetyCheck>,
    },
}

#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub capabilities: SurfaceCapabilities,
    pub input: OracleInput,
}

/// One item of an oracle response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseItem {
    /// A pending action, still in its untrusted wire form.
    ActionCall {
        call_id: String,
        action: RawAction,
        safety_checks: Vec<SafetyCheck>,
    },
    /// Terminal text.
    Message { text: String },
}

impl ResponseItem {
    pub fn action(call_id: impl Into<String>, action: Value) -> Self {
        ResponseItem::ActionCall {
            call_id: call_id.into(),
            action: RawAction::new(action),
            safety_checks: Vec::new(),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        ResponseItem::Message { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleResponse {
    pub conversation: ConversationHandle,
    pub items: Vec<ResponseItem>,
}

impl OracleResponse {
    pub fn new(conversation: impl Into<String>, items: Vec<ResponseItem>) -> Self {
        Self {
            conversation: ConversationHandle::new(conversation),
            items,
        }
    }
}

/// Why a turn could not be completed. All of these end the session as
/// `OracleUnavailable`; nothing is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle transport failed: {0}")]
    Transport(String),

    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("oracle response could not be decoded: {0}")]
    Decode(String),

    #[error("oracle is not configured: {0}")]
    Config(String),
}

/// Remote planner consulted once per turn.
#[async_trait]
pub trait PlanningOracle: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "oracle"
    }

    async fn consult(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// Oracle replaying a fixed list of turns; running out is a transport error.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    turns: Mutex<VecDeque<Result<OracleResponse, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
    latency: Duration,
}

impl ScriptedOracle {
    pub fn new(turns: Vec<Result<OracleResponse, OracleError>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// One action per turn from `actions`, then `message` as the terminal answer.
    pub fn actions_then_message(actions: Vec<Value>, message: &str) -> Self {
        let mut turns: Vec<_> = actions
            .into_iter()
            .enumerate()
            .map(|(index, action)| {
                Ok(OracleResponse::new(
                    format!("resp_{index}"),
                    vec![ResponseItem::action(format!("call_{index}"), action)],
                ))
            })
            .collect();
        let last = turns.len();
        turns.push(Ok(OracleResponse::new(
            format!("resp_{last}"),
            vec![ResponseItem::message(message)],
        )));
        Self::new(turns)
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PlanningOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn consult(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        self.requests.lock().await.push(request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.turns
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Transport("script exhausted".to_string())))
    }
}
