//! Action-loop core.
//!
//! Provides the planning-oracle abstraction and the driver that alternates
//! between frame capture, oracle consultation and action execution until a
//! goal is answered or the session fails.

pub mod agent_loop;
pub mod errors;
pub mod oracle;

pub use agent_loop::{
    ActionLoopConfig, ActionLoopDriver, ActionLoopResult, FailureReason, SafetyCheckPolicy,
    Session, SessionStatus, TerminalResult, TurnDecision, TurnRecord,
};
pub use errors::AgentError;
pub use oracle::{
    ConversationHandle, OracleError, OracleInput, OracleRequest, OracleResponse, PlanningOracle,
    ResponseItem, SafetyCheck, ScriptedOracle, SurfaceCapabilities,
};
