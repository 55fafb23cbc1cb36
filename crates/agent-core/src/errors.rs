use thiserror::Error;

/// Errors emitted by the agent-core crate.
///
/// Everything that goes wrong once a session is running is reported through
/// the session's terminal result instead; these cover requests the driver
/// refuses to start.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Raised when a goal is empty or otherwise unusable.
    #[error("invalid agent request: {0}")]
    InvalidRequest(String),

    /// Raised when the driver configuration cannot run any session.
    #[error("invalid loop configuration: {0}")]
    InvalidConfig(String),
}

impl AgentError {
    /// Helper for wrapping static string errors.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
