//! Configuration for the action loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::AgentError;

/// What to do when the oracle attaches safety checks to a pending action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCheckPolicy {
    /// Execute the action and acknowledge the checks on the next turn.
    #[default]
    Acknowledge,
    /// End the session with `SafetyCheckRefused`.
    Refuse,
}

/// Configuration for the action loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionLoopConfig {
    /// Maximum oracle turns before the session fails.
    /// Default: 50
    pub max_turns: u32,

    /// Pause applied by `wait` actions in milliseconds.
    /// Default: 2000
    pub wait_interval_ms: u64,

    /// Upper bound on the post-action quiescence wait in milliseconds.
    /// Exceeding it is logged, not fatal.
    /// Default: 5000
    pub quiescence_timeout_ms: u64,

    /// Upper bound on a single oracle call in milliseconds.
    /// Default: 120000 (2 minutes)
    pub oracle_timeout_ms: u64,

    /// Default: acknowledge
    pub safety_checks: SafetyCheckPolicy,
}

impl Default for ActionLoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            wait_interval_ms: 2_000,
            quiescence_timeout_ms: 5_000,
            oracle_timeout_ms: 120_000,
            safety_checks: SafetyCheckPolicy::Acknowledge,
        }
    }
}

impl ActionLoopConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a minimal config for testing.
    pub fn minimal() -> Self {
        Self {
            max_turns: 10,
            wait_interval_ms: 10,
            quiescence_timeout_ms: 10,
            oracle_timeout_ms: 1_000,
            safety_checks: SafetyCheckPolicy::Acknowledge,
        }
    }

    /// Builder: set the turn budget.
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = turns;
        self
    }

    /// Builder: set the oracle timeout.
    pub fn oracle_timeout(mut self, ms: u64) -> Self {
        self.oracle_timeout_ms = ms;
        self
    }

    pub fn safety_checks(mut self, policy: SafetyCheckPolicy) -> Self {
        self.safety_checks = policy;
        self
    }

    pub fn oracle_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Reject configurations under which no session could make progress.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_turns == 0 {
            return Err(AgentError::invalid_config("max_turns must be at least 1"));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(AgentError::invalid_config(
                "oracle_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}
