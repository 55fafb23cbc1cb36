//! Built-in waiting after actions

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::surface::Surface;

/// Outcome of waiting for a surface to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quiescence {
    /// The surface went idle within the timeout
    Settled,
    /// The timeout elapsed first; treated as best-effort information
    TimedOut,
}

impl Quiescence {
    pub fn is_settled(&self) -> bool {
        matches!(self, Quiescence::Settled)
    }
}

/// Waiting strategy trait
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Wait for the surface to settle after an action.
    async fn settle(&self, surface: &dyn Surface) -> Quiescence;
}

/// Default waiting strategy: one bounded quiescence wait.
#[derive(Debug, Clone)]
pub struct DefaultWaitStrategy {
    /// Upper bound on the quiescence wait (milliseconds)
    pub quiescence_timeout_ms: u64,
}

impl Default for DefaultWaitStrategy {
    fn default() -> Self {
        Self {
            quiescence_timeout_ms: 5_000,
        }
    }
}

impl DefaultWaitStrategy {
    pub fn new(quiescence_timeout: Duration) -> Self {
        Self {
            quiescence_timeout_ms: quiescence_timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl WaitStrategy for DefaultWaitStrategy {
    async fn settle(&self, surface: &dyn Surface) -> Quiescence {
        let started = Instant::now();
        let timeout = Duration::from_millis(self.quiescence_timeout_ms);

        if surface.await_quiescent(timeout).await {
            debug!(
                waited_ms = started.elapsed().as_millis() as u64,
                "surface settled"
            );
            Quiescence::Settled
        } else {
            warn!(
                timeout_ms = self.quiescence_timeout_ms,
                "surface still busy after quiescence timeout; continuing"
            );
            Quiescence::TimedOut
        }
    }
}
