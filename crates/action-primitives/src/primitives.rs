//! Action execution against a surface
//!
//! Every action follows the same steps:
//! 1. Validate the action parameters
//! 2. Dispatch to the surface (`wait` sleeps instead, `screenshot` does nothing)
//! 3. Apply built-in quiescence waiting (timeout is non-fatal)
//! 4. Generate an action report

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use paperpilot_core_types::ActionId;
use thiserror::Error;
use tracing::{debug, info};

use crate::errors::{ActionError, SurfaceError};
use crate::surface::Surface;
use crate::types::{Action, ActionReport};
use crate::waiting::{DefaultWaitStrategy, WaitStrategy};

/// Why an action could not be executed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Rejected before reaching the surface
    #[error(transparent)]
    Invalid(#[from] ActionError),

    /// The surface failed while executing
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Executes validated actions with built-in waiting.
#[derive(Clone)]
pub struct ActionExecutor {
    /// Pause applied by `wait` actions
    wait_interval: Duration,

    /// Wait strategy for post-action quiescence
    wait_strategy: Arc<dyn WaitStrategy>,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(2),
            Arc::new(DefaultWaitStrategy::default()),
        )
    }
}

impl ActionExecutor {
    pub fn new(wait_interval: Duration, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            wait_interval,
            wait_strategy,
        }
    }

    /// Executor with the default strategy bounded by `quiescence_timeout`.
    pub fn with_timeouts(wait_interval: Duration, quiescence_timeout: Duration) -> Self {
        Self::new(
            wait_interval,
            Arc::new(DefaultWaitStrategy::new(quiescence_timeout)),
        )
    }

    /// Execute one action and wait for the surface to settle.
    pub async fn execute(
        &self,
        surface: &dyn Surface,
        action: &Action,
    ) -> Result<ActionReport, ExecutionError> {
        let started_at = Utc::now();
        let start_instant = Instant::now();
        let action_id = ActionId::new();
        let kind = action.kind();

        action.validate()?;

        info!(
            action_id = %action_id,
            action = %action.summary(),
            "Executing action"
        );

        match action {
            Action::Wait => {
                debug!(interval_ms = self.wait_interval.as_millis() as u64, "waiting");
                tokio::time::sleep(self.wait_interval).await;
            }
            Action::Screenshot => {
                debug!("screenshot requested; a frame is captured after every action");
            }
            _ => surface.dispatch(action).await?,
        }

        let quiescence = self.wait_strategy.settle(surface).await;
        let latency_ms = start_instant.elapsed().as_millis() as u64;

        info!(
            action_id = %action_id,
            kind = %kind,
            latency_ms = latency_ms,
            quiescent = quiescence.is_settled(),
            "Action completed"
        );

        Ok(ActionReport {
            action_id,
            kind,
            started_at,
            latency_ms,
            dispatched: kind.touches_surface(),
            quiescent: quiescence.is_settled(),
        })
    }
}
