use action_primitives::SurfaceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories reported by the adapter.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("cdp command timed out")]
    CommandTimeout,
    /// Launching or connecting to Chromium failed.
    #[error("cdp i/o failure")]
    CdpIo,
    /// The connection was established once and has since been lost.
    #[error("browser disconnected")]
    Disconnected,
    #[error("cdp protocol error")]
    Protocol,
    #[error("target closed")]
    TargetClosed,
    #[error("internal error")]
    Internal,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}{}", .hint.as_deref().map(|hint| format!(": {hint}")).unwrap_or_default())]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub(crate) fn disconnected(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Disconnected).with_hint(hint)
    }
}

impl From<AdapterError> for SurfaceError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::CommandTimeout => SurfaceError::Timeout(message),
            AdapterErrorKind::CdpIo | AdapterErrorKind::Disconnected => {
                SurfaceError::Disconnected(message)
            }
            AdapterErrorKind::Protocol => SurfaceError::Protocol(message),
            AdapterErrorKind::TargetClosed => SurfaceError::Closed(message),
            AdapterErrorKind::Internal => SurfaceError::Internal(message),
        }
    }
}
