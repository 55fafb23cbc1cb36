//! The controllable surface the action loop acts on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paperpilot_core_types::{EnvironmentKind, Viewport};

use crate::errors::SurfaceError;
use crate::types::{Action, Frame};

/// Surface-control interface consumed by the action loop.
///
/// Implementations must be safe to use from several unrelated sessions at
/// once; within one session all calls are strictly sequential.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Dimensions declared to the oracle.
    fn viewport(&self) -> Viewport;

    /// Environment kind declared to the oracle.
    fn environment(&self) -> EnvironmentKind {
        EnvironmentKind::Browser
    }

    /// Capture the current visual state.
    async fn capture_frame(&self) -> Result<Frame, SurfaceError>;

    /// Send one input action. `Wait` and `Screenshot` never reach this call.
    async fn dispatch(&self, action: &Action) -> Result<(), SurfaceError>;

    /// Wait until the surface has no pending network/visual activity.
    ///
    /// Returns `false` when the timeout elapses first. Never fails: a surface
    /// that cannot answer reports `false` and the next capture surfaces the
    /// real error.
    async fn await_quiescent(&self, timeout: Duration) -> bool;

    /// Release the underlying handle. Called exactly once by the driver.
    async fn release(&self) -> Result<(), SurfaceError>;
}

#[async_trait]
impl<S: Surface + ?Sized> Surface for Arc<S> {
    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }

    fn environment(&self) -> EnvironmentKind {
        (**self).environment()
    }

    async fn capture_frame(&self) -> Result<Frame, SurfaceError> {
        (**self).capture_frame().await
    }

    async fn dispatch(&self, action: &Action) -> Result<(), SurfaceError> {
        (**self).dispatch(action).await
    }

    async fn await_quiescent(&self, timeout: Duration) -> bool {
        (**self).await_quiescent(timeout).await
    }

    async fn release(&self) -> Result<(), SurfaceError> {
        (**self).release().await
    }
}

#[async_trait]
impl<S: Surface + ?Sized> Surface for Box<S> {
    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }

    fn environment(&self) -> EnvironmentKind {
        (**self).environment()
    }

    async fn capture_frame(&self) -> Result<Frame, SurfaceError> {
        (**self).capture_frame().await
    }

    async fn dispatch(&self, action: &Action) -> Result<(), SurfaceError> {
        (**self).dispatch(action).await
    }

    async fn await_quiescent(&self, timeout: Duration) -> bool {
        (**self).await_quiescent(timeout).await
    }

    async fn release(&self) -> Result<(), SurfaceError> {
        (**self).release().await
    }
}
