//! In-memory surface that records every call, for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paperpilot_core_types::Viewport;
use parking_lot::Mutex;

use crate::errors::SurfaceError;
use crate::surface::Surface;
use crate::types::{Action, Frame};

/// One call observed by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    CaptureFrame,
    Dispatch(Action),
    AwaitQuiescent,
    Release,
}

/// Journal shared by several surfaces: `(surface name, action)` in dispatch order.
pub type SharedJournal = Arc<Mutex<Vec<(String, Action)>>>;

/// Scriptable surface recording every call it receives.
pub struct RecordingSurface {
    name: String,
    viewport: Viewport,
    quiescent: bool,
    fail_dispatch_after: Option<usize>,
    fail_capture_after: Option<usize>,
    dispatch_delay: Duration,
    journal: Option<SharedJournal>,
    calls: Mutex<Vec<SurfaceCall>>,
    frames: AtomicUsize,
    dispatches: AtomicUsize,
    releases: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSurface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            viewport: Viewport::default(),
            quiescent: true,
            fail_dispatch_after: None,
            fail_capture_after: None,
            dispatch_delay: Duration::ZERO,
            journal: None,
            calls: Mutex::new(Vec::new()),
            frames: AtomicUsize::new(0),
            dispatches: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// What `await_quiescent` answers.
    pub fn with_quiescent(mut self, quiescent: bool) -> Self {
        self.quiescent = quiescent;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Fail every dispatch after `successes` successful ones, as a disconnect.
    pub fn failing_dispatch_after(mut self, successes: usize) -> Self {
        self.fail_dispatch_after = Some(successes);
        self
    }

    /// Fail every capture after `successes` successful ones, as a closed surface.
    pub fn failing_capture_after(mut self, successes: usize) -> Self {
        self.fail_capture_after = Some(successes);
        self
    }

    /// Hold each dispatch open for `delay`.
    pub fn with_dispatch_delay(mut self, delay: Duration) -> Self {
        self.dispatch_delay = delay;
        self
    }

    pub fn with_journal(mut self, journal: SharedJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    pub fn dispatched(&self) -> Vec<Action> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Dispatch(action) => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched().len()
    }

    pub fn quiescence_checks(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, SurfaceCall::AwaitQuiescent))
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Highest number of dispatches observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn capture_frame(&self) -> Result<Frame, SurfaceError> {
        let index = self.frames.load(Ordering::SeqCst);
        if self.fail_capture_after.is_some_and(|limit| index >= limit) {
            return Err(SurfaceError::Closed(format!("{} closed", self.name)));
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(SurfaceCall::CaptureFrame);
        let data = format!("{}#{}", self.name, index).into_bytes();
        Ok(Frame::png(data).with_url(format!("about:blank#{}", self.name)))
    }

    async fn dispatch(&self, action: &Action) -> Result<(), SurfaceError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.dispatch_delay.is_zero() {
            tokio::time::sleep(self.dispatch_delay).await;
        }

        let attempt = self.dispatches.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_dispatch_after.is_some_and(|limit| attempt >= limit) {
            Err(SurfaceError::Disconnected(format!(
                "simulated disconnect on {}",
                self.name
            )))
        } else {
            self.calls.lock().push(SurfaceCall::Dispatch(action.clone()));
            if let Some(journal) = &self.journal {
                journal.lock().push((self.name.clone(), action.clone()));
            }
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn await_quiescent(&self, _timeout: Duration) -> bool {
        self.calls.lock().push(SurfaceCall::AwaitQuiescent);
        self.quiescent
    }

    async fn release(&self) -> Result<(), SurfaceError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(SurfaceCall::Release);
        Ok(())
    }
}
