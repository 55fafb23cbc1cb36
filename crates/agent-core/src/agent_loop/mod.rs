//! Action loop (capture → consult → act) execution mode.
//!
//! # Architecture
//!
//! ```text
//! frame = surface.capture_frame()
//! loop (at most max_turns):
//!     response = oracle.consult(goal | conversation, frame)
//!     terminal message -> Completed
//!     action           -> validate, dispatch, await quiescence
//!     frame = surface.capture_frame()
//! surface.release()
//! ```
//!
//! # Key Components
//!
//! - [`ActionLoopConfig`]: turn budget, timeouts and safety-check policy
//! - [`ActionLoopDriver`]: runs sessions against surfaces
//! - [`ActionLoopResult`]: terminal result plus per-turn history

pub mod config;
pub mod controller;
pub mod session;
pub mod types;

pub use config::{ActionLoopConfig, SafetyCheckPolicy};
pub use controller::{ActionLoopDriver, TurnDecision};
pub use session::{Session, SessionStatus};
pub use types::{ActionLoopResult, FailureReason, TerminalResult, TurnRecord};
