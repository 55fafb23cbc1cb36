//! Action primitives for the computer-use loop
//!
//! This crate provides the building blocks the action loop drives a surface with:
//! - the [`Action`] sum type and its per-kind validation
//! - parsing of untrusted raw action payloads ([`RawAction`])
//! - the [`Surface`] contract (frame capture, dispatch, quiescence, release)
//! - the [`ActionExecutor`] with built-in post-action quiescence waiting

pub mod errors;
mod parse;
mod primitives;
mod surface;
pub mod types;
mod waiting;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::*;
pub use parse::*;
pub use primitives::*;
pub use surface::*;
pub use types::*;
pub use waiting::*;
