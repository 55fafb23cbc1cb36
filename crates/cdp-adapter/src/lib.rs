//! Chromium DevTools Protocol surface.
//!
//! Launches (or attaches to) a Chromium instance, opens one page target per
//! action-loop session and implements the [`action_primitives::Surface`]
//! contract over raw CDP commands: PNG frame capture, mouse/keyboard/wheel
//! input, readiness plus network-quiet tracking and target close on release.

pub mod config;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod network;
pub mod surface;
pub mod transport;
mod util;

pub use config::{detect_chrome_executable, CdpConfig};
pub use error::{AdapterError, AdapterErrorKind};
pub use metrics::SurfaceMetrics;
pub use surface::{CdpBrowser, CdpSurface};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};
