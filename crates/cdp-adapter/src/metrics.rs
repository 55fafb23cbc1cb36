//! Prometheus collectors for page surfaces.
//!
//! A [`SurfaceMetrics`] is registered into a caller-owned [`Registry`] and
//! handed to [`crate::CdpBrowser::with_metrics`]; every surface the browser
//! opens then records its captures, dispatches and settle outcomes.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// How a quiescence wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettleOutcome {
    Quiet,
    Busy,
    /// The surface was released or its target went away.
    Gone,
}

impl SettleOutcome {
    fn as_str(self) -> &'static str {
        match self {
            SettleOutcome::Quiet => "quiet",
            SettleOutcome::Busy => "busy",
            SettleOutcome::Gone => "gone",
        }
    }
}

#[derive(Clone)]
pub struct SurfaceMetrics {
    surfaces_opened: IntCounter,
    dispatches: IntCounterVec,
    captures: IntCounterVec,
    capture_seconds: Histogram,
    settles: IntCounterVec,
}

impl SurfaceMetrics {
    /// Create the `paperpilot_cdp_*` collectors and register them.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let metrics = Self {
            surfaces_opened: IntCounter::new(
                "paperpilot_cdp_surfaces_opened_total",
                "Page surfaces opened",
            )?,
            dispatches: IntCounterVec::new(
                Opts::new(
                    "paperpilot_cdp_dispatches_total",
                    "Actions dispatched to a surface",
                ),
                &["action", "outcome"],
            )?,
            captures: IntCounterVec::new(
                Opts::new("paperpilot_cdp_captures_total", "Frame captures"),
                &["outcome"],
            )?,
            capture_seconds: Histogram::with_opts(
                HistogramOpts::new(
                    "paperpilot_cdp_capture_duration_seconds",
                    "Screenshot plus URL lookup latency",
                )
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            )?,
            settles: IntCounterVec::new(
                Opts::new(
                    "paperpilot_cdp_settles_total",
                    "Quiescence waits by outcome",
                ),
                &["outcome"],
            )?,
        };

        registry.register(Box::new(metrics.surfaces_opened.clone()))?;
        registry.register(Box::new(metrics.dispatches.clone()))?;
        registry.register(Box::new(metrics.captures.clone()))?;
        registry.register(Box::new(metrics.capture_seconds.clone()))?;
        registry.register(Box::new(metrics.settles.clone()))?;
        Ok(metrics)
    }

    pub(crate) fn surface_opened(&self) {
        self.surfaces_opened.inc();
    }

    pub(crate) fn dispatch(&self, action: &str, ok: bool) {
        self.dispatches
            .with_label_values(&[action, outcome(ok)])
            .inc();
    }

    pub(crate) fn capture(&self, ok: bool, elapsed: Duration) {
        self.captures.with_label_values(&[outcome(ok)]).inc();
        if ok {
            self.capture_seconds.observe(elapsed.as_secs_f64());
        }
    }

    pub(crate) fn settle(&self, result: SettleOutcome) {
        self.settles.with_label_values(&[result.as_str()]).inc();
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Text exposition of everything in `registry`.
pub fn render(registry: &Registry) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}
