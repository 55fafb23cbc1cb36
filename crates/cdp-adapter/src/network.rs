//! Per-surface in-flight request tracking for network quiescence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashSet;

/// Counts outstanding requests of one page target from `Network.*` events.
#[derive(Debug)]
pub struct NetworkTracker {
    inflight: DashSet<String>,
    origin: Instant,
    /// Milliseconds since `origin` of the last request start or finish.
    last_activity_ms: AtomicU64,
}

impl Default for NetworkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self {
            inflight: DashSet::new(),
            origin: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    pub fn request_started(&self, request_id: &str) {
        self.inflight.insert(request_id.to_string());
        self.touch();
    }

    pub fn request_finished(&self, request_id: &str) {
        self.inflight.remove(request_id);
        self.touch();
    }

    /// Forget every open request, e.g. after missed events.
    pub fn reset(&self) {
        self.inflight.clear();
        self.touch();
    }

    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Apply one CDP event; returns `true` when it was a network event.
    pub fn observe(&self, method: &str, params: &serde_json::Value) -> bool {
        let Some(request_id) = params.get("requestId").and_then(|v| v.as_str()) else {
            return false;
        };
        match method {
            "Network.requestWillBeSent" => {
                self.request_started(request_id);
                true
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                self.request_finished(request_id);
                true
            }
            _ => false,
        }
    }

    /// No request in flight and none started or finished within `window`.
    pub fn is_quiet(&self, window: Duration) -> bool {
        self.inflight.is_empty() && self.idle_for() >= window
    }

    fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }

    fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_activity_ms.store(now, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tracks_requests_from_events() {
        let tracker = NetworkTracker::new();
        assert!(tracker.observe("Network.requestWillBeSent", &json!({"requestId": "1"})));
        assert!(tracker.observe("Network.requestWillBeSent", &json!({"requestId": "2"})));
        assert_eq!(tracker.inflight(), 2);
        tracker.observe("Network.loadingFinished", &json!({"requestId": "1"}));
        tracker.observe("Network.loadingFailed", &json!({"requestId": "2"}));
        assert_eq!(tracker.inflight(), 0);
        assert!(!tracker.observe("Page.loadEventFired", &json!({})));
    }

    #[test]
    fn busy_while_requests_are_open() {
        let tracker = NetworkTracker::new();
        tracker.request_started("a");
        assert!(!tracker.is_quiet(Duration::ZERO));
        tracker.request_finished("a");
        assert!(tracker.is_quiet(Duration::ZERO));
    }

    #[test]
    fn quiet_window_must_elapse() {
        let tracker = NetworkTracker::new();
        tracker.request_started("a");
        tracker.request_finished("a");
        assert!(!tracker.is_quiet(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(tracker.is_quiet(Duration::from_millis(10)));
    }

    #[test]
    fn reset_forgets_open_requests() {
        let tracker = NetworkTracker::new();
        tracker.request_started("a");
        tracker.request_started("b");
        tracker.reset();
        assert_eq!(tracker.inflight(), 0);
        assert!(!tracker.is_quiet(Duration::from_secs(60)));
    }

    #[test]
    fn finishing_unknown_request_is_harmless() {
        let tracker = NetworkTracker::new();
        tracker.request_finished("ghost");
        assert_eq!(tracker.inflight(), 0);
    }
}
