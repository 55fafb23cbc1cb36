//! Browser pages as action-loop surfaces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use action_primitives::{Action, Frame, MouseButton, Point, Surface, SurfaceError};
use async_trait::async_trait;
use base64::Engine;
use paperpilot_core_types::Viewport;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::keys::{resolve_key, KeySpec};
use crate::metrics::{SettleOutcome, SurfaceMetrics};
use crate::network::NetworkTracker;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

/// One Chromium instance able to open page surfaces.
pub struct CdpBrowser {
    transport: Arc<dyn CdpTransport>,
    cfg: CdpConfig,
    metrics: Option<SurfaceMetrics>,
}

impl CdpBrowser {
    /// Launch Chromium, or attach when `cfg.websocket_url` is set.
    pub async fn launch(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let transport = Arc::new(ChromiumTransport::new(cfg.clone()));
        transport.start().await?;
        Ok(Self::with_transport(transport, cfg))
    }

    pub fn with_transport(transport: Arc<dyn CdpTransport>, cfg: CdpConfig) -> Self {
        Self {
            transport,
            cfg,
            metrics: None,
        }
    }

    /// Record every surface opened from now on into `metrics`.
    pub fn with_metrics(mut self, metrics: SurfaceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Open a fresh page target sized to `viewport` and navigate it to `url`.
    pub async fn open_surface(
        &self,
        url: &str,
        viewport: Viewport,
    ) -> Result<CdpSurface, AdapterError> {
        let events = self.transport.subscribe();

        let created = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = match self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await
        {
            Ok(value) => value,
            Err(err) => {
                self.close_target(&target_id).await;
                return Err(err);
            }
        };
        let session_id = match string_field(&attached, "sessionId") {
            Ok(id) => id,
            Err(err) => {
                self.close_target(&target_id).await;
                return Err(err);
            }
        };

        let surface = CdpSurface::new(
            self.transport.clone(),
            events,
            target_id,
            session_id,
            viewport,
            &self.cfg,
            self.metrics.clone(),
        );

        if let Err(err) = surface.prepare(url, &self.cfg).await {
            if let Err(release_err) = surface.release().await {
                debug!(target: "cdp-surface", ?release_err, "release after failed open");
            }
            return Err(err);
        }

        if let Some(metrics) = &self.metrics {
            metrics.surface_opened();
        }
        info!(
            target: "cdp-surface",
            target_id = %surface.target_id,
            viewport = %viewport,
            url = %url,
            "surface opened"
        );
        Ok(surface)
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }

    async fn close_target(&self, target_id: &str) {
        if let Err(err) = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": target_id }),
            )
            .await
        {
            debug!(target: "cdp-surface", ?err, "closing half-opened target failed");
        }
    }
}

/// A single page target driven over a flattened CDP session.
pub struct CdpSurface {
    transport: Arc<dyn CdpTransport>,
    target_id: String,
    session_id: String,
    viewport: Viewport,
    network: Arc<NetworkTracker>,
    /// Set when the browser reports the target gone.
    detached: Arc<AtomicBool>,
    released: AtomicBool,
    pump: JoinHandle<()>,
    quiet_window: Duration,
    poll_interval: Duration,
    metrics: Option<SurfaceMetrics>,
}

impl CdpSurface {
    fn new(
        transport: Arc<dyn CdpTransport>,
        events: broadcast::Receiver<TransportEvent>,
        target_id: String,
        session_id: String,
        viewport: Viewport,
        cfg: &CdpConfig,
        metrics: Option<SurfaceMetrics>,
    ) -> Self {
        let network = Arc::new(NetworkTracker::new());
        let detached = Arc::new(AtomicBool::new(false));
        let pump = spawn_event_pump(
            events,
            target_id.clone(),
            session_id.clone(),
            network.clone(),
            detached.clone(),
        );
        Self {
            transport,
            target_id,
            session_id,
            viewport,
            network,
            detached,
            released: AtomicBool::new(false),
            pump,
            quiet_window: Duration::from_millis(cfg.network_quiet_ms),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            metrics,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Requests currently in flight on this page.
    pub fn inflight_requests(&self) -> usize {
        self.network.inflight()
    }

    async fn prepare(&self, url: &str, cfg: &CdpConfig) -> Result<(), AdapterError> {
        self.command(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": self.viewport.width,
                "height": self.viewport.height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;
        self.command("Page.enable", json!({})).await?;
        self.command("Network.enable", json!({})).await?;

        if url.is_empty() || url == "about:blank" {
            return Ok(());
        }

        let navigated = self.command("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = navigated.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(AdapterError::new(AdapterErrorKind::Protocol)
                    .with_hint(format!("navigation to {url} failed: {error_text}")));
            }
        }

        let timeout = Duration::from_millis(cfg.navigation_timeout_ms);
        if !self.await_quiescent(timeout).await {
            warn!(target: "cdp-surface", url = %url, "initial page load still busy; continuing");
        }
        Ok(())
    }

    fn is_gone(&self) -> bool {
        self.released.load(Ordering::SeqCst) || self.detached.load(Ordering::SeqCst)
    }

    /// Send one command on this page's session.
    async fn command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        if self.is_gone() {
            return Err(AdapterError::new(AdapterErrorKind::TargetClosed)
                .with_hint(format!("surface {} is no longer open", self.target_id)));
        }

        let result = self
            .transport
            .send_command(CommandTarget::Session(self.session_id.clone()), method, params)
            .await;
        if let Err(err) = &result {
            debug!(target: "cdp-surface", method, %err, "command failed");
        }
        result
    }

    async fn mouse(&self, params: Value) -> Result<(), SurfaceError> {
        self.command("Input.dispatchMouseEvent", params).await?;
        Ok(())
    }

    async fn click_at(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        click_count: u32,
    ) -> Result<(), SurfaceError> {
        let (name, mask) = cdp_button(button);
        self.mouse(mouse_event("mousePressed", x, y, name, mask, click_count))
            .await?;
        self.mouse(mouse_event("mouseReleased", x, y, name, 0, click_count))
            .await
    }

    /// Press `keys` as one chord: every key goes down in order, then all are
    /// released in reverse. `["CTRL", "A"]` is select-all, not two taps.
    async fn press_keys(&self, keys: &[String]) -> Result<(), SurfaceError> {
        let specs = keys
            .iter()
            .map(|name| {
                resolve_key(name)
                    .ok_or_else(|| SurfaceError::Unsupported(format!("unknown key '{name}'")))
            })
            .collect::<Result<Vec<KeySpec>, _>>()?;

        let mut modifiers = 0;
        for spec in &specs {
            modifiers |= spec.modifier_bit();
            self.command("Input.dispatchKeyEvent", spec.down_event(modifiers))
                .await?;
        }
        for spec in specs.iter().rev() {
            modifiers &= !spec.modifier_bit();
            self.command("Input.dispatchKeyEvent", spec.up_event(modifiers))
                .await?;
        }
        Ok(())
    }

    async fn drag(&self, path: &[Point]) -> Result<(), SurfaceError> {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return Err(SurfaceError::Unsupported("drag without a path".into()));
        };
        self.mouse(mouse_event("mouseMoved", first.x, first.y, "none", 0, 0))
            .await?;
        self.mouse(mouse_event("mousePressed", first.x, first.y, "left", 1, 1))
            .await?;
        for point in &path[1..] {
            self.mouse(mouse_event("mouseMoved", point.x, point.y, "left", 1, 0))
                .await?;
        }
        self.mouse(mouse_event("mouseReleased", last.x, last.y, "left", 0, 1))
            .await
    }

    async fn ready_state(&self) -> Result<String, AdapterError> {
        let value = self
            .command(
                "Runtime.evaluate",
                json!({ "expression": "document.readyState", "returnByValue": true }),
            )
            .await?;
        Ok(value
            .pointer("/result/value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn current_url(&self) -> Option<String> {
        let value = self
            .command(
                "Runtime.evaluate",
                json!({ "expression": "window.location.href", "returnByValue": true }),
            )
            .await
            .ok()?;
        value
            .pointer("/result/value")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl CdpSurface {
    async fn capture(&self) -> Result<Frame, SurfaceError> {
        let shot = self
            .command(
                "Page.captureScreenshot",
                json!({ "format": "png", "fromSurface": true }),
            )
            .await?;
        let data = shot
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| SurfaceError::Protocol("screenshot response missing data".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|err| SurfaceError::Protocol(format!("screenshot decode failed: {err}")))?;

        let frame = Frame::png(bytes);
        Ok(match self.current_url().await {
            Some(url) => frame.with_url(url),
            None => frame,
        })
    }

    async fn perform(&self, action: &Action) -> Result<(), SurfaceError> {
        match action {
            Action::Click { x, y, button } => {
                self.mouse(mouse_event("mouseMoved", *x, *y, "none", 0, 0))
                    .await?;
                self.click_at(*x, *y, *button, 1).await
            }
            Action::DoubleClick { x, y } => {
                self.mouse(mouse_event("mouseMoved", *x, *y, "none", 0, 0))
                    .await?;
                self.click_at(*x, *y, MouseButton::Left, 1).await?;
                self.click_at(*x, *y, MouseButton::Left, 2).await
            }
            Action::Move { x, y } => {
                self.mouse(mouse_event("mouseMoved", *x, *y, "none", 0, 0))
                    .await
            }
            Action::Drag { path } => self.drag(path).await,
            Action::TypeText { text } => {
                self.command("Input.insertText", json!({ "text": text }))
                    .await?;
                Ok(())
            }
            Action::KeySequence { keys } => self.press_keys(keys).await,
            Action::Scroll {
                x,
                y,
                delta_x,
                delta_y,
            } => {
                self.mouse(mouse_event("mouseMoved", *x, *y, "none", 0, 0))
                    .await?;
                self.mouse(json!({
                    "type": "mouseWheel",
                    "x": x,
                    "y": y,
                    "deltaX": delta_x,
                    "deltaY": delta_y,
                }))
                .await
            }
            Action::Wait | Action::Screenshot => Ok(()),
        }
    }

    /// Poll until the document is complete and the network is quiet.
    async fn settle(&self, timeout: Duration) -> SettleOutcome {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_gone() {
                return SettleOutcome::Gone;
            }
            match self.ready_state().await {
                Ok(state) if state == "complete" && self.network.is_quiet(self.quiet_window) => {
                    return SettleOutcome::Quiet;
                }
                Ok(_) => {}
                Err(err)
                    if matches!(
                        err.kind,
                        AdapterErrorKind::TargetClosed | AdapterErrorKind::Disconnected
                    ) =>
                {
                    return SettleOutcome::Gone;
                }
                // evaluate fails while a navigation swaps the execution context
                Err(err) => debug!(target: "cdp-surface", %err, "readyState check failed"),
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                debug!(
                    target: "cdp-surface",
                    inflight = self.inflight_requests(),
                    "page still busy at the settle deadline"
                );
                return SettleOutcome::Busy;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl Surface for CdpSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn capture_frame(&self) -> Result<Frame, SurfaceError> {
        let started = Instant::now();
        let result = self.capture().await;
        if let Some(metrics) = &self.metrics {
            metrics.capture(result.is_ok(), started.elapsed());
        }
        result
    }

    async fn dispatch(&self, action: &Action) -> Result<(), SurfaceError> {
        debug!(target: "cdp-surface", action = %action.summary(), "dispatching");
        let result = self.perform(action).await;
        if let Some(metrics) = &self.metrics {
            metrics.dispatch(action.kind().as_str(), result.is_ok());
        }
        result
    }

    async fn await_quiescent(&self, timeout: Duration) -> bool {
        let outcome = self.settle(timeout).await;
        if let Some(metrics) = &self.metrics {
            metrics.settle(outcome);
        }
        outcome == SettleOutcome::Quiet
    }

    async fn release(&self) -> Result<(), SurfaceError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.pump.abort();

        if self.detached.load(Ordering::SeqCst) {
            debug!(target: "cdp-surface", target_id = %self.target_id, "target already gone");
            return Ok(());
        }

        match self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await
        {
            Ok(_) => {
                info!(target: "cdp-surface", target_id = %self.target_id, "surface released");
                Ok(())
            }
            Err(err) if err.kind == AdapterErrorKind::TargetClosed => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for CdpSurface {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

fn spawn_event_pump(
    mut events: broadcast::Receiver<TransportEvent>,
    target_id: String,
    session_id: String,
    network: Arc<NetworkTracker>,
    detached: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    // a dropped loadingFinished would pin a request forever
                    warn!(target: "cdp-surface", skipped, "event pump lagged; forgetting requests");
                    network.reset();
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match event.session_id.as_deref() {
                Some(id) if id == session_id => {
                    if !network.observe(&event.method, &event.params)
                        && event.method == "Inspector.detached"
                    {
                        detached.store(true, Ordering::SeqCst);
                    }
                }
                Some(_) => {}
                None => {
                    let gone = match event.method.as_str() {
                        "Target.targetDestroyed" | "Target.targetCrashed" => {
                            event.params.get("targetId").and_then(Value::as_str)
                                == Some(target_id.as_str())
                        }
                        "Target.detachedFromTarget" => {
                            event.params.get("sessionId").and_then(Value::as_str)
                                == Some(session_id.as_str())
                        }
                        _ => false,
                    };
                    if gone {
                        debug!(target: "cdp-surface", target_id = %target_id, "target went away");
                        detached.store(true, Ordering::SeqCst);
                    }
                }
            }
        }
    })
}

fn cdp_button(button: MouseButton) -> (&'static str, u32) {
    match button {
        MouseButton::Left => ("left", 1),
        MouseButton::Right => ("right", 2),
        MouseButton::Middle | MouseButton::Wheel => ("middle", 4),
        MouseButton::Back => ("back", 8),
        MouseButton::Forward => ("forward", 16),
    }
}

fn mouse_event(kind: &str, x: i32, y: i32, button: &str, buttons: u32, click_count: u32) -> Value {
    json!({
        "type": kind,
        "x": x,
        "y": y,
        "button": button,
        "buttons": buttons,
        "clickCount": click_count,
    })
}

fn string_field(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Protocol)
                .with_hint(format!("response missing {field}: {value}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::render;
    use prometheus::Registry;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Answers commands from a fixed table and records what was sent.
    struct ScriptedTransport {
        sent: Mutex<Vec<(CommandTarget, String, Value)>>,
        events: broadcast::Sender<TransportEvent>,
        ready_state: Mutex<&'static str>,
        /// readyState evaluations to fail before answering.
        readiness_failures: AtomicUsize,
        close_error: Option<AdapterErrorKind>,
    }

    impl ScriptedTransport {
        fn new() -> Arc<Self> {
            Self::build(None)
        }

        fn build(close_error: Option<AdapterErrorKind>) -> Arc<Self> {
            let (events, _) = broadcast::channel(64);
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                events,
                ready_state: Mutex::new("complete"),
                readiness_failures: AtomicUsize::new(0),
                close_error,
            })
        }

        fn methods(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, method, _)| method.clone())
                .collect()
        }

        fn params_of(&self, method: &str) -> Vec<Value> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, m, _)| m == method)
                .map(|(_, _, params)| params.clone())
                .collect()
        }

        fn emit(&self, method: &str, params: Value, session_id: Option<&str>) {
            let _ = self.events.send(TransportEvent {
                method: method.to_string(),
                params,
                session_id: session_id.map(str::to_string),
            });
        }
    }

    #[async_trait]
    impl CdpTransport for ScriptedTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
            self.events.subscribe()
        }

        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            self.sent
                .lock()
                .unwrap()
                .push((target, method.to_string(), params.clone()));
            match method {
                "Target.createTarget" => Ok(json!({ "targetId": "T1" })),
                "Target.attachToTarget" => Ok(json!({ "sessionId": "S1" })),
                "Target.closeTarget" => match &self.close_error {
                    Some(kind) => Err(AdapterError::new(kind.clone())),
                    None => Ok(json!({ "success": true })),
                },
                "Page.captureScreenshot" => Ok(json!({ "data": "iVBORw==" })),
                "Page.navigate" => Ok(json!({ "frameId": "F1" })),
                "Runtime.evaluate" => {
                    let expression = params["expression"].as_str().unwrap_or_default();
                    if expression.contains("readyState") {
                        let failing = self
                            .readiness_failures
                            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                            .is_ok();
                        if failing {
                            return Err(AdapterError::new(AdapterErrorKind::Protocol)
                                .with_hint("Execution context was destroyed."));
                        }
                        let state = *self.ready_state.lock().unwrap();
                        Ok(json!({ "result": { "type": "string", "value": state } }))
                    } else {
                        Ok(json!({ "result": { "type": "string", "value": "https://example.org/" } }))
                    }
                }
                _ => Ok(json!({})),
            }
        }

        async fn shutdown(&self) {}
    }

    fn test_config() -> CdpConfig {
        CdpConfig {
            network_quiet_ms: 0,
            poll_interval_ms: 5,
            navigation_timeout_ms: 200,
            ..CdpConfig::default()
        }
    }

    async fn open(transport: Arc<ScriptedTransport>) -> CdpSurface {
        CdpBrowser::with_transport(transport, test_config())
            .open_surface("about:blank", Viewport::default())
            .await
            .expect("surface opens")
    }

    #[tokio::test]
    async fn open_surface_sets_up_the_page() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;

        assert_eq!(surface.target_id(), "T1");
        assert_eq!(surface.session_id(), "S1");
        assert_eq!(
            transport.methods(),
            vec![
                "Target.createTarget",
                "Target.attachToTarget",
                "Emulation.setDeviceMetricsOverride",
                "Page.enable",
                "Network.enable",
            ]
        );
        let metrics = &transport.params_of("Emulation.setDeviceMetricsOverride")[0];
        assert_eq!(metrics["width"], 1280);
        assert_eq!(metrics["height"], 800);
    }

    #[tokio::test]
    async fn open_surface_navigates_when_given_a_url() {
        let transport = ScriptedTransport::new();
        CdpBrowser::with_transport(transport.clone(), test_config())
            .open_surface("https://example.org/", Viewport::default())
            .await
            .unwrap();
        assert_eq!(
            transport.params_of("Page.navigate")[0]["url"],
            "https://example.org/"
        );
    }

    #[tokio::test]
    async fn click_sends_move_press_release_on_the_session() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        surface.dispatch(&Action::click(100, 200)).await.unwrap();

        let sent = transport.sent.lock().unwrap().clone();
        let mouse: Vec<_> = sent
            .iter()
            .filter(|(_, m, _)| m == "Input.dispatchMouseEvent")
            .collect();
        assert_eq!(mouse.len(), 3);
        assert!(mouse
            .iter()
            .all(|(target, _, _)| *target == CommandTarget::Session("S1".into())));
        assert_eq!(mouse[1].2["type"], "mousePressed");
        assert_eq!(mouse[1].2["button"], "left");
        assert_eq!(mouse[1].2["x"], 100);
        assert_eq!(mouse[2].2["type"], "mouseReleased");
    }

    #[tokio::test]
    async fn scroll_moves_then_wheels() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        surface
            .dispatch(&Action::Scroll {
                x: 10,
                y: 20,
                delta_x: 0,
                delta_y: 300,
            })
            .await
            .unwrap();
        let events = transport.params_of("Input.dispatchMouseEvent");
        assert_eq!(events[0]["type"], "mouseMoved");
        assert_eq!(events[1]["type"], "mouseWheel");
        assert_eq!(events[1]["deltaY"], 300);
    }

    #[tokio::test]
    async fn typing_inserts_text() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        surface
            .dispatch(&Action::TypeText {
                text: "quantum dots".into(),
            })
            .await
            .unwrap();
        assert_eq!(transport.params_of("Input.insertText")[0]["text"], "quantum dots");
    }

    #[tokio::test]
    async fn key_chords_press_in_order_and_release_in_reverse() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        surface
            .dispatch(&Action::KeySequence {
                keys: vec!["CTRL".into(), "a".into()],
            })
            .await
            .unwrap();
        let keys: Vec<(String, String)> = transport
            .params_of("Input.dispatchKeyEvent")
            .iter()
            .map(|p| {
                (
                    p["type"].as_str().unwrap().to_string(),
                    p["key"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                ("rawKeyDown".to_string(), "Control".to_string()),
                ("rawKeyDown".to_string(), "a".to_string()),
                ("keyUp".to_string(), "a".to_string()),
                ("keyUp".to_string(), "Control".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_key_is_unsupported_and_sends_nothing() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        let err = surface
            .dispatch(&Action::KeySequence {
                keys: vec!["ENTER".into(), "WARP".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Unsupported(_)));
        assert!(transport.params_of("Input.dispatchKeyEvent").is_empty());
    }

    #[tokio::test]
    async fn capture_decodes_png_and_url() {
        let transport = ScriptedTransport::new();
        let surface = open(transport).await;
        let frame = surface.capture_frame().await.unwrap();
        assert_eq!(&frame.data[..4], &[0x89, b'P', b'N', b'G']);
        assert_eq!(frame.url.as_deref(), Some("https://example.org/"));
    }

    #[tokio::test]
    async fn quiescent_when_complete_and_idle() {
        let transport = ScriptedTransport::new();
        let surface = open(transport).await;
        assert!(surface.await_quiescent(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn not_quiescent_while_loading() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        *transport.ready_state.lock().unwrap() = "loading";
        assert!(!surface.await_quiescent(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn not_quiescent_with_requests_in_flight() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        transport.emit(
            "Network.requestWillBeSent",
            json!({ "requestId": "r1" }),
            Some("S1"),
        );
        // events from other sessions are ignored
        transport.emit(
            "Network.requestWillBeSent",
            json!({ "requestId": "r2" }),
            Some("S2"),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(surface.inflight_requests(), 1);
        assert!(!surface.await_quiescent(Duration::from_millis(30)).await);

        transport.emit(
            "Network.loadingFinished",
            json!({ "requestId": "r1" }),
            Some("S1"),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(surface.await_quiescent(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn quiescence_outlives_a_swapped_execution_context() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        transport.readiness_failures.store(2, Ordering::SeqCst);

        assert!(surface.await_quiescent(Duration::from_millis(200)).await);
        let checks = transport
            .params_of("Runtime.evaluate")
            .iter()
            .filter(|p| p["expression"] == "document.readyState")
            .count();
        assert_eq!(checks, 3);
    }

    #[tokio::test]
    async fn lagging_pump_forgets_stale_requests() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        transport.emit(
            "Network.requestWillBeSent",
            json!({ "requestId": "r1" }),
            Some("S1"),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(surface.inflight_requests(), 1);

        // overflow the 64-slot channel; the finish event for r1 is lost
        for _ in 0..100 {
            transport.emit("Page.frameNavigated", json!({}), Some("S1"));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(surface.inflight_requests(), 0);
        assert!(surface.await_quiescent(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn metrics_follow_surface_operations() {
        let registry = Registry::new();
        let metrics = SurfaceMetrics::register(&registry).unwrap();
        let transport = ScriptedTransport::new();
        let surface = CdpBrowser::with_transport(transport.clone(), test_config())
            .with_metrics(metrics)
            .open_surface("about:blank", Viewport::default())
            .await
            .unwrap();

        surface.capture_frame().await.unwrap();
        surface.dispatch(&Action::click(3, 4)).await.unwrap();
        surface
            .dispatch(&Action::KeySequence {
                keys: vec!["WARP".into()],
            })
            .await
            .unwrap_err();
        assert!(surface.await_quiescent(Duration::from_millis(100)).await);
        surface.release().await.unwrap();
        assert!(!surface.await_quiescent(Duration::from_millis(10)).await);

        let text = render(&registry).unwrap();
        assert!(text.contains("paperpilot_cdp_surfaces_opened_total 1"));
        assert!(text.contains(r#"paperpilot_cdp_captures_total{outcome="ok"} 1"#));
        assert!(text.contains(r#"paperpilot_cdp_dispatches_total{action="click",outcome="ok"} 1"#));
        assert!(text.contains(
            r#"paperpilot_cdp_dispatches_total{action="key_sequence",outcome="error"} 1"#
        ));
        assert!(text.contains(r#"paperpilot_cdp_settles_total{outcome="quiet"} 1"#));
        assert!(text.contains(r#"paperpilot_cdp_settles_total{outcome="gone"} 1"#));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        surface.release().await.unwrap();
        surface.release().await.unwrap();
        assert_eq!(transport.params_of("Target.closeTarget").len(), 1);

        let err = surface.dispatch(&Action::click(1, 1)).await.unwrap_err();
        assert!(matches!(err, SurfaceError::Closed(_)));
        assert!(!surface.await_quiescent(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn release_tolerates_an_already_closed_target() {
        let transport = ScriptedTransport::build(Some(AdapterErrorKind::TargetClosed));
        let surface = open(transport).await;
        assert!(surface.release().await.is_ok());
    }

    #[tokio::test]
    async fn destroyed_target_closes_the_surface() {
        let transport = ScriptedTransport::new();
        let surface = open(transport.clone()).await;
        transport.emit("Target.targetDestroyed", json!({ "targetId": "T1" }), None);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = surface.capture_frame().await.unwrap_err();
        assert!(matches!(err, SurfaceError::Closed(_)));
        surface.release().await.unwrap();
        assert!(transport.params_of("Target.closeTarget").is_empty());
    }
}
