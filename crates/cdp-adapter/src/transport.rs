//! Websocket link to one Chromium process.
//!
//! [`ChromiumTransport`] connects once in [`CdpTransport::start`]. A single
//! pump task owns the chromiumoxide [`Connection`], forwards commands to it,
//! routes responses back by call id and broadcasts every event. When the
//! websocket goes away the pump ends and every later command fails with
//! [`AdapterErrorKind::Disconnected`]; the browser is never relaunched behind
//! a surface's back.

use std::collections::HashMap;
use std::convert::TryInto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::{future::BoxFuture, FutureExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::util::await_devtools_endpoint;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 1024;
const COMMAND_QUEUE: usize = 128;
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

/// Raw CDP command/event channel shared by every surface of one browser.
#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;

    /// Every event received after this call, for every session.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;

    /// Tear the connection down and stop any browser this transport launched.
    async fn shutdown(&self);
}

type Reply = oneshot::Sender<Result<Value, AdapterError>>;

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

type Connector = Arc<
    dyn Fn(
            CdpConfig,
            broadcast::Sender<TransportEvent>,
        ) -> BoxFuture<'static, Result<Link, AdapterError>>
        + Send
        + Sync,
>;

pub struct ChromiumTransport {
    cfg: CdpConfig,
    events: broadcast::Sender<TransportEvent>,
    connector: Connector,
    link: Mutex<Option<Link>>,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let connector: Connector =
            Arc::new(|cfg: CdpConfig, events: broadcast::Sender<TransportEvent>| {
                Link::open(cfg, events).boxed()
            });
        Self::with_connector(cfg, connector)
    }

    fn with_connector(cfg: CdpConfig, connector: Connector) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            cfg,
            events,
            connector,
            link: Mutex::new(None),
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    /// Command queue of the live link.
    async fn queue(&self) -> Result<mpsc::Sender<Outgoing>, AdapterError> {
        match self.link.lock().await.as_ref() {
            Some(link) if link.is_alive() => Ok(link.commands.clone()),
            Some(_) => Err(AdapterError::disconnected("browser connection lost")),
            None => Err(AdapterError::disconnected("transport not started")),
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let mut guard = self.link.lock().await;
        match guard.as_ref() {
            Some(link) if link.is_alive() => return Ok(()),
            Some(_) => return Err(AdapterError::disconnected("browser connection lost")),
            None => {}
        }

        let link = (self.connector)(self.cfg.clone(), self.events.clone()).await?;
        let discover = request(
            &link.commands,
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
            self.deadline(),
        )
        .await;
        if let Err(err) = discover {
            link.close().await;
            return Err(err);
        }
        *guard = Some(link);
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
        let queue = self.queue().await?;
        request(&queue, target, method, params, self.deadline()).await
    }

    async fn shutdown(&self) {
        let link = self.link.lock().await.take();
        if let Some(link) = link {
            link.close().await;
        }
    }
}

async fn request(
    queue: &mpsc::Sender<Outgoing>,
    target: CommandTarget,
    method: &str,
    params: Value,
    deadline: Duration,
) -> Result<Value, AdapterError> {
    let (reply, answer) = oneshot::channel();
    queue
        .send(Outgoing {
            target,
            method: method.to_string(),
            params,
            reply,
        })
        .await
        .map_err(|_| AdapterError::disconnected("command queue closed"))?;

    match tokio::time::timeout(deadline, answer).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AdapterError::disconnected(format!(
            "connection dropped while waiting for {method}"
        ))),
        Err(_) => Err(AdapterError::new(AdapterErrorKind::CommandTimeout)
            .with_hint(format!("{method} timed out"))),
    }
}

/// One live websocket plus the Chromium child it belongs to, if launched.
struct Link {
    commands: mpsc::Sender<Outgoing>,
    pump: JoinHandle<()>,
    alive: Arc<AtomicBool>,
    child: Mutex<Option<Child>>,
}

impl Link {
    async fn open(
        cfg: CdpConfig,
        events: broadcast::Sender<TransportEvent>,
    ) -> Result<Self, AdapterError> {
        let (child, endpoint) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let mut child = launch_config(&cfg)?.launch().map_err(|err| {
                    AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint(format!("failed to launch chromium: {err}"))
                })?;
                let endpoint = await_devtools_endpoint(&mut child, LAUNCH_TIMEOUT).await?;
                (Some(child), endpoint)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&endpoint)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;
        info!(target: "cdp-transport", endpoint = %endpoint, "connected to chromium");

        let (commands, queue) = mpsc::channel(COMMAND_QUEUE);
        let alive = Arc::new(AtomicBool::new(true));
        let pump_alive = alive.clone();
        let pump = tokio::spawn(async move {
            let reason = run_pump(conn, queue, events).await;
            pump_alive.store(false, Ordering::SeqCst);
            warn!(target: "cdp-transport", %reason, "chromium connection ended");
        });

        Ok(Self {
            commands,
            pump,
            alive,
            child: Mutex::new(child),
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.pump.is_finished()
    }

    async fn close(self) {
        self.alive.store(false, Ordering::SeqCst);
        self.pump.abort();
        if let Some(mut child) = self.child.lock().await.take() {
            match child.kill().await {
                Ok(_) => info!(target: "cdp-transport", "chromium stopped"),
                Err(err) => warn!(target: "cdp-transport", ?err, "failed to stop chromium"),
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.pump.abort();
        let Some(mut child) = self.child.get_mut().take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: "cdp-transport", ?err, "failed to stop chromium");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to stop chromium"),
        }
    }
}

/// Drive the connection until it closes; returns why it stopped.
async fn run_pump(
    mut conn: Connection<CdpEventMessage>,
    mut queue: mpsc::Receiver<Outgoing>,
    events: broadcast::Sender<TransportEvent>,
) -> AdapterError {
    let mut waiting: HashMap<CallId, Reply> = HashMap::new();

    let reason = loop {
        tokio::select! {
            outgoing = queue.recv() => {
                let Some(outgoing) = outgoing else {
                    break AdapterError::disconnected("transport dropped");
                };
                let session = match outgoing.target {
                    CommandTarget::Browser => None,
                    CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
                };
                let method: MethodId = outgoing.method.into();
                match conn.submit_command(method, session, outgoing.params) {
                    Ok(call_id) => {
                        waiting.insert(call_id, outgoing.reply);
                    }
                    Err(err) => {
                        let err = AdapterError::new(AdapterErrorKind::Internal)
                            .with_hint(format!("cannot submit command: {err}"));
                        let _ = outgoing.reply.send(Err(err));
                    }
                }
            }
            incoming = conn.next() => match incoming {
                Some(Ok(Message::Response(response))) => {
                    if let Some(reply) = waiting.remove(&response.id) {
                        let _ = reply.send(extract_payload(response));
                    }
                }
                Some(Ok(Message::Event(event))) => broadcast_event(event, &events),
                Some(Err(err)) => break connection_error(err),
                None => break AdapterError::disconnected("websocket closed"),
            },
        }
    };

    for (_, reply) in waiting.drain() {
        let _ = reply.send(Err(reason.clone()));
    }
    reason
}

fn broadcast_event(event: CdpEventMessage, events: &broadcast::Sender<TransportEvent>) {
    let raw: CdpJsonEventMessage = match event.try_into() {
        Ok(raw) => raw,
        Err(err) => {
            debug!(target: "cdp-transport", ?err, "undecodable event");
            return;
        }
    };
    // no receivers until the first surface subscribes
    let _ = events.send(TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    });
}

fn connection_error(err: CdpError) -> AdapterError {
    match err {
        CdpError::Timeout => {
            AdapterError::new(AdapterErrorKind::CommandTimeout).with_hint(err.to_string())
        }
        other => AdapterError::disconnected(other.to_string()),
    }
}

/// Split a command response into its result or a classified protocol error.
pub(crate) fn extract_payload(response: Response) -> Result<Value, AdapterError> {
    if let Some(result) = response.result {
        return Ok(result);
    }
    let Some(error) = response.error else {
        return Err(AdapterError::new(AdapterErrorKind::Internal).with_hint("empty cdp response"));
    };
    let message = error.message.to_ascii_lowercase();
    let kind = if message.contains("target closed") || message.contains("no target with given id")
    {
        AdapterErrorKind::TargetClosed
    } else {
        AdapterErrorKind::Protocol
    };
    Err(AdapterError::new(kind).with_hint(format!("cdp error {}: {}", error.code, error.message)))
}

fn launch_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let internal = |hint: String| AdapterError::new(AdapterErrorKind::Internal).with_hint(hint);

    if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
        return Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!(
            "chrome executable not found at {}; set PAPERPILOT_CHROME",
            cfg.executable.display()
        )));
    }

    let profile = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        std::env::current_dir()
            .map_err(|err| internal(format!("cannot resolve profile dir: {err}")))?
            .join(&cfg.user_data_dir)
    };
    std::fs::create_dir_all(&profile)
        .map_err(|err| internal(format!("cannot create profile dir: {err}")))?;

    let mut args = vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-extensions",
        "--disable-sync",
        "--disable-popup-blocking",
        "--disable-dev-shm-usage",
        "--password-store=basic",
        "--remote-allow-origins=*",
    ];
    if cfg.headless {
        args.extend(["--headless=new", "--hide-scrollbars", "--mute-audio"]);
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(LAUNCH_TIMEOUT)
        .user_data_dir(profile)
        .args(args);
    if !cfg.headless {
        builder = builder.with_head();
    }
    let no_sandbox = std::env::var("PAPERPILOT_DISABLE_SANDBOX")
        .is_ok_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));
    if no_sandbox {
        builder = builder.no_sandbox();
    }
    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder.build().map_err(internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// A link whose pump answers every command with `{}` until `alive` drops.
    fn echo_link() -> Link {
        let (commands, mut queue) = mpsc::channel::<Outgoing>(8);
        let alive = Arc::new(AtomicBool::new(true));
        let pump = tokio::spawn(async move {
            while let Some(outgoing) = queue.recv().await {
                let _ = outgoing.reply.send(Ok(json!({})));
            }
        });
        Link {
            commands,
            pump,
            alive,
            child: Mutex::new(None),
        }
    }

    /// Transport whose connector counts how often it is asked to connect.
    fn counting_transport() -> (ChromiumTransport, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = connects.clone();
        let connector: Connector = Arc::new(
            move |_cfg: CdpConfig, _events: broadcast::Sender<TransportEvent>| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(echo_link()) }.boxed()
            },
        );
        (
            ChromiumTransport::with_connector(CdpConfig::default(), connector),
            connects,
        )
    }

    async fn kill_link(transport: &ChromiumTransport) {
        let guard = transport.link.lock().await;
        guard.as_ref().unwrap().alive.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn commands_flow_once_started() {
        let (transport, connects) = counting_transport();
        transport.start().await.unwrap();
        transport.start().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        let value = transport
            .send_command(CommandTarget::Session("S1".into()), "Page.enable", json!({}))
            .await
            .unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn dead_connection_is_reported_not_relaunched() {
        let (transport, connects) = counting_transport();
        transport.start().await.unwrap();
        kill_link(&transport).await;

        let err = transport
            .send_command(CommandTarget::Browser, "Target.closeTarget", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Disconnected);
        assert_eq!(
            transport.start().await.unwrap_err().kind,
            AdapterErrorKind::Disconnected
        );
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn commands_before_start_do_not_connect() {
        let (transport, connects) = counting_transport();
        let err = transport
            .send_command(CommandTarget::Browser, "Browser.getVersion", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Disconnected);
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_allows_an_explicit_restart() {
        let (transport, connects) = counting_transport();
        transport.start().await.unwrap();
        transport.shutdown().await;
        assert!(transport.queue().await.is_err());

        transport.start().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        transport.shutdown().await;
        transport.shutdown().await;
    }

    #[test]
    fn protocol_errors_are_classified() {
        let gone: Response = serde_json::from_value(json!({
            "id": 7,
            "error": { "code": -32000, "message": "No target with given id found" }
        }))
        .unwrap();
        assert_eq!(
            extract_payload(gone).unwrap_err().kind,
            AdapterErrorKind::TargetClosed
        );

        let bad: Response = serde_json::from_value(json!({
            "id": 8,
            "error": { "code": -32602, "message": "Invalid parameters" }
        }))
        .unwrap();
        assert_eq!(extract_payload(bad).unwrap_err().kind, AdapterErrorKind::Protocol);
    }
}
