use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};

use crate::error::{AdapterError, AdapterErrorKind};

/// Chromium prints `DevTools listening on ws://...` once its endpoint is up.
const ANNOUNCEMENT: &str = "DevTools listening on ";

/// Stderr lines kept for the error message when no endpoint shows up.
const PREVIEW_LINES: usize = 6;

/// The browser websocket URL announced on `line`, if any.
pub(crate) fn devtools_endpoint(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once(ANNOUNCEMENT)?;
    let url = rest.trim();
    (url.starts_with("ws://") || url.starts_with("wss://")).then_some(url)
}

/// Wait up to `limit` for a freshly spawned Chromium to announce its endpoint.
pub(crate) async fn await_devtools_endpoint(
    child: &mut Child,
    limit: Duration,
) -> Result<String, AdapterError> {
    let stderr = child.stderr.take().ok_or_else(|| {
        AdapterError::new(AdapterErrorKind::CdpIo).with_hint("chromium stderr is not piped")
    })?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::with_capacity(PREVIEW_LINES);

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    return Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))
                }
            };
            if let Some(url) = devtools_endpoint(&line) {
                return Ok(url.to_string());
            }
            if preview.len() < PREVIEW_LINES {
                preview.push(line);
            }
        }
        Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!(
            "chromium exited without a devtools endpoint; stderr: {}",
            preview.join(" | ")
        )))
    };

    timeout(limit, scan).await.map_err(|_| {
        AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("no devtools endpoint within {}s", limit.as_secs()))
    })?
}
