//! Application configuration.
//!
//! One YAML document with four sections (`oracle`, `browser`, `loop`,
//! `credentials`). Missing sections and fields fall back to defaults; the
//! environment overrides the file.

use std::env;
use std::fmt;
use std::time::Duration;

use agent_core::ActionLoopConfig;
use cdp_adapter::CdpConfig;
use paperpilot_core_types::Viewport;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "computer-use-preview";
pub const DEFAULT_START_URL: &str = "about:blank";

const REDACTED: &str = "***";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub oracle: OracleSettings,
    pub browser: BrowserSettings,
    #[serde(rename = "loop")]
    pub action_loop: ActionLoopConfig,
    pub credentials: Credentials,
}

/// Settings for the OpenAI computer-use oracle.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub api_base: String,
    pub model: String,
    /// Usually supplied through `OPENAI_API_KEY` rather than the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// HTTP timeout for a single request.
    pub request_timeout_ms: u64,
}

impl OracleSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout_ms: 120_000,
        }
    }
}

impl fmt::Debug for OracleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleSettings")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Page every session starts from.
    pub start_url: String,
    pub viewport: Viewport,
    pub cdp: CdpConfig,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            viewport: Viewport::default(),
            cdp: CdpConfig::default(),
        }
    }
}

/// Site credentials handed to research tasks as plain strings.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub library_username: String,
    pub library_password: String,
    pub google_username: String,
    pub google_password: String,
}

impl Credentials {
    fn secrets(&self) -> [&str; 4] {
        [
            self.library_username.as_str(),
            self.library_password.as_str(),
            self.google_username.as_str(),
            self.google_password.as_str(),
        ]
    }

    /// Mask every credential value longer than four characters in `text`,
    /// keeping the first and last two characters. Longer values go first so
    /// a value embedded in another one cannot leave the rest in the clear.
    pub fn mask(&self, text: &str) -> String {
        let mut secrets = self.secrets();
        secrets.sort_by_key(|value| std::cmp::Reverse(value.chars().count()));

        let mut masked = text.to_string();
        for value in secrets {
            let chars: Vec<char> = value.chars().collect();
            if chars.len() <= 4 {
                continue;
            }
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[chars.len() - 2..].iter().collect();
            let replacement = format!("{head}{}{tail}", "*".repeat(chars.len() - 4));
            masked = masked.replace(value, &replacement);
        }
        masked
    }

    /// Copy with every non-empty value replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let hide = |value: &str| {
            if value.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };
        Self {
            library_username: hide(&self.library_username),
            library_password: hide(&self.library_password),
            google_username: hide(&self.google_username),
            google_password: hide(&self.google_password),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = self.redacted();
        f.debug_struct("Credentials")
            .field("library_username", &redacted.library_username)
            .field("library_password", &redacted.library_password)
            .field("google_username", &redacted.google_username)
            .field("google_password", &redacted.google_password)
            .finish()
    }
}

impl AppConfig {
    /// Apply `OPENAI_API_KEY` and `PAPERPILOT_*` variables on top of the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_var("OPENAI_API_KEY") {
            self.oracle.api_key = Some(key);
        }
        if let Some(base) = non_empty_var("PAPERPILOT_API_BASE") {
            self.oracle.api_base = base;
        }
        if let Some(model) = non_empty_var("PAPERPILOT_MODEL") {
            self.oracle.model = model;
        }
        if let Some(url) = non_empty_var("PAPERPILOT_START_URL") {
            self.browser.start_url = url;
        }
        if let Some(ws) = non_empty_var("PAPERPILOT_WS_URL") {
            self.browser.cdp.websocket_url = Some(ws);
        }
        if let Some(headless) = non_empty_var("PAPERPILOT_HEADLESS") {
            let lower = headless.to_ascii_lowercase();
            self.browser.cdp.headless = !matches!(lower.as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(turns) = parsed_var::<u32>("PAPERPILOT_MAX_TURNS") {
            self.action_loop.max_turns = turns;
        }

        let credentials = [
            ("PAPERPILOT_LIBRARY_USERNAME", &mut self.credentials.library_username),
            ("PAPERPILOT_LIBRARY_PASSWORD", &mut self.credentials.library_password),
            ("PAPERPILOT_GOOGLE_USERNAME", &mut self.credentials.google_username),
            ("PAPERPILOT_GOOGLE_PASSWORD", &mut self.credentials.google_password),
        ];
        for (name, slot) in credentials {
            if let Some(value) = non_empty_var(name) {
                *slot = value;
            }
        }
    }

    /// Copy safe to print: API key and credentials are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.oracle.api_key.is_some() {
            copy.oracle.api_key = Some(REDACTED.to_string());
        }
        copy.credentials = self.credentials.redacted();
        copy
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = non_empty_var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable override");
            None
        }
    }
}
