use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use which::which;

/// Launch and tuning knobs for one Chromium instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    /// Empty means "let chromiumoxide pick".
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Deadline applied to every CDP command.
    pub default_deadline_ms: u64,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    /// How long the network must stay idle to count as quiet.
    pub network_quiet_ms: u64,
    /// Poll interval while waiting for quiescence.
    pub poll_interval_ms: u64,
    /// Upper bound on the initial navigation of a new surface.
    pub navigation_timeout_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: env::var_os("PAPERPILOT_CHROME_PROFILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".paperpilot-profile")),
            headless: env_flag("PAPERPILOT_HEADLESS").unwrap_or(true),
            default_deadline_ms: 30_000,
            websocket_url: None,
            network_quiet_ms: 500,
            poll_interval_ms: 100,
            navigation_timeout_ms: 15_000,
        }
    }
}

/// `Some(false)` for 0/false/no/off, `Some(true)` for anything else set.
fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    let value = value.trim().to_ascii_lowercase();
    Some(!matches!(value.as_str(), "0" | "false" | "no" | "off"))
}

#[cfg(target_os = "windows")]
const EXECUTABLE_NAMES: &[&str] = &["chrome.exe", "chromium.exe", "msedge.exe"];
#[cfg(not(target_os = "windows"))]
const EXECUTABLE_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
];

/// Find a Chrome/Chromium binary.
///
/// Order: `PAPERPILOT_CHROME` (if the file exists), `PATH`, then the usual
/// install locations unless `PAPERPILOT_SKIP_OS_PATHS` is set.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    let explicit = env::var("PAPERPILOT_CHROME")
        .ok()
        .map(|raw| PathBuf::from(raw.trim()))
        .filter(|path| !path.as_os_str().is_empty() && path.exists());
    if explicit.is_some() {
        return explicit;
    }

    if let Some(found) = EXECUTABLE_NAMES.iter().find_map(|name| which(name).ok()) {
        return Some(found);
    }

    let skip_install_dirs = env::var("PAPERPILOT_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if skip_install_dirs {
        return None;
    }
    install_locations().into_iter().find(|path| path.exists())
}

fn install_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        return [
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "Chromium.app/Contents/MacOS/Chromium",
        ]
        .iter()
        .map(|app| PathBuf::from("/Applications").join(app))
        .collect();
    }
    if cfg!(target_os = "windows") {
        return ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(|key| env::var_os(key).map(PathBuf::from))
            .flat_map(|root| {
                [
                    root.join("Google/Chrome/Application/chrome.exe"),
                    root.join("Chromium/Application/chrome.exe"),
                ]
            })
            .collect();
    }
    ["google-chrome-stable", "google-chrome", "chromium-browser", "chromium"]
        .iter()
        .map(|name| PathBuf::from("/usr/bin").join(name))
        .collect()
}
