use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

/// Outcome of reading an env file, kept until logging is up.
#[derive(Debug, Default)]
pub struct EnvFileReport {
    pub path: PathBuf,
    /// Keys set from the file.
    pub applied: Vec<String>,
    /// 1-based numbers of lines that were not `KEY=VALUE`.
    pub malformed_lines: Vec<usize>,
    pub read_error: Option<String>,
}

impl EnvFileReport {
    pub fn log(&self) {
        let path = self.path.display();
        if let Some(err) = &self.read_error {
            warn!(path = %path, err = %err, "failed to read local.env overrides");
            return;
        }
        for line in &self.malformed_lines {
            warn!(path = %path, line, "invalid local.env entry; skipped");
        }
        info!(path = %path, keys = ?self.applied, "Loaded environment overrides from local.env");
    }
}

/// Load `config/local.env` into the process environment. Variables that are
/// already set win. `None` when the file does not exist.
pub fn load_local_env_overrides() -> Option<EnvFileReport> {
    load_env_file(Path::new("config/local.env"))
}

pub(crate) fn load_env_file(path: &Path) -> Option<EnvFileReport> {
    if !path.exists() {
        return None;
    }
    let mut report = EnvFileReport {
        path: path.to_path_buf(),
        ..EnvFileReport::default()
    };

    let contents = match stdfs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            report.read_error = Some(err.to_string());
            return Some(report);
        }
    };
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            report.malformed_lines.push(idx + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            report.malformed_lines.push(idx + 1);
            continue;
        }
        if env::var_os(key).is_some() {
            continue;
        }
        env::set_var(key, unescape_value(value.trim()));
        report.applied.push(key.to_string());
    }
    Some(report)
}

/// `RUST_LOG` wins over `level`; `debug` forces DEBUG. Logs go to stderr so
/// structured output on stdout stays parseable. `PAPERPILOT_LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));
    let json = env::var("PAPERPILOT_LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("failed to install tracing subscriber")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("failed to install tracing subscriber")?;
    }

    Ok(())
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    /// Whether `path` existed and was read.
    pub from_file: bool,
}

/// Resolve the config file path: `--config`, then `./config/config.yaml`,
/// then `<config_dir>/paperpilot/config.yaml`.
pub fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        return Ok(path.clone());
    }
    let local_config = PathBuf::from("config/config.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("paperpilot");
    path.push("config.yaml");
    Ok(path)
}

/// Read the config file (defaults when it is absent), then apply env overrides.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(config_path)?;

    let (mut config, from_file) = if path.exists() {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = if content.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        };
        info!("Loaded configuration from: {}", path.display());
        (config, true)
    } else {
        if config_path.is_some() {
            warn!("Config file not found, using defaults: {}", path.display());
        }
        (AppConfig::default(), false)
    };

    config.apply_env_overrides();
    Ok(LoadedConfig {
        config,
        path,
        from_file,
    })
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
