use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;
use tokio::fs;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};
use crate::config::AppConfig;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (default)
    Show,

    /// Get one configuration value by dotted key, e.g. `loop.max_turns`
    Get {
        /// Configuration key
        key: String,
    },

    /// Print the resolved configuration file path
    Path,

    /// Validate the configuration file
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path();
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let redacted = ctx.config().redacted();
            if ctx.output() == OutputFormat::Human {
                let source = if ctx.config_from_file() {
                    path.display().to_string()
                } else {
                    format!("defaults; {} not found", path.display())
                };
                println!("Effective configuration ({source}):");
                print!("{}", serde_yaml::to_string(&redacted)?);
            } else {
                emit_structured(&redacted, ctx.output())?;
            }
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config().redacted())?;
            let segments = split_key(&key)?;
            let Some(value) = get_json_value(&json, &segments) else {
                bail!("{} not found in configuration", key);
            };
            if ctx.output() == OutputFormat::Human {
                print!("{}", serde_yaml::to_string(value)?);
            } else {
                emit_structured(value, ctx.output())?;
            }
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Validate => {
            if fs::try_exists(path).await? {
                let raw = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let parsed: AppConfig = serde_yaml::from_str(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
                parsed.action_loop.validate()?;
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
    }

    Ok(())
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
