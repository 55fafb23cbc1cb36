use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};

pub async fn run() -> Result<()> {
    // before logging starts: local.env may set RUST_LOG or PAPERPILOT_LOG_FORMAT
    let env_report = load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;
    if let Some(report) = env_report {
        report.log();
    }

    info!("Starting paperpilot v{}", env!("CARGO_PKG_VERSION"));

    let LoadedConfig {
        config,
        path,
        from_file,
    } = load_config(cli.config.as_ref()).await?;
    let cli_context = CliContext::new(config, path, from_file, cli.output);

    let outcome = dispatch(cli.command, &cli_context).await;
    if cli.metrics {
        match cli_context.render_metrics() {
            Ok(text) => eprint!("{text}"),
            Err(err) => warn!("{:#}", err),
        }
    }

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
