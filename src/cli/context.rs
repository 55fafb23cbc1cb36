use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_core::{ActionLoopDriver, PlanningOracle};
use anyhow::{Context, Result};
use cdp_adapter::{metrics, CdpBrowser, CdpSurface, SurfaceMetrics};
use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::output::OutputFormat;
use crate::config::AppConfig;
use crate::llm::OpenAiComputerUseOracle;
use crate::tasks::TaskRunner;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    config_from_file: bool,
    output: OutputFormat,
    registry: Registry,
    surface_metrics: Option<SurfaceMetrics>,
}

impl CliContext {
    pub fn new(
        config: AppConfig,
        config_path: PathBuf,
        config_from_file: bool,
        output: OutputFormat,
    ) -> Self {
        let registry = Registry::new();
        let surface_metrics = match SurfaceMetrics::register(&registry) {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                warn!(?err, "surface metrics disabled");
                None
            }
        };
        Self {
            config: Arc::new(config),
            config_path,
            config_from_file,
            output,
            registry,
            surface_metrics,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_from_file(&self) -> bool {
        self.config_from_file
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Everything recorded so far, in prometheus text format.
    pub fn render_metrics(&self) -> Result<String> {
        metrics::render(&self.registry).context("failed to encode metrics")
    }

    pub fn oracle(&self) -> Result<Arc<dyn PlanningOracle>> {
        let oracle = OpenAiComputerUseOracle::new(&self.config.oracle)
            .context("set OPENAI_API_KEY or oracle.api_key")?;
        Ok(Arc::new(oracle))
    }

    /// Runner wired to the configured oracle; cancelled on Ctrl-C.
    pub fn task_runner(&self, max_turns: Option<u32>) -> Result<TaskRunner> {
        let mut loop_config = self.config.action_loop.clone();
        if let Some(turns) = max_turns {
            loop_config = loop_config.max_turns(turns);
        }
        loop_config.validate()?;
        let driver = ActionLoopDriver::new(self.oracle()?, loop_config);
        Ok(TaskRunner::new(driver, self.config.credentials.clone()).with_cancel(ctrl_c_token()))
    }

    /// Launch Chrome and open one surface at `url` (or the configured start page).
    pub async fn open_surface(&self, url: Option<&str>) -> Result<(CdpBrowser, CdpSurface)> {
        let browser_cfg = &self.config.browser;
        let url = url.unwrap_or(browser_cfg.start_url.as_str());
        let mut browser = CdpBrowser::launch(browser_cfg.cdp.clone())
            .await
            .context("failed to start Chrome")?;
        if let Some(metrics) = &self.surface_metrics {
            browser = browser.with_metrics(metrics.clone());
        }
        match browser.open_surface(url, browser_cfg.viewport).await {
            Ok(surface) => Ok((browser, surface)),
            Err(err) => {
                browser.shutdown().await;
                Err(err).with_context(|| format!("failed to open {url}"))
            }
        }
    }
}

fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received; cancelling session");
                trigger.cancel();
            }
            Err(err) => warn!(?err, "failed to listen for Ctrl-C"),
        }
    });
    token
}
