use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use super::context::CliContext;
use super::output::emit_result;
use crate::tasks::ResearchTask;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Natural-language goal for the session
    #[arg(short, long)]
    pub goal: String,

    /// Page to open before the first turn (defaults to browser.start_url)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Override loop.max_turns
    #[arg(long)]
    pub max_turns: Option<u32>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    execute(
        ctx,
        Work::Goal(args.goal),
        args.url.as_deref(),
        args.max_turns,
    )
    .await
}

pub(crate) enum Work {
    Goal(String),
    Task(ResearchTask),
}

/// Run one session on a fresh Chrome surface and report its result. A
/// `Failed` terminal result is returned as an error so the process exits 1.
pub(crate) async fn execute(
    ctx: &CliContext,
    work: Work,
    url: Option<&str>,
    max_turns: Option<u32>,
) -> Result<()> {
    let runner = ctx.task_runner(max_turns)?;
    // Reject unusable inputs before a browser is launched.
    match &work {
        Work::Goal(goal) if goal.trim().is_empty() => bail!("goal cannot be empty"),
        Work::Goal(_) => {}
        Work::Task(task) => {
            task.goal(&ctx.config().credentials)?;
        }
    }

    let (browser, surface) = ctx.open_surface(url).await?;
    let outcome = match &work {
        Work::Goal(goal) => runner.run_goal(surface, goal).await,
        Work::Task(task) => runner.run(surface, task).await,
    };
    browser.shutdown().await;

    let result = outcome?;
    emit_result(&result, ctx.output())?;
    match result.failure() {
        None => {
            info!(session = %result.session_id, "session completed");
            Ok(())
        }
        Some(reason) => bail!("session {} failed: {}", result.session_id, reason),
    }
}
