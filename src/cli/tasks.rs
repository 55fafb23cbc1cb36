use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio::fs;

use super::context::CliContext;
use super::run::{execute, Work};
use crate::tasks::{JournalGuidelines, ResearchTask, DRIVE_URL, LIBRARY_URL};

#[derive(Args, Clone, Debug)]
pub struct LibrarySearchArgs {
    /// Search query
    #[arg(short, long)]
    pub query: String,

    /// Override loop.max_turns
    #[arg(long)]
    pub max_turns: Option<u32>,
}

#[derive(Args, Clone, Debug)]
pub struct CreateDocArgs {
    /// Document title
    #[arg(short, long)]
    pub title: String,

    /// Section heading (repeatable; defaults to a standard paper outline)
    #[arg(short, long = "section")]
    pub sections: Vec<String>,
}

#[derive(Args, Clone, Debug)]
pub struct WriteDocArgs {
    /// Document URL
    #[arg(short, long)]
    pub url: String,

    /// Content to type
    #[arg(long, conflicts_with = "content_file", required_unless_present = "content_file")]
    pub content: Option<String>,

    /// Read the content from a file
    #[arg(long, value_name = "FILE")]
    pub content_file: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct FormatDocArgs {
    /// Document URL
    #[arg(short, long)]
    pub url: String,

    /// Journal guidelines (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub guidelines: PathBuf,
}

pub async fn cmd_library_search(args: LibrarySearchArgs, ctx: &CliContext) -> Result<()> {
    let task = ResearchTask::LibrarySearch { query: args.query };
    execute(ctx, Work::Task(task), Some(LIBRARY_URL), args.max_turns).await
}

pub async fn cmd_drive_login(ctx: &CliContext) -> Result<()> {
    execute(ctx, Work::Task(ResearchTask::DriveLogin), Some(DRIVE_URL), None).await
}

pub async fn cmd_create_doc(args: CreateDocArgs, ctx: &CliContext) -> Result<()> {
    let task = ResearchTask::CreateDocument {
        title: args.title,
        sections: args.sections,
    };
    execute(ctx, Work::Task(task), Some(DRIVE_URL), None).await
}

pub async fn cmd_write_doc(args: WriteDocArgs, ctx: &CliContext) -> Result<()> {
    let content = match (args.content, args.content_file) {
        (Some(content), _) => content,
        (None, Some(path)) => fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        (None, None) => bail!("either --content or --content-file is required"),
    };
    let task = ResearchTask::WriteDocument {
        url: args.url.clone(),
        content,
    };
    execute(ctx, Work::Task(task), Some(args.url.as_str()), None).await
}

pub async fn cmd_format_doc(args: FormatDocArgs, ctx: &CliContext) -> Result<()> {
    let raw = fs::read_to_string(&args.guidelines)
        .await
        .with_context(|| format!("reading {}", args.guidelines.display()))?;
    let guidelines = JournalGuidelines::from_yaml(&raw)
        .with_context(|| format!("parsing {}", args.guidelines.display()))?;
    let task = ResearchTask::FormatDocument {
        url: args.url.clone(),
        guidelines,
    };
    execute(ctx, Work::Task(task), Some(args.url.as_str()), None).await
}
