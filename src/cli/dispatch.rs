use super::config::cmd_config;
use super::info::cmd_info;
use super::run::cmd_run;
use super::tasks::{cmd_create_doc, cmd_drive_login, cmd_format_doc, cmd_library_search, cmd_write_doc};
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::LibrarySearch(args) => cmd_library_search(args, ctx).await,
        Commands::DriveLogin => cmd_drive_login(ctx).await,
        Commands::CreateDoc(args) => cmd_create_doc(args, ctx).await,
        Commands::WriteDoc(args) => cmd_write_doc(args, ctx).await,
        Commands::FormatDoc(args) => cmd_format_doc(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
        Commands::Info => cmd_info(ctx).await,
    }
}
