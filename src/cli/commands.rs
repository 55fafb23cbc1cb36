use clap::Subcommand;

use super::config::ConfigArgs;
use super::run::RunArgs;
use super::tasks::{CreateDocArgs, FormatDocArgs, LibrarySearchArgs, WriteDocArgs};

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Drive the browser toward a free-form goal
    Run(RunArgs),

    /// Search the university library for peer-reviewed papers
    LibrarySearch(LibrarySearchArgs),

    /// Log in to Google Drive
    DriveLogin,

    /// Create a Google Doc with section headings
    CreateDoc(CreateDocArgs),

    /// Type content into an existing Google Doc
    WriteDoc(WriteDocArgs),

    /// Format a Google Doc according to journal guidelines
    FormatDoc(FormatDocArgs),

    /// Show the effective configuration (secrets redacted)
    Config(ConfigArgs),

    /// Show version, build and browser information
    Info,
}
