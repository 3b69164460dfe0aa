//! Command-line interface for treesync.

pub mod args;
pub mod command_context;
mod commands;

use clap::{Parser, Subcommand};
use thiserror::Error;

use command_context::CommandContext;

pub use args::{GlobalArgs, OutputSink};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] crate::config::ConfigError),

    /// Repository error.
    #[error("{0}")]
    Repo(#[from] crate::repo::RepoError),

    /// Malformed object.
    #[error("{0}")]
    Object(#[from] crate::repository::ObjectError),

    /// Merge error.
    #[error("{0}")]
    Merge(#[from] crate::merge::MergeError),

    /// Branch update error.
    #[error("{0}")]
    Driver(#[from] crate::merge::DriverError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// tsync - directory tree snapshots, diffs and merges.
#[derive(Parser, Debug)]
#[command(name = "tsync", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Snapshot a local directory and print its root id.
    Import(commands::import::ImportArgs),

    /// List the entries of a directory object.
    Ls(commands::ls::LsArgs),

    /// Show the changes between two trees.
    Diff(commands::diff::DiffArgs),

    /// Merge three trees and print the merged root id.
    Merge(commands::merge::MergeArgs),

    /// Commit a tree to a branch, merging if the branch moved.
    Commit(commands::commit::CommitArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext::open(&self.global)?;

        match self.command {
            Command::Import(args) => args.run(&ctx).await,
            Command::Ls(args) => args.run(&ctx).await,
            Command::Diff(args) => args.run(&ctx).await,
            Command::Merge(args) => args.run(&ctx).await,
            Command::Commit(args) => args.run(&ctx).await,
        }
    }
}
