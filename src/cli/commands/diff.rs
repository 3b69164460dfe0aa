//! Compare two trees.

use clap::Args;

use crate::cli::command_context::CommandContext;
use crate::cli::{OutputSink, Result};
use crate::diff::{DiffEntry, DiffStatus, diff_trees};
use crate::repository::ObjectId;

/// Arguments for the diff command.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Root directory id of the old tree.
    pub old_root: ObjectId,

    /// Root directory id of the new tree.
    pub new_root: ObjectId,

    #[command(flatten)]
    pub output: OutputSink,
}

impl DiffArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine();
        let entries = diff_trees(
            &engine,
            ctx.store_id(),
            ctx.version(),
            &self.old_root,
            &self.new_root,
        )
        .await?;

        if ctx.json {
            self.output.write_json(&entries).await?;
        } else {
            let lines: Vec<String> = entries.iter().map(format_entry).collect();
            self.output.write_str(&lines.join("\n")).await?;
        }
        Ok(())
    }
}

fn format_entry(entry: &DiffEntry) -> String {
    match entry.status {
        DiffStatus::Added => format!("A  {}", entry.path),
        DiffStatus::Deleted => format!("D  {}", entry.path),
        DiffStatus::Modified => format!("M  {}", entry.path),
        DiffStatus::DirAdded => format!("A  {}/", entry.path),
        DiffStatus::DirDeleted => format!("D  {}/", entry.path),
    }
}
