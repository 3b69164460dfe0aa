//! List a directory object.

use clap::Args;

use crate::cli::command_context::CommandContext;
use crate::cli::{OutputSink, Result};
use crate::repo::ObjectStore;
use crate::repository::{Dirent, ObjectId};

/// Arguments for the ls command.
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Id of the directory object.
    pub dir_id: ObjectId,

    #[command(flatten)]
    pub output: OutputSink,
}

impl LsArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let dir = ctx
            .repo
            .get_dir(ctx.store_id(), ctx.version(), &self.dir_id)
            .await?;

        if ctx.json {
            self.output.write_json(&dir.entries).await?;
        } else {
            let lines: Vec<String> = dir.entries.iter().map(format_entry).collect();
            self.output.write_str(&lines.join("\n")).await?;
        }
        Ok(())
    }
}

fn format_entry(entry: &Dirent) -> String {
    if entry.is_dir() {
        format!("d {} {}/", entry.id, entry.name)
    } else {
        format!(
            "f {} {:>10} {}",
            entry.id,
            entry.size.unwrap_or(0),
            entry.name
        )
    }
}
