//! Three-way merge of directory trees.

use clap::Args;
use serde::Serialize;

use crate::cli::command_context::CommandContext;
use crate::cli::{OutputSink, Result};
use crate::merge::MergeOptions;
use crate::repository::{EMPTY_DIR_ID, ObjectId};

/// Arguments for the merge command.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Root directory id of the common ancestor.
    pub base: ObjectId,

    /// Root directory id of the local head.
    pub head: ObjectId,

    /// Root directory id of the remote head.
    pub remote: ObjectId,

    /// Repository of the remote head commit, used to name conflicts.
    #[arg(long)]
    pub remote_repo: Option<String>,

    /// Remote head commit, used to name conflicts.
    #[arg(long)]
    pub remote_head: Option<ObjectId>,

    #[command(flatten)]
    pub output: OutputSink,
}

#[derive(Serialize)]
struct MergeOutput {
    root: ObjectId,
    conflict: bool,
    visited_dirs: usize,
}

impl MergeArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let engine = ctx.engine();
        let mut opt = MergeOptions {
            do_merge: true,
            remote_repo_id: self.remote_repo,
            remote_head: self.remote_head,
            ..Default::default()
        };
        engine
            .merge_trees(
                ctx.store_id(),
                ctx.version(),
                &[self.base, self.head, self.remote],
                &mut opt,
            )
            .await?;

        let out = MergeOutput {
            root: opt
                .merged_tree_root
                .unwrap_or_else(|| EMPTY_DIR_ID.to_string()),
            conflict: opt.conflict,
            visited_dirs: opt.visit_dirs,
        };

        if ctx.json {
            self.output.write_json(&out).await?;
        } else if out.conflict {
            self.output
                .write_str(&format!("{} (with conflicts)", out.root))
                .await?;
        } else {
            self.output.write_str(&out.root).await?;
        }
        Ok(())
    }
}
