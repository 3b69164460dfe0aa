//! Create a commit and put it on a branch.

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::cli::command_context::CommandContext;
use crate::cli::{OutputSink, Result};
use crate::repository::{Commit, ObjectId};

/// Arguments for the commit command.
#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Repository id.
    #[arg(long)]
    pub repo: String,

    /// Branch to advance.
    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Root directory id of the committed tree.
    #[arg(long)]
    pub root: ObjectId,

    /// Commit the new one is based on. Omit for the first commit of a branch.
    #[arg(long)]
    pub base: Option<ObjectId>,

    /// Commit message.
    #[arg(short, long, default_value = "")]
    pub message: String,

    #[command(flatten)]
    pub output: OutputSink,
}

#[derive(Serialize)]
struct CommitOutput {
    commit: ObjectId,
    head: ObjectId,
    merged: bool,
}

impl CommitArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let identity = &ctx.config.identity.name;
        let commit = Commit {
            repo_id: self.repo.clone(),
            root_id: self.root,
            creator_name: Some(identity.clone()),
            creator: identity.clone(),
            description: self.message,
            ctime: chrono::Utc::now().timestamp(),
            parent_id: self.base.clone(),
            second_parent_id: None,
            version: ctx.version(),
            conflict: false,
            new_merge: false,
        };
        let commit_id = ctx.repo.write_commit(&commit).await?;

        let head = ctx
            .driver()
            .fast_forward_or_merge(&self.repo, &self.branch, self.base.as_ref(), &commit_id)
            .await?;
        let merged = head != commit_id;
        if merged {
            info!(repo_id = %self.repo, branch = %self.branch, head = %head, "branch moved, merged");
        }

        let out = CommitOutput {
            commit: commit_id,
            head,
            merged,
        };
        if ctx.json {
            self.output.write_json(&out).await?;
        } else {
            self.output.write_str(&out.head).await?;
        }
        Ok(())
    }
}
