//! Three-way merge of the regular files sharing one name.
//!
//! Content equality is decided by object id only. When both sides changed a
//! file, head keeps the name and remote's version is kept under a conflict
//! name. When one side holds a directory where the other changed a file (a
//! D/F conflict), the remote entry is renamed: the file if remote changed a
//! file, the directory if remote replaced a file with one.

use tracing::{debug, warn};

use super::engine::{LevelOutput, TreeWalk};
use super::error::{MergeError, Result};
use super::types::{EntrySlots, MergeOptions};
use crate::repository::ObjectId;

impl TreeWalk<'_> {
    pub(super) async fn merge_entries(
        &self,
        slots: &mut EntrySlots,
        basedir: &str,
        output: &mut LevelOutput,
        opt: &mut MergeOptions<'_>,
    ) -> Result<()> {
        let base = slots.file(0).cloned();
        let head = slots.file(1).cloned();
        let remote = slots.file(2).cloned();
        let path = format!("{}{}", basedir, slots.name());

        match (base, head, remote) {
            (base, Some(head), Some(remote)) => {
                if head.id == remote.id {
                    debug!(path = %path, "files match");
                    output.push(head);
                } else if base.as_ref().is_some_and(|b| b.id == head.id) {
                    debug!(path = %path, "unchanged in head, changed in remote");
                    output.push(remote);
                } else if base.as_ref().is_some_and(|b| b.id == remote.id) {
                    debug!(path = %path, "unchanged in remote, changed in head");
                    output.push(head);
                } else {
                    debug!(path = %path, "file conflict");
                    let name = self
                        .conflict_filename(basedir, &head.name, output, remote_ref(opt))
                        .await?;
                    output.push(head);
                    output.push(remote.renamed(name));
                    opt.conflict = true;
                }
            }

            (Some(base), None, Some(remote)) => {
                if base.id == remote.id {
                    debug!(path = %path, "deleted in head, unchanged in remote");
                } else if slots.head().is_some() {
                    debug!(path = %path, "DFC, dir -> dir, file");
                    let name = self
                        .conflict_filename(basedir, &remote.name, output, remote_ref(opt))
                        .await?;
                    output.push(remote.renamed(name));
                    opt.conflict = true;
                } else {
                    debug!(path = %path, "deleted in head, changed in remote");
                    output.push(remote);
                }
            }

            (Some(base), Some(head), None) => {
                if base.id == head.id {
                    debug!(path = %path, "deleted in remote, unchanged in head");
                } else if let Some(remote_dir) = slots.remote().cloned() {
                    debug!(path = %path, "DFC, file -> file, dir");
                    let name = self
                        .conflict_dirname(basedir, &remote_dir.name, output, remote_ref(opt))
                        .await?;
                    slots.replace(2, remote_dir.renamed(name));
                    output.push(head);
                    opt.conflict = true;
                } else {
                    debug!(path = %path, "deleted in remote, changed in head");
                    output.push(head);
                }
            }

            (None, None, Some(remote)) => match slots.head().cloned() {
                None => {
                    debug!(path = %path, "added in remote");
                    output.push(remote);
                }
                Some(head_dir) if slots.base().is_some_and(|b| b.id == head_dir.id) => {
                    debug!(path = %path, "dir unchanged in head, replaced by file in remote");
                    output.push(remote);
                }
                Some(_) => {
                    debug!(path = %path, "DFC, none -> dir, file");
                    let name = self
                        .conflict_filename(basedir, &remote.name, output, remote_ref(opt))
                        .await?;
                    output.push(remote.renamed(name));
                    opt.conflict = true;
                }
            },

            (None, Some(head), None) => match slots.remote().cloned() {
                None => {
                    debug!(path = %path, "added in head");
                    output.push(head);
                }
                Some(remote_dir) if slots.base().is_some_and(|b| b.id == remote_dir.id) => {
                    debug!(path = %path, "dir unchanged in remote, replaced by file in head");
                    output.push(head);
                }
                Some(remote_dir) => {
                    debug!(path = %path, "DFC, none -> file, dir");
                    let name = self
                        .conflict_dirname(basedir, &remote_dir.name, output, remote_ref(opt))
                        .await?;
                    slots.replace(2, remote_dir.renamed(name));
                    output.push(head);
                    opt.conflict = true;
                }
            },

            (Some(_), None, None) => {
                debug!(path = %path, "deleted in both");
            }

            (None, None, None) => {}
        }

        Ok(())
    }

    /// Conflict name for a file, based on who last changed it in the remote
    /// head commit.
    async fn conflict_filename(
        &self,
        basedir: &str,
        name: &str,
        output: &mut LevelOutput,
        remote: Option<(&str, &ObjectId)>,
    ) -> Result<String> {
        let path = format!("{}{}", basedir, name);
        let (repo_id, remote_head) = require_remote(remote, &path)?;

        let found = match self
            .engine
            .modifiers
            .file_modifier(repo_id, self.store_id, self.version, remote_head, &path)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                debug!(path = %path, error = %e, "no modifier for conflicting file");
                None
            }
        };

        let (modifier, mtime) = match found {
            Some(f) => (f.modifier, f.mtime),
            None => (
                self.remote_creator(repo_id, remote_head, &path).await?,
                self.engine.now(),
            ),
        };

        let candidate = self
            .engine
            .namer
            .gen_conflict_name(name, modifier.as_deref(), mtime);
        Ok(output.claim_name(candidate))
    }

    /// Conflict name for a directory, based on the remote head's creator.
    async fn conflict_dirname(
        &self,
        basedir: &str,
        name: &str,
        output: &mut LevelOutput,
        remote: Option<(&str, &ObjectId)>,
    ) -> Result<String> {
        let path = format!("{}{}", basedir, name);
        let (repo_id, remote_head) = require_remote(remote, &path)?;

        let modifier = self.remote_creator(repo_id, remote_head, &path).await?;
        let candidate =
            self.engine
                .namer
                .gen_conflict_name(name, modifier.as_deref(), self.engine.now());
        Ok(output.claim_name(candidate))
    }

    async fn remote_creator(
        &self,
        repo_id: &str,
        remote_head: &ObjectId,
        path: &str,
    ) -> Result<Option<String>> {
        self.engine
            .modifiers
            .commit_creator(repo_id, remote_head)
            .await
            .map_err(|e| {
                warn!(repo_id, remote_head = %remote_head, "failed to find remote head");
                MergeError::ConflictNaming {
                    path: path.to_string(),
                    reason: format!("failed to find remote head {}:{}: {}", repo_id, remote_head, e),
                }
            })
    }
}

fn remote_ref<'o>(opt: &'o MergeOptions<'_>) -> Option<(&'o str, &'o ObjectId)> {
    opt.remote_repo_id.as_deref().zip(opt.remote_head.as_ref())
}

fn require_remote<'o>(
    remote: Option<(&'o str, &'o ObjectId)>,
    path: &str,
) -> Result<(&'o str, &'o ObjectId)> {
    remote.ok_or_else(|| MergeError::ConflictNaming {
        path: path.to_string(),
        reason: "no remote head commit to name the conflict after".to_string(),
    })
}
