//! Three-way merge of the directories sharing one name.
//!
//! Whenever one side is unchanged relative to base, or both sides agree, the
//! result is picked without loading anything. Only directories changed on
//! both sides (or added on both sides with different content) are loaded
//! and merged recursively.

use tracing::debug;

use super::engine::{LevelOutput, TreeWalk};
use super::error::Result;
use super::types::{DirMask, EntrySlots, MergeOptions};
use crate::repository::Dirent;

impl TreeWalk<'_> {
    pub(super) async fn merge_directories(
        &self,
        slots: &EntrySlots,
        basedir: &str,
        output: &mut LevelOutput,
        opt: &mut MergeOptions<'_>,
    ) -> Result<()> {
        let Some(mask) = DirMask::from_slots(slots) else {
            return Ok(());
        };
        let base = slots.dir(0);
        let head = slots.dir(1);
        let remote = slots.dir(2);
        let path = format!("{}{}", basedir, slots.name());

        match mask {
            DirMask::BaseOnly => {
                debug!(path = %path, "no dir, no need to merge");
                return Ok(());
            }
            DirMask::HeadOnly => {
                debug!(path = %path, "only head is dir");
                emit(output, head);
                return Ok(());
            }
            DirMask::RemoteOnly => {
                debug!(path = %path, "only remote is dir");
                emit(output, remote);
                return Ok(());
            }
            DirMask::BaseHead => {
                if same_id(base, head) {
                    debug!(path = %path, "dir deleted in remote");
                    return Ok(());
                }
                debug!(path = %path, "dir changed in head but deleted in remote");
            }
            DirMask::BaseRemote => {
                if same_id(base, remote) {
                    debug!(path = %path, "dir deleted in head");
                    return Ok(());
                }
                debug!(path = %path, "dir changed in remote but deleted in head");
            }
            DirMask::HeadRemote | DirMask::All => {
                if same_id(head, remote) {
                    debug!(path = %path, "dir is the same in head and remote");
                    emit(output, head);
                    return Ok(());
                }
                if same_id(base, head) {
                    debug!(path = %path, "dir changed in remote but unchanged in head");
                    emit(output, remote);
                    return Ok(());
                }
                if same_id(base, remote) {
                    debug!(path = %path, "dir changed in head but unchanged in remote");
                    emit(output, head);
                    return Ok(());
                }
                debug!(path = %path, "dir is changed in both head and remote, merge recursively");
            }
        }

        let Some(merged_id) = self.descend(slots, basedir, opt).await? else {
            return Ok(());
        };

        let template = match mask {
            DirMask::BaseRemote => remote,
            _ => head,
        };
        if let Some(entry) = template {
            output.push(entry.with_id(merged_id));
        }
        Ok(())
    }

    /// Visit-only mode: always descend, emit nothing.
    pub(super) async fn visit_directories(
        &self,
        slots: &EntrySlots,
        basedir: &str,
        opt: &mut MergeOptions<'_>,
    ) -> Result<()> {
        self.descend(slots, basedir, opt).await.map(|_| ())
    }
}

fn same_id(a: Option<&Dirent>, b: Option<&Dirent>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.id == b.id)
}

fn emit(output: &mut LevelOutput, entry: Option<&Dirent>) {
    if let Some(entry) = entry {
        output.push(entry.clone());
    }
}
