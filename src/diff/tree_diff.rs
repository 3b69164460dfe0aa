//! Tree diffs on top of the engine's visit-only walk.
//!
//! [`diff_trees`] compares two trees. [`diff_merge_roots`] compares a merge
//! result against both of its parents and only reports what the merge itself
//! introduced.

use serde::Serialize;

use crate::merge::{EntrySlots, MergeEngine, MergeOptions, Result};
use crate::repository::{Dirent, ObjectId};

/// Kind of change between two trees at one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Deleted,
    Modified,
    DirAdded,
    DirDeleted,
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub status: DiffStatus,
    /// Path relative to the root, directories without a trailing slash.
    pub path: String,
}

impl DiffEntry {
    fn new(status: DiffStatus, basedir: &str, name: &str) -> Self {
        Self {
            status,
            path: format!("{}{}", basedir, name),
        }
    }
}

/// Changes turning the tree at `old_root` into the tree at `new_root`,
/// sorted by path.
pub async fn diff_trees(
    engine: &MergeEngine,
    store_id: &str,
    version: u32,
    old_root: &ObjectId,
    new_root: &ObjectId,
) -> Result<Vec<DiffEntry>> {
    let mut entries = Vec::new();

    let mut collect = |basedir: &str, slots: &EntrySlots| -> std::result::Result<(), String> {
        classify(basedir, slots, &mut entries);
        Ok(())
    };

    let mut opt = MergeOptions::visit(&mut collect);
    engine
        .merge_trees(
            store_id,
            version,
            &[old_root.clone(), new_root.clone()],
            &mut opt,
        )
        .await?;
    drop(opt);

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Changes a merge introduced: entries of the tree at `merged_root` that
/// match neither `parent1_root` nor `parent2_root`, sorted by path.
///
/// Added and removed directories are folded: their contents are not listed.
pub async fn diff_merge_roots(
    engine: &MergeEngine,
    store_id: &str,
    version: u32,
    merged_root: &ObjectId,
    parent1_root: &ObjectId,
    parent2_root: &ObjectId,
) -> Result<Vec<DiffEntry>> {
    let mut entries = Vec::new();

    let mut collect = |basedir: &str, slots: &EntrySlots| -> std::result::Result<(), String> {
        classify_merge(basedir, slots, &mut entries);
        Ok(())
    };

    let mut opt = MergeOptions::visit(&mut collect);
    engine
        .merge_trees(
            store_id,
            version,
            &[
                merged_root.clone(),
                parent1_root.clone(),
                parent2_root.clone(),
            ],
            &mut opt,
        )
        .await?;
    drop(opt);

    let folded: Vec<String> = entries
        .iter()
        .filter(|e| matches!(e.status, DiffStatus::DirAdded | DiffStatus::DirDeleted))
        .map(|e| format!("{}/", e.path))
        .collect();
    entries.retain(|e| !folded.iter().any(|dir| e.path.starts_with(dir.as_str())));

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn classify(basedir: &str, slots: &EntrySlots, entries: &mut Vec<DiffEntry>) {
    let name = slots.name();

    match (slots.file(0), slots.file(1)) {
        (Some(old), Some(new)) if old.id != new.id => {
            entries.push(DiffEntry::new(DiffStatus::Modified, basedir, name));
        }
        (None, Some(_)) => entries.push(DiffEntry::new(DiffStatus::Added, basedir, name)),
        (Some(_), None) => entries.push(DiffEntry::new(DiffStatus::Deleted, basedir, name)),
        _ => {}
    }

    match (slots.dir(0), slots.dir(1)) {
        (None, Some(_)) => entries.push(DiffEntry::new(DiffStatus::DirAdded, basedir, name)),
        (Some(_), None) => entries.push(DiffEntry::new(DiffStatus::DirDeleted, basedir, name)),
        _ => {}
    }
}

/// Slots are `[merged, parent1, parent2]`.
fn classify_merge(basedir: &str, slots: &EntrySlots, entries: &mut Vec<DiffEntry>) {
    let name = slots.name();
    let differs = |a: &Dirent, b: Option<&Dirent>| b.is_none_or(|b| a.id != b.id);

    match (slots.file(0), slots.file(1), slots.file(2)) {
        (Some(m), p1, p2) if p1.is_some() || p2.is_some() => {
            if differs(m, p1) && differs(m, p2) {
                entries.push(DiffEntry::new(DiffStatus::Modified, basedir, name));
            }
        }
        (Some(_), None, None) => entries.push(DiffEntry::new(DiffStatus::Added, basedir, name)),
        (None, Some(_), Some(_)) => {
            entries.push(DiffEntry::new(DiffStatus::Deleted, basedir, name))
        }
        _ => {}
    }

    match (slots.dir(0), slots.dir(1), slots.dir(2)) {
        (Some(_), None, None) => entries.push(DiffEntry::new(DiffStatus::DirAdded, basedir, name)),
        (None, Some(_), Some(_)) => {
            entries.push(DiffEntry::new(DiffStatus::DirDeleted, basedir, name))
        }
        _ => {}
    }
}
