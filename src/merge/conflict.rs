//! Conflict naming.
//!
//! When a merge keeps both sides of a conflicting entry, the remote side is
//! renamed. A [`ConflictNamer`] builds the new name from the original name,
//! the identity of whoever made the remote change, and a timestamp. The
//! identity comes from a [`ModifierLookup`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;

use crate::repo::{ObjectStore, Result};
use crate::repository::ObjectId;

// =============================================================================
// ConflictNamer
// =============================================================================

/// Produces alternate names for conflicting entries.
pub trait ConflictNamer: Send + Sync {
    /// Name for the conflicting copy of `original`.
    fn gen_conflict_name(&self, original: &str, modifier: Option<&str>, timestamp: i64) -> String;
}

/// Names conflicts as `"<stem> (SyncConflict <modifier> <time>).<ext>"`.
///
/// The time renders in UTC as `YYYY-MM-DD-HH-MM-SS`. Names without an
/// extension get no `.<ext>` part; a missing modifier is left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConflictNamer;

impl ConflictNamer for DefaultConflictNamer {
    fn gen_conflict_name(&self, original: &str, modifier: Option<&str>, timestamp: i64) -> String {
        let time = DateTime::from_timestamp(timestamp, 0)
            .map(|t| t.format("%Y-%m-%d-%H-%M-%S").to_string())
            .unwrap_or_else(|| timestamp.to_string());

        let tag = match modifier {
            Some(m) if !m.is_empty() => format!("SyncConflict {} {}", m, time),
            _ => format!("SyncConflict {}", time),
        };

        let (stem, ext) = split_extension(original);
        match ext {
            Some(ext) => format!("{} ({}).{}", stem, tag, ext),
            None => format!("{} ({})", stem, tag),
        }
    }
}

/// Split `name` at its last dot. Leading dots do not start an extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}

/// Make `candidate` unique among `taken` by inserting ` (2)`, ` (3)`, ...
/// before the extension.
pub fn unique_name(candidate: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&candidate) {
        return candidate;
    }

    let (stem, ext) = split_extension(&candidate);
    let mut n = 2u32;
    loop {
        let next = match ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        if !taken.contains(&next) {
            return next;
        }
        n += 1;
    }
}

// =============================================================================
// ModifierLookup
// =============================================================================

/// Who last changed a file, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileModifier {
    pub modifier: Option<String>,
    pub mtime: i64,
}

/// Resolves the identities used in conflict names.
#[async_trait]
pub trait ModifierLookup: Send + Sync {
    /// Modifier and mtime of the regular file at `path` inside `commit_id`.
    ///
    /// Returns `Ok(None)` when the commit has no file at that path.
    async fn file_modifier(
        &self,
        repo_id: &str,
        store_id: &str,
        version: u32,
        commit_id: &ObjectId,
        path: &str,
    ) -> Result<Option<FileModifier>>;

    /// Creator name of a commit. Fails if the commit cannot be read.
    async fn commit_creator(&self, repo_id: &str, commit_id: &ObjectId) -> Result<Option<String>>;
}

/// [`ModifierLookup`] that reads commits and walks their trees in a store.
pub struct StoreModifierLookup {
    store: Arc<dyn ObjectStore>,
}

impl StoreModifierLookup {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ModifierLookup for StoreModifierLookup {
    async fn file_modifier(
        &self,
        repo_id: &str,
        store_id: &str,
        version: u32,
        commit_id: &ObjectId,
        path: &str,
    ) -> Result<Option<FileModifier>> {
        let commit = self.store.read_commit(repo_id, commit_id).await?;

        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let Some((file_name, parents)) = components.split_last() else {
            return Ok(None);
        };

        let mut dir = self.store.get_dir(store_id, version, &commit.root_id).await?;
        for component in parents {
            let Some(sub) = dir.find(component).filter(|d| d.is_dir()) else {
                return Ok(None);
            };
            let sub_id = sub.id.clone();
            dir = self.store.get_dir(store_id, version, &sub_id).await?;
        }

        Ok(dir
            .find(file_name)
            .filter(|d| d.is_file())
            .map(|d| FileModifier {
                modifier: d.modifier.clone(),
                mtime: d.mtime,
            }))
    }

    async fn commit_creator(&self, repo_id: &str, commit_id: &ObjectId) -> Result<Option<String>> {
        let commit = self.store.read_commit(repo_id, commit_id).await?;
        Ok(commit.creator_name)
    }
}
