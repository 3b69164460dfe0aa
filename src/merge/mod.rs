//! Two- and three-way directory tree merge for treesync-rs.
//!
//! # Overview
//!
//! [`MergeEngine::merge_trees`] walks up to three directory trees (base,
//! head, remote) in lock-step, one directory level at a time:
//!
//! 1. Entries sharing a name across the trees are gathered into
//!    [`EntrySlots`], largest name first
//! 2. Files go through the file policy and directories through the
//!    directory policy; both run on a file/directory (D/F) conflict
//! 3. The merged level is turned into a [`Dir`] and saved unless head or
//!    remote already has it
//!
//! Content is compared by object id only. Conflicts never fail a merge:
//! remote's side is kept under a name produced by a [`ConflictNamer`] and
//! [`MergeOptions::conflict`] is set.
//!
//! With two roots, or with `do_merge` unset, the engine only walks the trees
//! and hands every name to an [`EntryVisitor`]. The `diff` module is built on
//! that mode.
//!
//! [`MergeDriver`] is the caller that puts merged trees on branches.
//!
//! # Example
//!
//! ```ignore
//! use treesync_rs::merge::{MergeEngine, MergeOptions};
//!
//! let engine = MergeEngine::new(repo.clone());
//! let mut opt = MergeOptions::merge("repo", remote_commit_id);
//! engine
//!     .merge_trees("store", 1, &[base_root, head_root, remote_root], &mut opt)
//!     .await?;
//!
//! let merged = opt.merged_tree_root;
//! ```
//!
//! [`Dir`]: crate::repository::Dir

mod conflict;
mod dir_policy;
mod driver;
mod engine;
mod error;
mod file_policy;
mod types;

#[cfg(test)]
mod tests;

pub use conflict::{
    ConflictNamer, DefaultConflictNamer, FileModifier, ModifierLookup, StoreModifierLookup,
    unique_name,
};
pub use driver::{DriverError, DriverResult, MergeDriver, RetryPolicy};
pub use engine::MergeEngine;
pub use error::{MergeError, Result};
pub use types::{DirMask, EntrySlots, EntryVisitor, MergeOptions};
