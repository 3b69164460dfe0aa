//! Type definitions for tree merge.

use crate::repository::{Dirent, ObjectId};

// =============================================================================
// EntrySlots
// =============================================================================

/// The same-named entries of one directory level across the input trees.
///
/// Slot `i` holds the entry of input tree `i`, or `None` when that tree has
/// no entry with this name. In a three-way merge the slots are
/// `[base, head, remote]`; in a two-way walk they are `[old, new]`.
///
/// Slots hold copies of the input entries, so renaming a slot never touches
/// the input trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySlots {
    slots: Vec<Option<Dirent>>,
}

impl EntrySlots {
    /// Create a slot set. `slots` must hold at least one entry.
    pub fn new(slots: Vec<Option<Dirent>>) -> Self {
        Self { slots }
    }

    /// Number of input trees.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The entry in slot `i`, of any type.
    pub fn get(&self, i: usize) -> Option<&Dirent> {
        self.slots.get(i).and_then(|s| s.as_ref())
    }

    /// The entry in slot `i` if it is a regular file.
    pub fn file(&self, i: usize) -> Option<&Dirent> {
        self.get(i).filter(|d| d.is_file())
    }

    /// The entry in slot `i` if it is a directory.
    pub fn dir(&self, i: usize) -> Option<&Dirent> {
        self.get(i).filter(|d| d.is_dir())
    }

    /// Base entry of a three-way merge.
    pub fn base(&self) -> Option<&Dirent> {
        self.get(0)
    }

    /// Head entry of a three-way merge.
    pub fn head(&self) -> Option<&Dirent> {
        self.get(1)
    }

    /// Remote entry of a three-way merge.
    pub fn remote(&self) -> Option<&Dirent> {
        self.get(2)
    }

    /// The shared name of the populated slots.
    pub fn name(&self) -> &str {
        self.slots
            .iter()
            .flatten()
            .map(|d| d.name.as_str())
            .next()
            .unwrap_or("")
    }

    /// Replace slot `i`.
    pub(crate) fn replace(&mut self, i: usize, entry: Dirent) {
        if let Some(slot) = self.slots.get_mut(i) {
            *slot = Some(entry);
        }
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = Option<&Dirent>> {
        self.slots.iter().map(|s| s.as_ref())
    }
}

// =============================================================================
// DirMask
// =============================================================================

/// Which of base, head and remote hold a directory under one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirMask {
    BaseOnly,
    HeadOnly,
    BaseHead,
    RemoteOnly,
    BaseRemote,
    HeadRemote,
    All,
}

impl DirMask {
    /// Classify a three-way slot set. Returns `None` if no slot is a directory.
    pub fn from_slots(slots: &EntrySlots) -> Option<Self> {
        let base = slots.dir(0).is_some();
        let head = slots.dir(1).is_some();
        let remote = slots.dir(2).is_some();

        match (base, head, remote) {
            (false, false, false) => None,
            (true, false, false) => Some(DirMask::BaseOnly),
            (false, true, false) => Some(DirMask::HeadOnly),
            (true, true, false) => Some(DirMask::BaseHead),
            (false, false, true) => Some(DirMask::RemoteOnly),
            (true, false, true) => Some(DirMask::BaseRemote),
            (false, true, true) => Some(DirMask::HeadRemote),
            (true, true, true) => Some(DirMask::All),
        }
    }
}

// =============================================================================
// EntryVisitor
// =============================================================================

/// Callback of a visit-only walk.
///
/// Called once per distinct name at every level with `basedir` set to the
/// path of the level (empty at the root, `"a/b/"` below). Returning an error
/// aborts the walk.
pub trait EntryVisitor: Send {
    fn visit(&mut self, basedir: &str, slots: &EntrySlots) -> Result<(), String>;
}

impl<F> EntryVisitor for F
where
    F: FnMut(&str, &EntrySlots) -> Result<(), String> + Send,
{
    fn visit(&mut self, basedir: &str, slots: &EntrySlots) -> Result<(), String> {
        self(basedir, slots)
    }
}

// =============================================================================
// MergeOptions
// =============================================================================

/// Per-call inputs and outputs of [`MergeEngine::merge_trees`].
///
/// [`MergeEngine::merge_trees`]: super::MergeEngine::merge_trees
#[derive(Default)]
pub struct MergeOptions<'a> {
    /// Run the real merge. With `false`, or with two roots, the engine only
    /// walks the trees and calls `visitor`.
    pub do_merge: bool,
    /// Repository holding `remote_head`, used to name conflicts.
    pub remote_repo_id: Option<String>,
    /// Commit the remote tree came from, used to name conflicts.
    pub remote_head: Option<ObjectId>,
    /// Set when any entry was renamed to resolve a conflict.
    pub conflict: bool,
    /// Id of the merged top-level directory after a three-way merge.
    pub merged_tree_root: Option<ObjectId>,
    /// Number of subdirectories loaded during the call.
    pub visit_dirs: usize,
    /// Callback of a visit-only walk.
    pub visitor: Option<&'a mut dyn EntryVisitor>,
}

impl<'a> MergeOptions<'a> {
    /// Options for a three-way merge whose remote tree comes from
    /// `remote_head` in `remote_repo_id`.
    pub fn merge(remote_repo_id: impl Into<String>, remote_head: impl Into<ObjectId>) -> Self {
        Self {
            do_merge: true,
            remote_repo_id: Some(remote_repo_id.into()),
            remote_head: Some(remote_head.into()),
            ..Default::default()
        }
    }

    /// Options for a visit-only walk.
    pub fn visit(visitor: &'a mut dyn EntryVisitor) -> Self {
        Self {
            visitor: Some(visitor),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for MergeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOptions")
            .field("do_merge", &self.do_merge)
            .field("remote_repo_id", &self.remote_repo_id)
            .field("remote_head", &self.remote_head)
            .field("conflict", &self.conflict)
            .field("merged_tree_root", &self.merged_tree_root)
            .field("visit_dirs", &self.visit_dirs)
            .field("visitor", &self.visitor.is_some())
            .finish()
    }
}
