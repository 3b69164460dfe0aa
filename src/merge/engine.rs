//! Lock-step traversal of two or three directory trees.
//!
//! All input trees keep their entries in descending name order. The walk
//! keeps one cursor per tree, repeatedly takes the largest name any cursor
//! points at, collects the entries with that name from every tree into an
//! [`EntrySlots`] and advances those cursors. Files go through the file
//! policy, directories through the directory policy, and both run when the
//! types disagree across trees.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use super::conflict::{
    ConflictNamer, DefaultConflictNamer, ModifierLookup, StoreModifierLookup, unique_name,
};
use super::error::{MergeError, Result};
use super::types::{EntrySlots, MergeOptions};
use crate::repo::{ObjectStore, RepoError};
use crate::repository::{Dir, Dirent, ObjectId};

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

type LevelFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<ObjectId>>> + Send + 'a>>;

// =============================================================================
// MergeEngine
// =============================================================================

/// Merges two or three directory trees stored in an [`ObjectStore`].
///
/// The engine holds no state between calls. Conflict names come from a
/// [`ConflictNamer`] fed by a [`ModifierLookup`] and the engine's clock.
pub struct MergeEngine {
    pub(super) store: Arc<dyn ObjectStore>,
    pub(super) namer: Arc<dyn ConflictNamer>,
    pub(super) modifiers: Arc<dyn ModifierLookup>,
    clock: Clock,
}

impl MergeEngine {
    /// Create an engine over `store` with the default conflict namer, a
    /// store-backed modifier lookup and the system clock.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            modifiers: Arc::new(StoreModifierLookup::new(Arc::clone(&store))),
            store,
            namer: Arc::new(DefaultConflictNamer),
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_namer(mut self, namer: Arc<dyn ConflictNamer>) -> Self {
        self.namer = namer;
        self
    }

    pub fn with_modifier_lookup(mut self, modifiers: Arc<dyn ModifierLookup>) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Replace the clock used for conflict names that have no file mtime.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// The store the engine reads from and writes to.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub(super) fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Merge or walk the trees rooted at `roots`.
    ///
    /// With three roots `[base, head, remote]` and `opt.do_merge` set, the
    /// merged tree is persisted and its id left in `opt.merged_tree_root`;
    /// `opt.conflict` tells whether any entry was renamed. Otherwise the trees
    /// are only walked and `opt.visitor` is called for every name.
    pub async fn merge_trees(
        &self,
        store_id: &str,
        version: u32,
        roots: &[ObjectId],
        opt: &mut MergeOptions<'_>,
    ) -> Result<()> {
        if roots.len() != 2 && roots.len() != 3 {
            return Err(MergeError::InvalidRoots(roots.len()));
        }

        let walk = TreeWalk {
            engine: self,
            store_id,
            version,
        };

        let mut trees = Vec::with_capacity(roots.len());
        for root in roots {
            trees.push(Some(walk.load_dir(root).await?));
        }

        if let Some(root) = walk.merge_level(trees, String::new(), opt).await? {
            opt.merged_tree_root = Some(root);
        }
        Ok(())
    }
}

// =============================================================================
// LevelOutput
// =============================================================================

/// Entries produced for one directory level, plus every name already in use
/// at that level.
pub(super) struct LevelOutput {
    entries: Vec<Dirent>,
    taken: HashSet<String>,
}

impl LevelOutput {
    fn new(trees: &[Option<Dir>]) -> Self {
        let taken = trees
            .iter()
            .flatten()
            .flat_map(|t| t.entries.iter().map(|e| e.name.clone()))
            .collect();
        Self {
            entries: Vec::new(),
            taken,
        }
    }

    pub(super) fn push(&mut self, entry: Dirent) {
        self.taken.insert(entry.name.clone());
        self.entries.push(entry);
    }

    /// Reserve a name for a renamed entry, suffixing it if already in use.
    pub(super) fn claim_name(&mut self, candidate: String) -> String {
        let name = unique_name(candidate, &self.taken);
        self.taken.insert(name.clone());
        name
    }
}

// =============================================================================
// TreeWalk
// =============================================================================

/// State shared by every level of one `merge_trees` call.
pub(super) struct TreeWalk<'e> {
    pub(super) engine: &'e MergeEngine,
    pub(super) store_id: &'e str,
    pub(super) version: u32,
}

impl TreeWalk<'_> {
    pub(super) async fn load_dir(&self, id: &ObjectId) -> Result<Dir> {
        self.engine
            .store
            .get_dir(self.store_id, self.version, id)
            .await
            .map_err(|e| {
                warn!(store_id = self.store_id, id = %id, error = %e, "failed to find dir");
                MergeError::MissingObject {
                    store_id: self.store_id.to_string(),
                    id: id.clone(),
                    source: e,
                }
            })
    }

    /// Merge one directory level and everything below it.
    ///
    /// `trees[i]` is `None` when input `i` has no directory at this path.
    /// Returns the merged directory id in three-way merge mode, `None` in
    /// visit-only mode.
    pub(super) fn merge_level<'a>(
        &'a self,
        trees: Vec<Option<Dir>>,
        basedir: String,
        opt: &'a mut MergeOptions<'_>,
    ) -> LevelFuture<'a> {
        Box::pin(async move {
            let n = trees.len();
            let merging = n == 3 && opt.do_merge;
            let mut output = LevelOutput::new(&trees);
            let mut cursors = vec![0usize; n];

            loop {
                let Some(first_name) = (0..n)
                    .filter_map(|i| entry_at(&trees, &cursors, i))
                    .map(|e| e.name.as_str())
                    .max()
                    .map(str::to_string)
                else {
                    break;
                };

                let mut slots = Vec::with_capacity(n);
                let (mut n_files, mut n_dirs) = (0, 0);
                for i in 0..n {
                    match entry_at(&trees, &cursors, i) {
                        Some(e) if e.name == first_name => {
                            if e.is_file() {
                                n_files += 1;
                            } else if e.is_dir() {
                                n_dirs += 1;
                            }
                            slots.push(Some(e.clone()));
                            cursors[i] += 1;
                        }
                        _ => slots.push(None),
                    }
                }
                let mut slots = EntrySlots::new(slots);

                if !merging {
                    self.visit_entries(&slots, &basedir, opt)?;
                    if n_dirs > 0 {
                        self.visit_directories(&slots, &basedir, opt).await?;
                    }
                    continue;
                }

                if n_files > 0 {
                    self.merge_entries(&mut slots, &basedir, &mut output, opt)
                        .await?;
                }
                if n_dirs > 0 {
                    self.merge_directories(&slots, &basedir, &mut output, opt)
                        .await?;
                }
            }

            if !merging {
                return Ok(None);
            }

            self.persist_level(&trees, output, &basedir).await.map(Some)
        })
    }

    /// Load every directory slot and walk the combined subtree.
    pub(super) async fn descend(
        &self,
        slots: &EntrySlots,
        basedir: &str,
        opt: &mut MergeOptions<'_>,
    ) -> Result<Option<ObjectId>> {
        let mut sub_trees = Vec::with_capacity(slots.len());
        let mut dirname = "";
        for i in 0..slots.len() {
            match slots.dir(i) {
                Some(d) => {
                    sub_trees.push(Some(self.load_dir(&d.id).await?));
                    opt.visit_dirs += 1;
                    dirname = &d.name;
                }
                None => sub_trees.push(None),
            }
        }

        let new_basedir = format!("{}{}/", basedir, dirname);
        self.merge_level(sub_trees, new_basedir, opt).await
    }

    fn visit_entries(
        &self,
        slots: &EntrySlots,
        basedir: &str,
        opt: &mut MergeOptions<'_>,
    ) -> Result<()> {
        if let Some(visitor) = opt.visitor.as_mut() {
            visitor
                .visit(basedir, slots)
                .map_err(|reason| MergeError::Visit {
                    path: format!("{}{}", basedir, slots.name()),
                    reason,
                })?;
        }
        Ok(())
    }

    /// Build the merged directory of a level and save it unless head or
    /// remote already has exactly that content.
    async fn persist_level(
        &self,
        trees: &[Option<Dir>],
        output: LevelOutput,
        basedir: &str,
    ) -> Result<ObjectId> {
        let merged = Dir::new(self.version, output.entries).map_err(RepoError::from)?;

        let existing = trees
            .iter()
            .skip(1)
            .flatten()
            .any(|t| t.dir_id == merged.dir_id);
        if existing {
            debug!(path = basedir, id = %merged.dir_id, "merged tree equals an input tree");
            return Ok(merged.dir_id);
        }

        self.engine
            .store
            .put_dir(self.store_id, self.version, &merged)
            .await
            .map_err(|e| {
                warn!(store_id = self.store_id, path = basedir, error = %e, "failed to save merged tree");
                MergeError::Persistence {
                    store_id: self.store_id.to_string(),
                    path: basedir.to_string(),
                    source: e,
                }
            })
    }
}

fn entry_at<'t>(trees: &'t [Option<Dir>], cursors: &[usize], i: usize) -> Option<&'t Dirent> {
    trees[i].as_ref().and_then(|t| t.entries.get(cursors[i]))
}
