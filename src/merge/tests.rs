use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::*;
use crate::backend::{BackendError, MemoryBackend, RepoBackend, Result as BackendResult, SwapResult};
use crate::caches::NoopCache;
use crate::repo::{self, ObjectStore, Repo, RepoError};
use crate::repository::{CURRENT_VERSION, Dir, Dirent, ObjectId};

const STORE: &str = "store";
const REPO: &str = "repo";
const REMOTE_HEAD: &str = "remote-head";

// =============================================================================
// Test helpers
// =============================================================================

/// `conflict-<modifier>-<ts>-<original>`, so expected names are easy to spell.
struct TestNamer;

impl ConflictNamer for TestNamer {
    fn gen_conflict_name(&self, original: &str, modifier: Option<&str>, timestamp: i64) -> String {
        format!(
            "conflict-{}-{}-{}",
            modifier.unwrap_or("none"),
            timestamp,
            original
        )
    }
}

struct StubModifiers {
    file: Option<FileModifier>,
    creator: Option<String>,
    missing_commit: bool,
    /// Paths passed to `file_modifier`, in call order.
    looked_up: Arc<Mutex<Vec<String>>>,
}

impl Default for StubModifiers {
    fn default() -> Self {
        Self {
            file: Some(FileModifier {
                modifier: Some("bob".to_string()),
                mtime: 100,
            }),
            creator: Some("carol".to_string()),
            missing_commit: false,
            looked_up: Arc::default(),
        }
    }
}

#[async_trait]
impl ModifierLookup for StubModifiers {
    async fn file_modifier(
        &self,
        _repo_id: &str,
        _store_id: &str,
        _version: u32,
        _commit_id: &ObjectId,
        path: &str,
    ) -> repo::Result<Option<FileModifier>> {
        self.looked_up.lock().unwrap().push(path.to_string());
        Ok(self.file.clone())
    }

    async fn commit_creator(
        &self,
        _repo_id: &str,
        _commit_id: &ObjectId,
    ) -> repo::Result<Option<String>> {
        if self.missing_commit {
            return Err(RepoError::NotFound);
        }
        Ok(self.creator.clone())
    }
}

/// Reads through to a shared memory backend, rejects every write.
struct ReadOnlyBackend {
    inner: Arc<MemoryBackend>,
}

#[async_trait]
impl RepoBackend for ReadOnlyBackend {
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> BackendResult<bool> {
        self.inner.object_exists(store_id, id).await
    }

    async fn read_object(&self, store_id: &str, id: &ObjectId) -> BackendResult<Vec<u8>> {
        self.inner.read_object(store_id, id).await
    }

    async fn write_object(&self, _store_id: &str, _id: &ObjectId, _data: &[u8]) -> BackendResult<()> {
        Err(BackendError::Other("store is read-only".to_string()))
    }

    async fn read_branch(&self, repo_id: &str, name: &str) -> BackendResult<Option<ObjectId>> {
        self.inner.read_branch(repo_id, name).await
    }

    async fn swap_branch(
        &self,
        repo_id: &str,
        name: &str,
        expected: Option<&ObjectId>,
        new_head: &ObjectId,
    ) -> BackendResult<SwapResult> {
        self.inner.swap_branch(repo_id, name, expected, new_head).await
    }
}

struct Fixture {
    backend: Arc<MemoryBackend>,
    repo: Arc<Repo>,
}

impl Fixture {
    fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let repo = Arc::new(Repo::from_dyn(backend.clone(), Arc::new(NoopCache)));
        Self { backend, repo }
    }

    fn engine(&self, modifiers: StubModifiers) -> MergeEngine {
        MergeEngine::new(self.repo.clone())
            .with_namer(Arc::new(TestNamer))
            .with_modifier_lookup(Arc::new(modifiers))
            .with_clock(|| 999)
    }

    async fn tree(&self, entries: Vec<Dirent>) -> ObjectId {
        let dir = Dir::new(CURRENT_VERSION, entries).unwrap();
        self.repo
            .put_dir(STORE, CURRENT_VERSION, &dir)
            .await
            .unwrap()
    }

    async fn listing(&self, id: &ObjectId) -> Vec<(String, ObjectId, bool)> {
        self.repo
            .get_dir(STORE, CURRENT_VERSION, id)
            .await
            .unwrap()
            .entries
            .into_iter()
            .map(|e| {
                let is_dir = e.is_dir();
                (e.name, e.id, is_dir)
            })
            .collect()
    }
}

fn file(name: &str, id: &str) -> Dirent {
    Dirent::file(name, id, 1, 0, "alice")
}

fn dir(name: &str, id: &ObjectId) -> Dirent {
    Dirent::dir(name, id.clone(), 0)
}

fn f(name: &str, id: &str) -> (String, ObjectId, bool) {
    (name.to_string(), id.to_string(), false)
}

fn d(name: &str, id: &ObjectId) -> (String, ObjectId, bool) {
    (name.to_string(), id.clone(), true)
}

async fn merge3(
    engine: &MergeEngine,
    base: &ObjectId,
    head: &ObjectId,
    remote: &ObjectId,
) -> Result<(ObjectId, bool)> {
    let mut opt = MergeOptions::merge(REPO, REMOTE_HEAD);
    engine
        .merge_trees(
            STORE,
            CURRENT_VERSION,
            &[base.clone(), head.clone(), remote.clone()],
            &mut opt,
        )
        .await?;
    let root = opt.merged_tree_root.unwrap_or_default();
    Ok((root, opt.conflict))
}

// =============================================================================
// File policy
// =============================================================================

#[tokio::test]
async fn test_one_sided_file_changes() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let base = fx
        .tree(vec![
            file("a", "h1"),
            file("b", "h1"),
            file("c", "h1"),
            file("d", "h1"),
            file("g", "h1"),
            file("k", "h1"),
        ])
        .await;
    let head = fx
        .tree(vec![
            file("a", "h2"),
            file("b", "h1"),
            file("d", "h1"),
            file("e", "h5"),
        ])
        .await;
    let remote = fx
        .tree(vec![
            file("a", "h1"),
            file("b", "h3"),
            file("c", "h1"),
            file("f", "h6"),
            file("g", "h7"),
        ])
        .await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(!conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![
            f("g", "h7"),
            f("f", "h6"),
            f("e", "h5"),
            f("b", "h3"),
            f("a", "h2"),
        ]
    );
}

#[tokio::test]
async fn test_same_change_on_both_sides() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let base = fx.tree(vec![file("a.txt", "h1")]).await;
    let head = fx.tree(vec![file("a.txt", "h2"), file("n.txt", "h4")]).await;
    let remote = fx.tree(vec![file("a.txt", "h2"), file("n.txt", "h4")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();
    assert!(!conflict);
    assert_eq!(merged, head);
}

#[tokio::test]
async fn test_file_conflict_keeps_both_versions() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let base = fx.tree(vec![file("a.txt", "h1")]).await;
    let head = fx.tree(vec![file("a.txt", "h2")]).await;
    let remote = fx.tree(vec![file("a.txt", "h3")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![f("conflict-bob-100-a.txt", "h3"), f("a.txt", "h2")]
    );
}

#[tokio::test]
async fn test_file_conflict_without_file_modifier_uses_creator_and_clock() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers {
        file: None,
        ..Default::default()
    });

    let base = fx.tree(vec![file("a.txt", "h1")]).await;
    let head = fx.tree(vec![file("a.txt", "h2")]).await;
    let remote = fx.tree(vec![file("a.txt", "h3")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![f("conflict-carol-999-a.txt", "h3"), f("a.txt", "h2")]
    );
}

#[tokio::test]
async fn test_added_on_both_sides_with_different_content() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let base = fx.tree(vec![]).await;
    let head = fx.tree(vec![file("new.txt", "h2")]).await;
    let remote = fx.tree(vec![file("new.txt", "h3")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![f("new.txt", "h2"), f("conflict-bob-100-new.txt", "h3")]
    );
}

#[tokio::test]
async fn test_conflict_name_collision_gets_suffix() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let base = fx.tree(vec![file("a.txt", "h1")]).await;
    let head = fx
        .tree(vec![file("a.txt", "h2"), file("conflict-bob-100-a.txt", "h9")])
        .await;
    let remote = fx.tree(vec![file("a.txt", "h3")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![
            f("conflict-bob-100-a.txt", "h9"),
            f("conflict-bob-100-a (2).txt", "h3"),
            f("a.txt", "h2"),
        ]
    );
}

#[tokio::test]
async fn test_conflict_in_subdirectory_uses_full_path() {
    let fx = Fixture::new();
    let modifiers = StubModifiers::default();
    let looked_up = modifiers.looked_up.clone();
    let engine = fx.engine(modifiers);

    let sub0 = fx.tree(vec![file("a.txt", "h1")]).await;
    let sub1 = fx.tree(vec![file("a.txt", "h2")]).await;
    let sub2 = fx.tree(vec![file("a.txt", "h3")]).await;
    let base = fx.tree(vec![dir("sub", &sub0)]).await;
    let head = fx.tree(vec![dir("sub", &sub1)]).await;
    let remote = fx.tree(vec![dir("sub", &sub2)]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(*looked_up.lock().unwrap(), vec!["sub/a.txt".to_string()]);
    let root = fx.listing(&merged).await;
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].0, "sub");
    assert_eq!(
        fx.listing(&root[0].1).await,
        vec![f("conflict-bob-100-a.txt", "h3"), f("a.txt", "h2")]
    );
}

// =============================================================================
// D/F conflicts
// =============================================================================

#[tokio::test]
async fn test_head_dir_remote_changed_file() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("inner", "h8")]).await;
    let base = fx.tree(vec![file("x", "h1")]).await;
    let head = fx.tree(vec![dir("x", &sub)]).await;
    let remote = fx.tree(vec![file("x", "h2")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![d("x", &sub), f("conflict-bob-100-x", "h2")]
    );
}

#[tokio::test]
async fn test_remote_dir_replaces_changed_head_file() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("inner", "h8")]).await;
    let base = fx.tree(vec![file("x", "h1")]).await;
    let head = fx.tree(vec![file("x", "h2")]).await;
    let remote = fx.tree(vec![dir("x", &sub)]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![f("x", "h2"), d("conflict-carol-999-x", &sub)]
    );
}

#[tokio::test]
async fn test_added_dir_in_head_added_file_in_remote() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("inner", "h8")]).await;
    let base = fx.tree(vec![]).await;
    let head = fx.tree(vec![dir("dir", &sub)]).await;
    let remote = fx.tree(vec![file("dir", "fb")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![d("dir", &sub), f("conflict-bob-100-dir", "fb")]
    );
}

#[tokio::test]
async fn test_added_file_in_head_added_dir_in_remote() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("inner", "h8")]).await;
    let base = fx.tree(vec![]).await;
    let head = fx.tree(vec![file("dir", "fa")]).await;
    let remote = fx.tree(vec![dir("dir", &sub)]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(conflict);
    assert_eq!(
        fx.listing(&merged).await,
        vec![f("dir", "fa"), d("conflict-carol-999-dir", &sub)]
    );
}

#[tokio::test]
async fn test_unchanged_dir_replaced_by_file() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("inner", "h8")]).await;
    let base = fx.tree(vec![dir("x", &sub)]).await;
    let with_file = fx.tree(vec![file("x", "f1")]).await;

    let (merged, conflict) = merge3(&engine, &base, &base, &with_file).await.unwrap();
    assert!(!conflict);
    assert_eq!(merged, with_file);

    let (merged, conflict) = merge3(&engine, &base, &with_file, &base).await.unwrap();
    assert!(!conflict);
    assert_eq!(merged, with_file);
}

// =============================================================================
// Directory policy
// =============================================================================

#[tokio::test]
async fn test_dir_changed_on_both_sides_is_merged_recursively() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub0 = fx.tree(vec![file("x", "h1")]).await;
    let sub1 = fx.tree(vec![file("x", "h2")]).await;
    let sub2 = fx.tree(vec![file("x", "h1"), file("y", "h3")]).await;
    let base = fx.tree(vec![dir("sub", &sub0)]).await;
    let head = fx.tree(vec![dir("sub", &sub1)]).await;
    let remote = fx.tree(vec![dir("sub", &sub2)]).await;

    let mut opt = MergeOptions::merge(REPO, REMOTE_HEAD);
    engine
        .merge_trees(
            STORE,
            CURRENT_VERSION,
            &[base, head, remote],
            &mut opt,
        )
        .await
        .unwrap();

    assert!(!opt.conflict);
    assert_eq!(opt.visit_dirs, 3);
    let merged = opt.merged_tree_root.unwrap();
    let root = fx.listing(&merged).await;
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].0, "sub");
    assert!(root[0].2);
    assert_eq!(
        fx.listing(&root[0].1).await,
        vec![f("y", "h3"), f("x", "h2")]
    );
}

#[tokio::test]
async fn test_dir_deleted_in_remote_but_changed_in_head() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub0 = fx.tree(vec![file("x", "h1")]).await;
    let sub1 = fx.tree(vec![file("x", "h2")]).await;
    let base = fx.tree(vec![dir("sub", &sub0)]).await;
    let head = fx.tree(vec![dir("sub", &sub1)]).await;
    let remote = fx.tree(vec![]).await;
    let before = fx.backend.object_count();

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(!conflict);
    assert_eq!(merged, head);
    assert_eq!(fx.backend.object_count(), before);
}

#[tokio::test]
async fn test_dir_deleted_in_head_unchanged_in_remote() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("x", "h1")]).await;
    let base = fx.tree(vec![dir("sub", &sub), file("a", "h1")]).await;
    let head = fx.tree(vec![file("a", "h1")]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &base).await.unwrap();
    assert!(!conflict);
    assert_eq!(merged, head);
}

#[tokio::test]
async fn test_dir_changed_in_remote_but_deleted_in_head() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub0 = fx.tree(vec![file("y", "h1"), file("x", "h1")]).await;
    let sub2 = fx.tree(vec![file("y", "h1"), file("x", "h2")]).await;
    let base = fx.tree(vec![dir("sub", &sub0)]).await;
    let head = fx.tree(vec![]).await;
    let remote = fx
        .tree(vec![Dirent::dir("sub", sub2.clone(), 4242)])
        .await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(!conflict);
    let root = fx
        .repo
        .get_dir(STORE, CURRENT_VERSION, &merged)
        .await
        .unwrap();
    assert_eq!(root.entries.len(), 1);
    let sub = &root.entries[0];
    assert_eq!(sub.name, "sub");
    assert!(sub.is_dir());
    assert_eq!(sub.mtime, 4242);
    assert_ne!(sub.id, sub2);
    assert_eq!(fx.listing(&sub.id).await, vec![f("x", "h2")]);
}

#[tokio::test]
async fn test_dir_added_on_both_sides_is_merged() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let left = fx.tree(vec![file("l", "h1")]).await;
    let right = fx.tree(vec![file("r", "h2")]).await;
    let base = fx.tree(vec![]).await;
    let head = fx.tree(vec![dir("new", &left)]).await;
    let remote = fx.tree(vec![dir("new", &right)]).await;

    let (merged, conflict) = merge3(&engine, &base, &head, &remote).await.unwrap();

    assert!(!conflict);
    let root = fx.listing(&merged).await;
    assert_eq!(root.len(), 1);
    assert_eq!(
        fx.listing(&root[0].1).await,
        vec![f("r", "h2"), f("l", "h1")]
    );
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_conflict_without_remote_head_fails() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let base = fx.tree(vec![file("a.txt", "h1")]).await;
    let head = fx.tree(vec![file("a.txt", "h2")]).await;
    let remote = fx.tree(vec![file("a.txt", "h3")]).await;

    let mut opt = MergeOptions {
        do_merge: true,
        ..Default::default()
    };
    let err = engine
        .merge_trees(STORE, CURRENT_VERSION, &[base, head, remote], &mut opt)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::ConflictNaming { ref path, .. } if path == "a.txt"));
}

#[tokio::test]
async fn test_conflict_with_unreadable_remote_commit_fails() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers {
        file: None,
        missing_commit: true,
        ..Default::default()
    });

    let base = fx.tree(vec![file("a.txt", "h1")]).await;
    let head = fx.tree(vec![file("a.txt", "h2")]).await;
    let remote = fx.tree(vec![file("a.txt", "h3")]).await;

    let err = merge3(&engine, &base, &head, &remote).await.unwrap_err();
    assert!(matches!(err, MergeError::ConflictNaming { .. }));
}

#[tokio::test]
async fn test_missing_root_fails() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());
    let root = fx.tree(vec![file("a", "h1")]).await;
    let missing = "ab".repeat(32);

    let err = merge3(&engine, &root, &missing, &root).await.unwrap_err();
    assert!(matches!(err, MergeError::MissingObject { ref id, .. } if *id == missing));
}

#[tokio::test]
async fn test_missing_subtree_fails() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let missing = "cd".repeat(32);
    let sub0 = fx.tree(vec![file("x", "h1")]).await;
    let sub2 = fx.tree(vec![file("x", "h3")]).await;
    let base = fx.tree(vec![dir("sub", &sub0)]).await;
    let head = fx.tree(vec![dir("sub", &missing)]).await;
    let remote = fx.tree(vec![dir("sub", &sub2)]).await;

    let err = merge3(&engine, &base, &head, &remote).await.unwrap_err();
    assert!(matches!(err, MergeError::MissingObject { ref id, .. } if *id == missing));
}

#[tokio::test]
async fn test_rejected_write_fails() {
    let fx = Fixture::new();
    let base = fx.tree(vec![file("a", "h1")]).await;
    let head = fx.tree(vec![file("a", "h1"), file("b", "h2")]).await;
    let remote = fx.tree(vec![file("a", "h1"), file("c", "h3")]).await;

    let read_only = Arc::new(Repo::new(
        ReadOnlyBackend {
            inner: fx.backend.clone(),
        },
        NoopCache,
    ));
    let engine = MergeEngine::new(read_only).with_namer(Arc::new(TestNamer));

    let err = merge3(&engine, &base, &head, &remote).await.unwrap_err();
    assert!(matches!(err, MergeError::Persistence { ref path, .. } if path.is_empty()));
}

#[tokio::test]
async fn test_root_count_is_checked() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());
    let root = fx.tree(vec![file("a", "h1")]).await;

    let mut opt = MergeOptions::default();
    let err = engine
        .merge_trees(STORE, CURRENT_VERSION, &[root.clone()], &mut opt)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::InvalidRoots(1)));

    let roots = vec![root; 4];
    let err = engine
        .merge_trees(STORE, CURRENT_VERSION, &roots, &mut opt)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::InvalidRoots(4)));
}

// =============================================================================
// Visit-only mode
// =============================================================================

#[tokio::test]
async fn test_visit_three_trees_without_merging() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());

    let sub = fx.tree(vec![file("x", "h1")]).await;
    let base = fx.tree(vec![file("a", "h1")]).await;
    let head = fx.tree(vec![file("a", "h2"), dir("sub", &sub)]).await;
    let remote = fx.tree(vec![file("b", "h3")]).await;
    let before = fx.backend.object_count();

    let mut seen = Vec::new();
    let mut record = |basedir: &str, slots: &EntrySlots| -> std::result::Result<(), String> {
        let present: Vec<bool> = slots.iter().map(|s| s.is_some()).collect();
        seen.push((format!("{}{}", basedir, slots.name()), present));
        Ok(())
    };
    let mut opt = MergeOptions::visit(&mut record);
    engine
        .merge_trees(STORE, CURRENT_VERSION, &[base, head, remote], &mut opt)
        .await
        .unwrap();
    let merged_root = opt.merged_tree_root.clone();
    let visit_dirs = opt.visit_dirs;
    drop(opt);

    assert!(merged_root.is_none());
    assert_eq!(visit_dirs, 1);
    assert_eq!(fx.backend.object_count(), before);
    assert_eq!(
        seen,
        vec![
            ("sub".to_string(), vec![false, true, false]),
            ("sub/x".to_string(), vec![false, true, false]),
            ("b".to_string(), vec![false, false, true]),
            ("a".to_string(), vec![true, true, false]),
        ]
    );
}

#[tokio::test]
async fn test_visitor_error_aborts_walk() {
    let fx = Fixture::new();
    let engine = fx.engine(StubModifiers::default());
    let old = fx.tree(vec![file("a", "h1"), file("b", "h1")]).await;
    let new = fx.tree(vec![file("a", "h2")]).await;

    let mut calls = 0;
    let mut stop = |_: &str, _: &EntrySlots| -> std::result::Result<(), String> {
        calls += 1;
        Err("stop".to_string())
    };
    let mut opt = MergeOptions::visit(&mut stop);
    let err = engine
        .merge_trees(STORE, CURRENT_VERSION, &[old, new], &mut opt)
        .await
        .unwrap_err();
    drop(opt);

    assert!(matches!(err, MergeError::Visit { ref path, .. } if path == "b"));
    assert_eq!(calls, 1);
}
