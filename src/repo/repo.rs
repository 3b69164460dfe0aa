//! Typed object store over a backend and a cache.
//!
//! The [`Repo`] struct wraps a [`RepoBackend`] and adds:
//! - Encoding and decoding of [`Dir`], [`FileMeta`] and [`Commit`] objects
//! - Caching of decoded directories and existence checks via [`ObjectCache`]
//! - Write skipping for objects that already exist

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{BackendError, RepoBackend, SwapResult};
use crate::caches::ObjectCache;
use crate::repository::{
    Commit, Dir, EMPTY_DIR_ID, FileMeta, ObjectError, ObjectId, from_json, to_canonical_json,
};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for repository operations.
#[derive(Debug, Clone)]
pub enum RepoError {
    /// The object was not found.
    NotFound,
    /// An I/O error occurred.
    Io(String),
    /// An object could not be encoded or decoded.
    Object(String),
    /// A custom error message.
    Other(String),
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoError::NotFound => write!(f, "not found"),
            RepoError::Io(msg) => write!(f, "I/O error: {}", msg),
            RepoError::Object(msg) => write!(f, "object error: {}", msg),
            RepoError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RepoError {}

impl From<BackendError> for RepoError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound => RepoError::NotFound,
            BackendError::Io(io_err) => RepoError::Io(io_err.to_string()),
            BackendError::Other(msg) => RepoError::Other(msg),
        }
    }
}

impl From<ObjectError> for RepoError {
    fn from(e: ObjectError) -> Self {
        RepoError::Object(e.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

// =============================================================================
// ObjectStore
// =============================================================================

/// The content-addressed store contract the merge engine consumes.
///
/// Directory and file objects are addressed by `(store_id, id)`; commits by
/// `(repo_id, id)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Load a directory. [`EMPTY_DIR_ID`] yields an empty directory without
    /// touching the store.
    async fn get_dir(&self, store_id: &str, version: u32, id: &ObjectId) -> Result<Dir>;

    /// Load file metadata.
    async fn get_file_meta(&self, store_id: &str, version: u32, id: &ObjectId)
    -> Result<FileMeta>;

    /// Persist a directory and return its id. Idempotent.
    async fn put_dir(&self, store_id: &str, version: u32, dir: &Dir) -> Result<ObjectId>;

    /// Check whether an object exists.
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool>;

    /// Load a commit.
    async fn read_commit(&self, repo_id: &str, id: &ObjectId) -> Result<Commit>;
}

// =============================================================================
// Repo
// =============================================================================

/// A typed object store over a [`RepoBackend`] with an [`ObjectCache`].
pub struct Repo {
    backend: Arc<dyn RepoBackend>,
    cache: Arc<dyn ObjectCache>,
}

impl Repo {
    /// Create a new repository with the given backend and cache.
    pub fn new<B, C>(backend: B, cache: C) -> Self
    where
        B: RepoBackend + 'static,
        C: ObjectCache + 'static,
    {
        Self {
            backend: Arc::new(backend),
            cache: Arc::new(cache),
        }
    }

    /// Create a new repository from pre-wrapped trait objects.
    pub fn from_dyn(backend: Arc<dyn RepoBackend>, cache: Arc<dyn ObjectCache>) -> Self {
        Self { backend, cache }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get a reference to the repository's cache.
    pub fn cache(&self) -> &Arc<dyn ObjectCache> {
        &self.cache
    }

    // =========================================================================
    // Raw Read/Write
    // =========================================================================

    /// Write raw bytes under `id` unless the object already exists.
    async fn write_if_absent(&self, store_id: &str, id: &ObjectId, data: &[u8]) -> Result<()> {
        if self.object_exists_internal(store_id, id).await? {
            debug!(store_id, id = %id, "object exists, skipping write");
            return Ok(());
        }

        self.backend.write_object(store_id, id, data).await?;

        // Mark as existing in cache
        let _ = self.cache.set_object_exists(store_id, id).await;
        Ok(())
    }

    async fn object_exists_internal(&self, store_id: &str, id: &ObjectId) -> Result<bool> {
        // Check cache first
        if let Ok(true) = self.cache.object_exists(store_id, id).await {
            return Ok(true);
        }

        let exists = self.backend.object_exists(store_id, id).await?;
        if exists {
            let _ = self.cache.set_object_exists(store_id, id).await;
        }
        Ok(exists)
    }

    // =========================================================================
    // File Metadata
    // =========================================================================

    /// Persist file metadata and return its id.
    pub async fn put_file_meta(&self, store_id: &str, meta: &FileMeta) -> Result<ObjectId> {
        let id = meta.id()?;
        self.write_if_absent(store_id, &id, &meta.encode()?).await?;
        Ok(id)
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Persist a commit in its repository's namespace and return its id.
    pub async fn write_commit(&self, commit: &Commit) -> Result<ObjectId> {
        let json = to_canonical_json(commit)?;
        let id = commit.id()?;
        self.write_if_absent(&commit.repo_id, &id, &json).await?;
        Ok(id)
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Read the commit a branch points at.
    pub async fn read_branch(&self, repo_id: &str, name: &str) -> Result<Option<ObjectId>> {
        Ok(self.backend.read_branch(repo_id, name).await?)
    }

    /// Move a branch from `expected` to `new_head` if nobody moved it first.
    pub async fn swap_branch(
        &self,
        repo_id: &str,
        name: &str,
        expected: Option<&ObjectId>,
        new_head: &ObjectId,
    ) -> Result<SwapResult> {
        Ok(self
            .backend
            .swap_branch(repo_id, name, expected, new_head)
            .await?)
    }
}

#[async_trait]
impl ObjectStore for Repo {
    async fn get_dir(&self, store_id: &str, version: u32, id: &ObjectId) -> Result<Dir> {
        if id == EMPTY_DIR_ID {
            return Ok(Dir::empty(version));
        }

        // Check cache first
        if let Ok(Some(dir)) = self.cache.get_dir(store_id, id).await {
            return Ok(dir);
        }

        let data = self.backend.read_object(store_id, id).await.map_err(|e| {
            warn!(store_id, id = %id, error = %e, "failed to read directory object");
            RepoError::from(e)
        })?;
        let dir = Dir::decode(id, &data).map_err(|e| {
            warn!(store_id, id = %id, error = %e, "corrupt directory object");
            RepoError::from(e)
        })?;

        // Cache the result
        let _ = self.cache.set_dir(store_id, &dir).await;

        Ok(dir)
    }

    async fn get_file_meta(
        &self,
        store_id: &str,
        _version: u32,
        id: &ObjectId,
    ) -> Result<FileMeta> {
        let data = self.backend.read_object(store_id, id).await?;
        Ok(FileMeta::decode(id, &data)?)
    }

    async fn put_dir(&self, store_id: &str, _version: u32, dir: &Dir) -> Result<ObjectId> {
        if dir.dir_id == EMPTY_DIR_ID {
            return Ok(dir.dir_id.clone());
        }

        self.write_if_absent(store_id, &dir.dir_id, &dir.encode()?)
            .await?;
        let _ = self.cache.set_dir(store_id, dir).await;

        Ok(dir.dir_id.clone())
    }

    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool> {
        if id == EMPTY_DIR_ID {
            return Ok(true);
        }
        self.object_exists_internal(store_id, id).await
    }

    async fn read_commit(&self, repo_id: &str, id: &ObjectId) -> Result<Commit> {
        let data = self.backend.read_object(repo_id, id).await?;
        Ok(from_json(&data)?)
    }
}
