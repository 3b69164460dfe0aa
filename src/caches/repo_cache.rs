//! Object cache trait for caching directory contents and object existence.

use async_trait::async_trait;

use crate::repository::{Dir, ObjectId};

/// A cache failure. [`crate::repo::Repo`] treats any cache error as a miss.
#[derive(Debug)]
pub struct CacheError(pub String);

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cache error: {}", self.0)
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A cache in front of an object store.
///
/// Objects are immutable, so cached entries never go stale; the only reason
/// to drop an entry is memory pressure. Cache keys include the store id so a
/// single cache can serve several stores.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Check whether an object is known to exist in the store.
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool>;

    /// Record that an object exists in the store.
    async fn set_object_exists(&self, store_id: &str, id: &ObjectId) -> Result<()>;

    /// Retrieve a cached directory.
    ///
    /// Returns `None` if the directory is not in the cache.
    async fn get_dir(&self, store_id: &str, id: &ObjectId) -> Result<Option<Dir>>;

    /// Store a directory in the cache.
    async fn set_dir(&self, store_id: &str, dir: &Dir) -> Result<()>;
}

// =============================================================================
// NoopCache
// =============================================================================

/// A no-op cache implementation that never caches anything.
///
/// All reads return cache misses, all writes silently succeed without storing.
/// Use this when caching is disabled via configuration.
pub struct NoopCache;

#[async_trait]
impl ObjectCache for NoopCache {
    async fn object_exists(&self, _store_id: &str, _id: &ObjectId) -> Result<bool> {
        Ok(false)
    }

    async fn set_object_exists(&self, _store_id: &str, _id: &ObjectId) -> Result<()> {
        Ok(())
    }

    async fn get_dir(&self, _store_id: &str, _id: &ObjectId) -> Result<Option<Dir>> {
        Ok(None)
    }

    async fn set_dir(&self, _store_id: &str, _dir: &Dir) -> Result<()> {
        Ok(())
    }
}
