//! In-memory LRU implementation of [`ObjectCache`].

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;

use super::repo_cache::{ObjectCache, Result};
use crate::repository::{Dir, ObjectId};

type CacheKey = (String, ObjectId);

/// Keeps the most recently used directories and existence checks in memory.
///
/// Capacity is counted in entries, separately for directories and for
/// existence records.
pub struct LruObjectCache {
    dirs: Mutex<LruCache<CacheKey, Dir>>,
    exists: Mutex<LruCache<CacheKey, ()>>,
}

impl LruObjectCache {
    /// Create a cache holding at most `capacity` directories.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            dirs: Mutex::new(LruCache::new(capacity)),
            exists: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of directories currently cached.
    pub async fn dir_count(&self) -> usize {
        self.dirs.lock().await.len()
    }
}

fn key(store_id: &str, id: &ObjectId) -> CacheKey {
    (store_id.to_string(), id.clone())
}

#[async_trait]
impl ObjectCache for LruObjectCache {
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool> {
        let k = key(store_id, id);
        if self.exists.lock().await.get(&k).is_some() {
            return Ok(true);
        }
        // A cached directory is proof of existence too.
        Ok(self.dirs.lock().await.contains(&k))
    }

    async fn set_object_exists(&self, store_id: &str, id: &ObjectId) -> Result<()> {
        self.exists.lock().await.put(key(store_id, id), ());
        Ok(())
    }

    async fn get_dir(&self, store_id: &str, id: &ObjectId) -> Result<Option<Dir>> {
        let mut dirs = self.dirs.lock().await;
        Ok(dirs.get(&key(store_id, id)).cloned())
    }

    async fn set_dir(&self, store_id: &str, dir: &Dir) -> Result<()> {
        let mut dirs = self.dirs.lock().await;
        dirs.put(key(store_id, &dir.dir_id), dir.clone());
        Ok(())
    }
}
