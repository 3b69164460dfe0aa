//! Caches in front of the object store.
//!
//! - [`ObjectCache`] - cache interface keyed by `(store_id, object id)`
//! - [`NoopCache`] - used when caching is disabled via configuration
//! - [`LruObjectCache`] - in-memory LRU of directories and existence checks

mod lru_object_cache;
mod repo_cache;

pub use lru_object_cache::LruObjectCache;
pub use repo_cache::{CacheError, NoopCache, ObjectCache, Result as ObjectCacheResult};
