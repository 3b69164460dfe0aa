//! Configuration types for treesync-rs.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file.

use std::path::PathBuf;
use std::time::Duration;

use crate::merge::RetryPolicy;

// =============================================================================
// Config Sections
// =============================================================================

/// [store] section - where objects and branches live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory of the filesystem object store.
    pub path: PathBuf,
    /// Namespace for directory and file objects.
    pub store_id: String,
    /// Object format version written into new objects.
    pub version: u32,
}

/// [cache] section - in-memory cache of decoded directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Capacity in directories. `None` disables caching.
    pub dir_entries: Option<usize>,
}

/// [merge] section - branch update retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub max_retries: u32,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl MergeConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            min_delay: Duration::from_millis(self.retry_min_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// [identity] section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Creator name recorded on commits.
    pub name: String,
}

// =============================================================================
// Top-level Config
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub merge: MergeConfig,
    pub identity: IdentityConfig,
}
