//! Error types for merge operations.

use thiserror::Error;

use crate::repo::RepoError;
use crate::repository::ObjectId;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for merge operations.
///
/// Every variant is terminal for the merge attempt that raised it. Nothing is
/// retried inside the engine.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A referenced directory could not be loaded from the store.
    #[error("failed to find dir {store_id}:{id}")]
    MissingObject {
        store_id: String,
        id: ObjectId,
        #[source]
        source: RepoError,
    },

    /// No conflict name could be produced for an entry.
    #[error("failed to generate conflict name for '{path}': {reason}")]
    ConflictNaming { path: String, reason: String },

    /// The store rejected a merged directory.
    #[error("failed to save merged tree {store_id}:{path}")]
    Persistence {
        store_id: String,
        path: String,
        #[source]
        source: RepoError,
    },

    /// Other repository error during merge.
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    /// The visitor aborted a visit-only walk.
    #[error("visit aborted at '{path}': {reason}")]
    Visit { path: String, reason: String },

    /// The merge was called with a root count other than 2 or 3.
    #[error("merge needs 2 or 3 roots, got {0}")]
    InvalidRoots(usize),
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;
