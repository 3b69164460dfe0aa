use async_trait::async_trait;

pub use crate::repository::ObjectId;

/// Error type for backend operations.
#[derive(Debug)]
pub enum BackendError {
    /// The object or branch was not found.
    NotFound,
    /// An I/O error occurred.
    Io(std::io::Error),
    /// A custom error message.
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotFound => write!(f, "not found"),
            BackendError::Io(e) => write!(f, "I/O error: {}", e),
            BackendError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// The result of a compare-and-swap operation on a branch head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapResult {
    /// The swap succeeded.
    Success,
    /// The swap failed because the branch head did not match the expected value.
    /// Contains the actual current head (if any).
    Mismatch(Option<ObjectId>),
}

/// The raw storage interface underneath a treesync object store.
///
/// Objects are opaque byte strings keyed by `(store_id, object id)`. Directory
/// and file objects live in a store's namespace; commits live in the namespace
/// of the repository they belong to. Branch heads are keyed by
/// `(repo_id, branch name)` and only change through [`RepoBackend::swap_branch`].
#[async_trait]
pub trait RepoBackend: Send + Sync {
    /// Check if an object with the given ID exists.
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool>;

    /// Read an object's contents by ID.
    ///
    /// Returns `BackendError::NotFound` if the object does not exist.
    async fn read_object(&self, store_id: &str, id: &ObjectId) -> Result<Vec<u8>>;

    /// Write an object with the given ID and contents.
    ///
    /// Implementations are not required to verify that the ID matches the
    /// hash of the contents. Rewriting an existing object is harmless.
    async fn write_object(&self, store_id: &str, id: &ObjectId, data: &[u8]) -> Result<()>;

    /// Read the commit id a branch points at, if the branch exists.
    async fn read_branch(&self, repo_id: &str, name: &str) -> Result<Option<ObjectId>>;

    /// Atomically move a branch if it currently points at `expected`.
    ///
    /// `expected == None` means the branch must not exist yet. On mismatch the
    /// branch is left untouched and the actual head is returned.
    async fn swap_branch(
        &self,
        repo_id: &str,
        name: &str,
        expected: Option<&ObjectId>,
        new_head: &ObjectId,
    ) -> Result<SwapResult>;
}
