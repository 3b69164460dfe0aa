use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::repo_backend::{BackendError, ObjectId, RepoBackend, Result, SwapResult};

/// Counter for generating unique temp file names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A filesystem-based implementation of `RepoBackend`.
///
/// Layout under the base directory:
/// - `objects/{store_id}/{id[0..2]}/{id[2..]}` for objects
/// - `branches/{repo_id}/{name}` holding the head commit id
///
/// Writes are atomic: data is written to a temp file in `.tmp/` then renamed.
/// Branch swaps are serialized within one process.
pub struct FsBackend {
    base_path: PathBuf,
    branch_lock: Mutex<()>,
}

impl FsBackend {
    /// Create a new filesystem backend rooted at the given path.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            branch_lock: Mutex::new(()),
        }
    }

    fn object_path(&self, store_id: &str, id: &str) -> PathBuf {
        let dir = self.base_path.join("objects").join(store_id);
        if id.len() > 2 {
            dir.join(&id[0..2]).join(&id[2..])
        } else {
            dir.join(id)
        }
    }

    fn branch_path(&self, repo_id: &str, name: &str) -> PathBuf {
        self.base_path.join("branches").join(repo_id).join(name)
    }

    fn temp_dir(&self) -> PathBuf {
        self.base_path.join(".tmp")
    }

    /// Generate a unique temp file path.
    fn temp_file_path(&self) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        self.temp_dir().join(format!("tmp.{}.{}", pid, counter))
    }

    async fn write_atomic(&self, full_path: &Path, data: &[u8]) -> Result<()> {
        let temp_path = self.temp_file_path();

        fs::create_dir_all(self.temp_dir()).await?;
        fs::write(&temp_path, data).await?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&temp_path, full_path).await?;
        Ok(())
    }
}

fn not_found_aware(e: std::io::Error) -> BackendError {
    if e.kind() == std::io::ErrorKind::NotFound {
        BackendError::NotFound
    } else {
        BackendError::Io(e)
    }
}

#[async_trait]
impl RepoBackend for FsBackend {
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool> {
        Ok(fs::try_exists(self.object_path(store_id, id)).await?)
    }

    async fn read_object(&self, store_id: &str, id: &ObjectId) -> Result<Vec<u8>> {
        fs::read(self.object_path(store_id, id))
            .await
            .map_err(not_found_aware)
    }

    async fn write_object(&self, store_id: &str, id: &ObjectId, data: &[u8]) -> Result<()> {
        self.write_atomic(&self.object_path(store_id, id), data).await
    }

    async fn read_branch(&self, repo_id: &str, name: &str) -> Result<Option<ObjectId>> {
        match fs::read_to_string(self.branch_path(repo_id, name)).await {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    async fn swap_branch(
        &self,
        repo_id: &str,
        name: &str,
        expected: Option<&ObjectId>,
        new_head: &ObjectId,
    ) -> Result<SwapResult> {
        let _guard = self.branch_lock.lock().await;

        let current = self.read_branch(repo_id, name).await?;
        if current.as_ref() != expected {
            return Ok(SwapResult::Mismatch(current));
        }

        self.write_atomic(&self.branch_path(repo_id, name), new_head.as_bytes())
            .await?;
        Ok(SwapResult::Success)
    }
}
