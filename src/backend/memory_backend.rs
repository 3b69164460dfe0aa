use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::repo_backend::{BackendError, ObjectId, RepoBackend, Result, SwapResult};

type ObjectKey = (String, ObjectId);
type BranchKey = (String, String);

/// An in-memory implementation of `RepoBackend`, intended primarily for testing.
pub struct MemoryBackend {
    objects: RwLock<HashMap<ObjectKey, Vec<u8>>>,
    branches: RwLock<HashMap<BranchKey, ObjectId>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            branches: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects stored across all namespaces.
    pub fn object_count(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> BackendError {
    BackendError::Other("memory backend lock poisoned".to_string())
}

#[async_trait]
impl RepoBackend for MemoryBackend {
    async fn object_exists(&self, store_id: &str, id: &ObjectId) -> Result<bool> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.contains_key(&(store_id.to_string(), id.clone())))
    }

    async fn read_object(&self, store_id: &str, id: &ObjectId) -> Result<Vec<u8>> {
        let objects = self.objects.read().map_err(poisoned)?;
        objects
            .get(&(store_id.to_string(), id.clone()))
            .cloned()
            .ok_or(BackendError::NotFound)
    }

    async fn write_object(&self, store_id: &str, id: &ObjectId, data: &[u8]) -> Result<()> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert((store_id.to_string(), id.clone()), data.to_vec());
        Ok(())
    }

    async fn read_branch(&self, repo_id: &str, name: &str) -> Result<Option<ObjectId>> {
        let branches = self.branches.read().map_err(poisoned)?;
        Ok(branches
            .get(&(repo_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn swap_branch(
        &self,
        repo_id: &str,
        name: &str,
        expected: Option<&ObjectId>,
        new_head: &ObjectId,
    ) -> Result<SwapResult> {
        let mut branches = self.branches.write().map_err(poisoned)?;
        let key = (repo_id.to_string(), name.to_string());
        let current = branches.get(&key);

        let matches = match (current, expected) {
            (None, None) => true,
            (Some(current), Some(exp)) => current == exp,
            _ => false,
        };

        if matches {
            branches.insert(key, new_head.clone());
            Ok(SwapResult::Success)
        } else {
            Ok(SwapResult::Mismatch(current.cloned()))
        }
    }
}
