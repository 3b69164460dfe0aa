//! Branch update with automatic merge.
//!
//! A client uploads a commit made on top of `base_commit`. If the branch
//! still points at `base_commit`, it fast-forwards. Otherwise the upload is
//! merged with the current head and a merge commit is put on the branch.
//! The branch pointer only ever moves by compare-and-swap; losing the race
//! restarts the whole attempt from a fresh head.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use super::engine::MergeEngine;
use super::error::MergeError;
use super::types::MergeOptions;
use crate::backend::SwapResult;
use crate::diff::{describe_changes, diff_merge_roots};
use crate::repo::{ObjectStore, Repo, RepoError};
use crate::repository::{Commit, EMPTY_DIR_ID, ObjectId};

const AUTO_MERGE_DESCRIPTION: &str = "Auto merge by system";

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("branch {repo_id}/{branch} kept moving, gave up after {attempts} attempts")]
    BranchUpdateConflict {
        repo_id: String,
        branch: String,
        attempts: u32,
    },
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

// =============================================================================
// RetryPolicy
// =============================================================================

/// How often and how patiently to retry a lost branch update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    fn random_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

// =============================================================================
// MergeDriver
// =============================================================================

/// Advances branches, merging when the branch moved under the client.
pub struct MergeDriver {
    repo: Arc<Repo>,
    engine: MergeEngine,
    store_id: String,
    version: u32,
    retry: RetryPolicy,
    clock: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl MergeDriver {
    pub fn new(repo: Arc<Repo>, store_id: impl Into<String>, version: u32) -> Self {
        Self {
            engine: MergeEngine::new(repo.clone()),
            repo,
            store_id: store_id.into(),
            version,
            retry: RetryPolicy::default(),
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Use `engine` instead of the default one over the driver's repo.
    pub fn with_engine(mut self, engine: MergeEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Clock for merge commit timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Put `new_commit` on `branch`, merging with the current head if the
    /// branch is no longer at `base_commit`.
    ///
    /// Returns the commit the branch points at afterwards: `new_commit` on a
    /// fast-forward, the merge commit otherwise.
    pub async fn fast_forward_or_merge(
        &self,
        repo_id: &str,
        branch: &str,
        base_commit: Option<&ObjectId>,
        new_commit: &ObjectId,
    ) -> DriverResult<ObjectId> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let head = self.repo.read_branch(repo_id, branch).await?;

            let target = match head.as_ref() {
                None => new_commit.clone(),
                Some(head) if Some(head) == base_commit => new_commit.clone(),
                Some(head) => {
                    self.merge_commit(repo_id, base_commit, head, new_commit)
                        .await?
                }
            };

            match self
                .repo
                .swap_branch(repo_id, branch, head.as_ref(), &target)
                .await?
            {
                SwapResult::Success => return Ok(target),
                SwapResult::Mismatch(current) => {
                    if attempts > self.retry.max_retries {
                        return Err(DriverError::BranchUpdateConflict {
                            repo_id: repo_id.to_string(),
                            branch: branch.to_string(),
                            attempts,
                        });
                    }
                    let delay = self.retry.random_delay();
                    info!(
                        repo_id,
                        branch,
                        current = ?current,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "branch moved during update, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Merge `new_commit` into `head` and write the merge commit.
    async fn merge_commit(
        &self,
        repo_id: &str,
        base_commit: Option<&ObjectId>,
        head_id: &ObjectId,
        new_id: &ObjectId,
    ) -> DriverResult<ObjectId> {
        let base_root = match base_commit {
            Some(id) => self.repo.read_commit(repo_id, id).await?.root_id,
            None => EMPTY_DIR_ID.to_string(),
        };
        let head = self.repo.read_commit(repo_id, head_id).await?;
        let new = self.repo.read_commit(repo_id, new_id).await?;

        let mut opt = MergeOptions::merge(repo_id, new_id.clone());
        self.engine
            .merge_trees(
                &self.store_id,
                self.version,
                &[base_root, head.root_id.clone(), new.root_id.clone()],
                &mut opt,
            )
            .await?;
        debug!(repo_id, visit_dirs = opt.visit_dirs, "merged trees");

        let merged_root = opt
            .merged_tree_root
            .unwrap_or_else(|| EMPTY_DIR_ID.to_string());

        let description = if opt.conflict {
            let changes = diff_merge_roots(
                &self.engine,
                &self.store_id,
                self.version,
                &merged_root,
                &head.root_id,
                &new.root_id,
            )
            .await?;
            describe_changes(&changes)
        } else {
            AUTO_MERGE_DESCRIPTION.to_string()
        };

        let commit = Commit {
            repo_id: repo_id.to_string(),
            root_id: merged_root,
            creator_name: new.creator_name,
            creator: new.creator,
            description,
            ctime: (self.clock)(),
            parent_id: Some(head_id.clone()),
            second_parent_id: Some(new_id.clone()),
            version: self.version,
            conflict: opt.conflict,
            new_merge: true,
        };
        Ok(self.repo.write_commit(&commit).await?)
    }
}
