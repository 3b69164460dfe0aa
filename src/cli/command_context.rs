//! Shared state for running a command: configuration and the opened store.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::FsBackend;
use crate::caches::{LruObjectCache, NoopCache};
use crate::cli::{GlobalArgs, Result};
use crate::config::{Config, ConfigResult, read_config};
use crate::merge::{MergeDriver, MergeEngine};
use crate::repo::Repo;

/// Everything a command needs to talk to the object store.
pub struct CommandContext {
    pub config: Config,
    pub repo: Arc<Repo>,
    pub json: bool,
}

impl CommandContext {
    /// Read configuration and open the filesystem store it points at.
    pub fn open(global: &GlobalArgs) -> Result<Self> {
        let ConfigResult { config, warnings } = read_config(&global.to_config_source())?;
        for warning in &warnings {
            warn!("{}", warning);
        }

        let repo = Arc::new(open_repo(&config));
        debug!(
            path = %config.store.path.display(),
            store_id = %config.store.store_id,
            "opened store"
        );

        Ok(Self {
            config,
            repo,
            json: global.json,
        })
    }

    pub fn store_id(&self) -> &str {
        &self.config.store.store_id
    }

    pub fn version(&self) -> u32 {
        self.config.store.version
    }

    pub fn engine(&self) -> MergeEngine {
        MergeEngine::new(self.repo.clone())
    }

    pub fn driver(&self) -> MergeDriver {
        MergeDriver::new(self.repo.clone(), self.store_id(), self.version())
            .with_retry(self.config.merge.retry_policy())
    }
}

fn open_repo(config: &Config) -> Repo {
    let backend = FsBackend::new(&config.store.path);
    match config.cache.dir_entries.and_then(NonZeroUsize::new) {
        Some(capacity) => Repo::new(backend, LruObjectCache::new(capacity)),
        None => Repo::new(backend, NoopCache),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::ObjectStore;
    use crate::repository::{CURRENT_VERSION, Dir, Dirent};

    #[tokio::test]
    async fn test_open_uses_store_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        let global = GlobalArgs {
            store: Some(dir.path().to_path_buf()),
            config_overrides: vec![("store.store_id".to_string(), "s1".to_string())],
            ..Default::default()
        };
        let ctx = CommandContext::open(&global).unwrap();
        assert_eq!(ctx.store_id(), "s1");
        assert_eq!(ctx.config.store.path, dir.path());

        let tree = Dir::new(CURRENT_VERSION, vec![Dirent::file("a", "h1", 1, 0, "m")]).unwrap();
        let id = ctx.repo.put_dir("s1", CURRENT_VERSION, &tree).await.unwrap();
        assert!(dir.path().join("objects").join("s1").exists());
        assert_eq!(ctx.repo.get_dir("s1", CURRENT_VERSION, &id).await.unwrap(), tree);
    }
}
