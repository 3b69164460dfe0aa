//! Snapshot a local directory into the object store.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::UNIX_EPOCH;

use clap::Args;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cli::command_context::CommandContext;
use crate::cli::{CliError, OutputSink, Result};
use crate::repo::ObjectStore;
use crate::repository::{Dir, Dirent, FileMeta, ObjectId};

/// Arguments for the import command.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Local directory to import.
    pub path: PathBuf,

    #[command(flatten)]
    pub output: OutputSink,
}

#[derive(Serialize)]
struct ImportOutput {
    root: ObjectId,
}

impl ImportArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let root = import_dir(ctx, &self.path).await?;

        if ctx.json {
            self.output.write_json(&ImportOutput { root }).await?;
        } else {
            self.output.write_str(&root).await?;
        }
        Ok(())
    }
}

type ImportFuture<'a> = Pin<Box<dyn Future<Output = Result<ObjectId>> + Send + 'a>>;

/// Store every regular file and directory under `path` and return the id of
/// the directory object for `path`. Other file types are skipped.
pub fn import_dir<'a>(ctx: &'a CommandContext, path: &'a Path) -> ImportFuture<'a> {
    Box::pin(async move {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(path).await?;

        while let Some(entry) = reader.next_entry().await? {
            let entry_path = entry.path();
            let name = entry
                .file_name()
                .into_string()
                .map_err(|n| CliError::Other(format!("non UTF-8 file name: {:?}", n)))?;
            let metadata = entry.metadata().await?;
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            if metadata.is_dir() {
                let id = import_dir(ctx, &entry_path).await?;
                entries.push(Dirent::dir(name, id, mtime));
            } else if metadata.is_file() {
                let (id, size) = import_file(ctx, &entry_path).await?;
                entries.push(Dirent::file(name, id, size, mtime, &ctx.config.identity.name));
            } else {
                warn!(path = %entry_path.display(), "skipping special file");
            }
        }

        let dir = Dir::new(ctx.version(), entries)?;
        let id = ctx.repo.put_dir(ctx.store_id(), ctx.version(), &dir).await?;
        debug!(path = %path.display(), id = %id, "imported directory");
        Ok(id)
    })
}

/// Store the metadata object of one file. Content is addressed by a single
/// block holding the whole file.
async fn import_file(ctx: &CommandContext, path: &Path) -> Result<(ObjectId, u64)> {
    let data = tokio::fs::read(path).await?;
    let block_id = hex::encode(Sha256::digest(&data));
    let size = data.len() as u64;

    let meta = FileMeta::new(ctx.version(), size, vec![block_id]);
    let id = ctx.repo.put_file_meta(ctx.store_id(), &meta).await?;
    Ok((id, size))
}
