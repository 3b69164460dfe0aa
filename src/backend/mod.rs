mod fs_backend;
mod memory_backend;
mod repo_backend;

pub use fs_backend::FsBackend;
pub use memory_backend::MemoryBackend;
pub use repo_backend::{BackendError, ObjectId, RepoBackend, Result, SwapResult};
