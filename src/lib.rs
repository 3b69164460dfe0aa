//! treesync-rs - content-addressed directory trees with two- and three-way merge.

pub mod backend;
pub mod caches;
pub mod cli;
pub mod config;
pub mod diff;
pub mod merge;
pub mod repo;
pub mod repository;

pub use merge::{MergeDriver, MergeEngine, MergeError, MergeOptions};
pub use repo::{ObjectStore, Repo, RepoError};
