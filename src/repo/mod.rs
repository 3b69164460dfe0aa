//! Typed object store over a backend and cache.
//!
//! This module provides the [`Repo`] struct which wraps a backend and cache
//! and implements the [`ObjectStore`] contract the merge engine consumes.

#[allow(clippy::module_inception)]
mod repo;

pub use repo::{ObjectStore, Repo, RepoError, Result};
