//! Tree diff and change descriptions.

mod describe;
mod tree_diff;

pub use describe::describe_changes;
pub use tree_diff::{DiffEntry, DiffStatus, diff_merge_roots, diff_trees};
