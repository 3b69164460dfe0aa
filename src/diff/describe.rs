//! Human-readable summaries of tree diffs, used as merge commit messages.

use super::tree_diff::{DiffEntry, DiffStatus};

/// Summarize `entries` in a few lines, one per kind of change.
///
/// ```text
/// Added "a.txt" and 2 more files.
/// Deleted "b.txt".
/// Added directory "d".
/// ```
pub fn describe_changes(entries: &[DiffEntry]) -> String {
    let kinds = [
        (DiffStatus::Added, "Added", "files"),
        (DiffStatus::Deleted, "Deleted", "files"),
        (DiffStatus::Modified, "Modified", "files"),
        (DiffStatus::DirAdded, "Added directory", "directories"),
        (DiffStatus::DirDeleted, "Removed directory", "directories"),
    ];

    let mut lines = Vec::new();
    for (status, verb, noun) in kinds {
        let mut matching = entries.iter().filter(|e| e.status == status);
        let Some(first) = matching.next() else {
            continue;
        };
        let more = matching.count();
        let name = base_name(&first.path);

        if more == 0 {
            lines.push(format!("{} \"{}\".", verb, name));
        } else {
            lines.push(format!("{} \"{}\" and {} more {}.", verb, name, more, noun));
        }
    }

    lines.join("\n")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
