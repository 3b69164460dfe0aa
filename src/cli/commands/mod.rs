//! Subcommand implementations.

pub mod commit;
pub mod diff;
pub mod import;
pub mod ls;
pub mod merge;
