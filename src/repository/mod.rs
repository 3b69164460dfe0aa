//! Object model of a treesync store.

mod repo_objects;

pub use repo_objects::{
    CURRENT_VERSION, Commit, DEFAULT_FILE_PERMS, DIR_OBJECT_TYPE, Dir, Dirent, EMPTY_DIR_ID,
    FILE_OBJECT_TYPE, FileMeta, ObjectError, ObjectId, ObjectResult, S_IFDIR, S_IFMT, S_IFREG,
    compute_object_id, from_json, is_directory, is_regular, to_canonical_json,
};
