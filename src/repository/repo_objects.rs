//! Repository object types for treesync storage.
//!
//! This module defines the objects stored in a treesync object store:
//! directory snapshots ([`Dir`] made of [`Dirent`]s), file metadata
//! ([`FileMeta`]) and [`Commit`]s. All objects are serialized as canonical
//! JSON (RFC 8785) and identified by the SHA-256 of that serialization.
//! Directory and file objects are zlib-compressed at rest; commits are not.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Object ID is a sha-256 hash represented as a lowercase hexadecimal string.
pub type ObjectId = String;

// =============================================================================
// Constants
// =============================================================================

/// Reserved id of the empty directory. Never written to a store.
pub const EMPTY_DIR_ID: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Mask selecting the file type bits of a mode.
pub const S_IFMT: u32 = 0o170000;
/// File type bits of a regular file.
pub const S_IFREG: u32 = 0o100000;
/// File type bits of a directory.
pub const S_IFDIR: u32 = 0o040000;

/// Permission bits every regular file carries at minimum.
pub const DEFAULT_FILE_PERMS: u32 = 0o644;

/// Object type tag of a file object.
pub const FILE_OBJECT_TYPE: u32 = 1;
/// Object type tag of a directory object.
pub const DIR_OBJECT_TYPE: u32 = 3;

/// Current object format version.
pub const CURRENT_VERSION: u32 = 1;

/// Returns true if `mode` describes a regular file.
pub fn is_regular(mode: u32) -> bool {
    mode & S_IFMT == S_IFREG
}

/// Returns true if `mode` describes a directory.
pub fn is_directory(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}

// =============================================================================
// Error Types
// =============================================================================

/// Error type for object encoding and decoding.
#[derive(Debug)]
pub enum ObjectError {
    /// Serialization error.
    Serialize(serde_json::Error),
    /// Deserialization error.
    Deserialize(serde_json::Error),
    /// Compression or decompression failed.
    Compression(std::io::Error),
    /// The object decoded but violates an object invariant.
    Corrupt { id: ObjectId, reason: String },
    /// Two entries of one directory share a name.
    DuplicateName(String),
}

impl std::fmt::Display for ObjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectError::Serialize(e) => write!(f, "JSON serialization error: {}", e),
            ObjectError::Deserialize(e) => write!(f, "JSON deserialization error: {}", e),
            ObjectError::Compression(e) => write!(f, "compression error: {}", e),
            ObjectError::Corrupt { id, reason } => write!(f, "corrupt object {}: {}", id, reason),
            ObjectError::DuplicateName(name) => {
                write!(f, "duplicate directory entry name '{}'", name)
            }
        }
    }
}

impl std::error::Error for ObjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ObjectError::Serialize(e) | ObjectError::Deserialize(e) => Some(e),
            ObjectError::Compression(e) => Some(e),
            ObjectError::Corrupt { .. } | ObjectError::DuplicateName(_) => None,
        }
    }
}

/// Result type for object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

// =============================================================================
// Dirent
// =============================================================================

/// One named entry of a directory snapshot.
///
/// Only `id` and the type bits of `mode` take part in merge decisions;
/// `mtime`, `size` and `modifier` are carried along unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirent {
    /// Object ID of the file object or directory object.
    pub id: ObjectId,
    /// POSIX-style type and permission bits.
    pub mode: u32,
    /// Name of the entry, unique within its directory.
    pub name: String,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: i64,
    /// Last modifier of the file. Files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    /// Size of the file in bytes. Files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Dirent {
    /// Create a regular file entry.
    pub fn file(
        name: impl Into<String>,
        id: impl Into<ObjectId>,
        size: u64,
        mtime: i64,
        modifier: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            mode: S_IFREG | DEFAULT_FILE_PERMS,
            name: name.into(),
            mtime,
            modifier: Some(modifier.into()),
            size: Some(size),
        }
    }

    /// Create a directory entry.
    pub fn dir(name: impl Into<String>, id: impl Into<ObjectId>, mtime: i64) -> Self {
        Self {
            id: id.into(),
            mode: S_IFDIR,
            name: name.into(),
            mtime,
            modifier: None,
            size: None,
        }
    }

    /// Returns true if this entry is a regular file.
    pub fn is_file(&self) -> bool {
        is_regular(self.mode)
    }

    /// Returns true if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        is_directory(self.mode)
    }

    /// Copy of this entry under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy of this entry pointing at a different object.
    pub fn with_id(&self, id: impl Into<ObjectId>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }
}

// =============================================================================
// Dir
// =============================================================================

/// An immutable, content-addressed directory snapshot.
///
/// Entries are kept in strict descending order by name with no duplicates.
/// `dir_id` is the SHA-256 of the canonical JSON of the entry list, or
/// [`EMPTY_DIR_ID`] when there are no entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dir {
    /// Object ID of this directory.
    pub dir_id: ObjectId,
    /// Object format version.
    pub version: u32,
    /// Entries in descending name order.
    pub entries: Vec<Dirent>,
}

/// Serialized form of a directory.
#[derive(Serialize)]
struct DirObjectRef<'a> {
    #[serde(rename = "type")]
    type_tag: u32,
    version: u32,
    dirents: &'a [Dirent],
}

#[derive(Deserialize)]
struct DirObject {
    #[serde(rename = "type")]
    type_tag: u32,
    version: u32,
    dirents: Vec<Dirent>,
}

impl Dir {
    /// Build a directory from entries in any order.
    ///
    /// Entries are sorted into descending name order and the id is computed.
    /// Returns [`ObjectError::DuplicateName`] if two entries share a name.
    pub fn new(version: u32, mut entries: Vec<Dirent>) -> ObjectResult<Self> {
        entries.sort_by(|a, b| b.name.cmp(&a.name));
        if let Some(pair) = entries.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(ObjectError::DuplicateName(pair[0].name.clone()));
        }

        let dir_id = if entries.is_empty() {
            EMPTY_DIR_ID.to_string()
        } else {
            compute_object_id(&dir_json(version, &entries)?)
        };

        Ok(Self {
            dir_id,
            version,
            entries,
        })
    }

    /// The empty directory.
    pub fn empty(version: u32) -> Self {
        Self {
            dir_id: EMPTY_DIR_ID.to_string(),
            version,
            entries: Vec::new(),
        }
    }

    /// Returns true if the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name.
    pub fn find(&self, name: &str) -> Option<&Dirent> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Canonical JSON of this directory, the bytes its id is computed from.
    pub fn to_json(&self) -> ObjectResult<Vec<u8>> {
        dir_json(self.version, &self.entries)
    }

    /// Encode to the at-rest (compressed) representation.
    pub fn encode(&self) -> ObjectResult<Vec<u8>> {
        compress(&self.to_json()?)
    }

    /// Decode a directory read from the store under `dir_id`.
    pub fn decode(dir_id: &str, data: &[u8]) -> ObjectResult<Self> {
        let json = decompress(data)?;
        let obj: DirObject = from_json(&json)?;

        if obj.type_tag != DIR_OBJECT_TYPE {
            return Err(ObjectError::Corrupt {
                id: dir_id.to_string(),
                reason: format!("not a directory (type {})", obj.type_tag),
            });
        }
        if obj.version < 1 {
            return Err(ObjectError::Corrupt {
                id: dir_id.to_string(),
                reason: format!("directory version should be > 0, is {}", obj.version),
            });
        }
        if obj.dirents.windows(2).any(|w| w[0].name <= w[1].name) {
            return Err(ObjectError::Corrupt {
                id: dir_id.to_string(),
                reason: "entries not in strict descending name order".to_string(),
            });
        }

        Ok(Self {
            dir_id: dir_id.to_string(),
            version: obj.version,
            entries: obj.dirents,
        })
    }
}

fn dir_json(version: u32, entries: &[Dirent]) -> ObjectResult<Vec<u8>> {
    to_canonical_json(&DirObjectRef {
        type_tag: DIR_OBJECT_TYPE,
        version,
        dirents: entries,
    })
}

// =============================================================================
// FileMeta
// =============================================================================

/// Metadata object of a file: its size and the ids of its content blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Type discriminator, always [`FILE_OBJECT_TYPE`].
    #[serde(rename = "type")]
    pub type_tag: u32,
    /// Object format version.
    pub version: u32,
    /// Total size of the file in bytes.
    pub size: u64,
    /// Ids of the content blocks, in order.
    pub block_ids: Vec<ObjectId>,
}

impl FileMeta {
    /// Create file metadata.
    pub fn new(version: u32, size: u64, block_ids: Vec<ObjectId>) -> Self {
        Self {
            type_tag: FILE_OBJECT_TYPE,
            version,
            size,
            block_ids,
        }
    }

    /// The object id of this file.
    pub fn id(&self) -> ObjectResult<ObjectId> {
        Ok(compute_object_id(&to_canonical_json(self)?))
    }

    /// Encode to the at-rest (compressed) representation.
    pub fn encode(&self) -> ObjectResult<Vec<u8>> {
        compress(&to_canonical_json(self)?)
    }

    /// Decode file metadata read from the store under `id`.
    pub fn decode(id: &str, data: &[u8]) -> ObjectResult<Self> {
        let meta: FileMeta = from_json(&decompress(data)?)?;
        if meta.type_tag != FILE_OBJECT_TYPE {
            return Err(ObjectError::Corrupt {
                id: id.to_string(),
                reason: format!("not a file (type {})", meta.type_tag),
            });
        }
        Ok(meta)
    }
}

// =============================================================================
// Commit
// =============================================================================

/// A commit: an immutable snapshot record pointing at a root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Repository this commit belongs to.
    pub repo_id: String,
    /// Object ID of the root directory.
    pub root_id: ObjectId,
    /// Display name of the creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    /// Identifier of the creator.
    pub creator: String,
    /// Commit message.
    pub description: String,
    /// Creation time in seconds since the Unix epoch.
    pub ctime: i64,
    /// First parent commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ObjectId>,
    /// Second parent commit, set on merge commits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_parent_id: Option<ObjectId>,
    /// Object format version.
    pub version: u32,
    /// Whether the merge producing this commit renamed conflicting entries.
    #[serde(default, skip_serializing_if = "is_false")]
    pub conflict: bool,
    /// Whether this commit was produced by a server-side merge.
    #[serde(default, skip_serializing_if = "is_false")]
    pub new_merge: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Commit {
    /// The object id of this commit.
    pub fn id(&self) -> ObjectResult<ObjectId> {
        Ok(compute_object_id(&to_canonical_json(self)?))
    }
}

// =============================================================================
// Encoding Helpers
// =============================================================================

/// Deserialize an object from JSON bytes.
pub fn from_json<T: for<'de> Deserialize<'de>>(json: &[u8]) -> ObjectResult<T> {
    serde_json::from_slice(json).map_err(ObjectError::Deserialize)
}

/// Serialize an object to canonical JSON (RFC 8785).
///
/// Canonical JSON has no whitespace and object keys sorted lexicographically,
/// so equal objects always produce equal bytes and therefore equal ids.
pub fn to_canonical_json<T: Serialize>(value: &T) -> ObjectResult<Vec<u8>> {
    serde_json_canonicalizer::to_vec(value).map_err(ObjectError::Serialize)
}

/// Compute the object ID (SHA-256 hash) for the given data.
pub fn compute_object_id(data: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn compress(data: &[u8]) -> ObjectResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(ObjectError::Compression)?;
    encoder.finish().map_err(ObjectError::Compression)
}

fn decompress(data: &[u8]) -> ObjectResult<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(ObjectError::Compression)?;
    Ok(out)
}
