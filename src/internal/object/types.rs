//! The object type enumeration shared by the object store, pack reader, and
//! delta codec.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// Every object this crate stores has one of these types. `OffsetDelta` and
/// `HashDelta` are pack-only representations: a store never hands callers a
/// delta object directly, only the reconstructed base.
///
/// * `Commit` (1): a point in history — a tree plus parents, author and
///   committer identities, and a message.
/// * `Tree` (2): an ordered directory listing (name, mode, child fingerprint).
/// * `Blob` (3): file content, opaque bytes.
/// * `Tag` (4): an annotated, signed-or-not reference to another object.
/// * `OffsetDelta` (6): a delta keyed by a negative byte offset to its base,
///   valid only within the pack that contains it.
/// * `HashDelta` (7): a delta keyed by its base's fingerprint.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Commit = 1,
    Tree,
    Blob,
    Tag,
    OffsetDelta = 6,
    HashDelta,
}

const COMMIT_OBJECT_TYPE: &[u8] = b"commit";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const BLOB_OBJECT_TYPE: &[u8] = b"blob";
const TAG_OBJECT_TYPE: &[u8] = b"tag";

impl Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Commit => write!(f, "commit"),
            ObjectType::Tag => write!(f, "tag"),
            ObjectType::OffsetDelta => write!(f, "ofs-delta"),
            ObjectType::HashDelta => write!(f, "ref-delta"),
        }
    }
}

impl ObjectType {
    /// Convert object type to the 3-bit pack header type id.
    pub fn to_pack_type_u8(&self) -> Result<u8, GitError> {
        match self {
            ObjectType::Commit => Ok(1),
            ObjectType::Tree => Ok(2),
            ObjectType::Blob => Ok(3),
            ObjectType::Tag => Ok(4),
            ObjectType::OffsetDelta => Ok(6),
            ObjectType::HashDelta => Ok(7),
        }
    }

    /// Decode a 3-bit pack header type id to an object type.
    pub fn from_pack_type_u8(number: u8) -> Result<ObjectType, GitError> {
        match number {
            1 => Ok(ObjectType::Commit),
            2 => Ok(ObjectType::Tree),
            3 => Ok(ObjectType::Blob),
            4 => Ok(ObjectType::Tag),
            6 => Ok(ObjectType::OffsetDelta),
            7 => Ok(ObjectType::HashDelta),
            _ => Err(GitError::Malformed(format!(
                "invalid pack object type number: {number}"
            ))),
        }
    }

    pub fn to_bytes(&self) -> &'static [u8] {
        match self {
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Blob => BLOB_OBJECT_TYPE,
            ObjectType::Tag => TAG_OBJECT_TYPE,
            ObjectType::OffsetDelta | ObjectType::HashDelta => {
                panic!("delta objects have no framing type name")
            }
        }
    }

    /// Parse the lowercase type name used in object framing headers.
    pub fn from_string(s: &str) -> Result<ObjectType, GitError> {
        match s {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            "tag" => Ok(ObjectType::Tag),
            _ => Err(GitError::Malformed(format!("unknown object type `{s}`"))),
        }
    }

    /// The lowercase type name as owned bytes, as used in the
    /// `"<type> <len>\0"` framing header.
    pub fn to_data(self) -> Result<Vec<u8>, GitError> {
        match self {
            ObjectType::Commit | ObjectType::Tree | ObjectType::Blob | ObjectType::Tag => {
                Ok(self.to_bytes().to_vec())
            }
            ObjectType::OffsetDelta | ObjectType::HashDelta => Err(GitError::TypeMismatch {
                expected: "base object",
                found: "delta",
            }),
        }
    }

    pub fn to_u8(&self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
            ObjectType::OffsetDelta => 6,
            ObjectType::HashDelta => 7,
        }
    }

    pub fn from_u8(number: u8) -> Result<ObjectType, GitError> {
        Self::from_pack_type_u8(number)
    }

    /// `true` for the four object kinds an object store persists directly;
    /// `false` for the two in-pack-only delta representations.
    pub fn is_base(&self) -> bool {
        !matches!(self, ObjectType::OffsetDelta | ObjectType::HashDelta)
    }
}
