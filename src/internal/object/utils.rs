//! Dispatch helpers that let code working with a type-erased object
//! (e.g. the loose/pack store) parse and re-serialize without matching on
//! [`ObjectType`] at every call site.

use crate::errors::GitError;
use crate::hash::Fingerprint;
use crate::internal::object::ObjectTrait;
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::tag::Tag;
use crate::internal::object::tree::Tree;
use crate::internal::object::types::ObjectType;

/// A parsed object of any of the four base kinds.
#[derive(Debug, Clone)]
pub enum GitObject {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl GitObject {
    pub fn object_type(&self) -> ObjectType {
        match self {
            GitObject::Blob(_) => ObjectType::Blob,
            GitObject::Tree(_) => ObjectType::Tree,
            GitObject::Commit(_) => ObjectType::Commit,
            GitObject::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn id(&self) -> Fingerprint {
        match self {
            GitObject::Blob(b) => b.id,
            GitObject::Tree(t) => t.id,
            GitObject::Commit(c) => c.id,
            GitObject::Tag(t) => t.id,
        }
    }

    pub fn to_data(&self) -> Result<Vec<u8>, GitError> {
        match self {
            GitObject::Blob(b) => b.to_data(),
            GitObject::Tree(t) => t.to_data(),
            GitObject::Commit(c) => c.to_data(),
            GitObject::Tag(t) => t.to_data(),
        }
    }

    pub fn as_commit(&self) -> Result<&Commit, GitError> {
        match self {
            GitObject::Commit(c) => Ok(c),
            other => Err(GitError::TypeMismatch {
                expected: "commit",
                found: other.object_type().to_bytes_str(),
            }),
        }
    }

    pub fn as_tree(&self) -> Result<&Tree, GitError> {
        match self {
            GitObject::Tree(t) => Ok(t),
            other => Err(GitError::TypeMismatch {
                expected: "tree",
                found: other.object_type().to_bytes_str(),
            }),
        }
    }

    pub fn as_blob(&self) -> Result<&Blob, GitError> {
        match self {
            GitObject::Blob(b) => Ok(b),
            other => Err(GitError::TypeMismatch {
                expected: "blob",
                found: other.object_type().to_bytes_str(),
            }),
        }
    }
}

/// Parse a base object's payload given its type and fingerprint.
pub fn parse_object(kind: ObjectType, data: &[u8], hash: Fingerprint) -> Result<GitObject, GitError> {
    match kind {
        ObjectType::Blob => Blob::from_bytes(data, hash).map(GitObject::Blob),
        ObjectType::Tree => Tree::from_bytes(data, hash).map(GitObject::Tree),
        ObjectType::Commit => Commit::from_bytes(data, hash).map(GitObject::Commit),
        ObjectType::Tag => Tag::from_bytes(data, hash).map(GitObject::Tag),
        ObjectType::OffsetDelta | ObjectType::HashDelta => Err(GitError::TypeMismatch {
            expected: "base object",
            found: "delta",
        }),
    }
}

impl ObjectType {
    fn to_bytes_str(self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Tree => "tree",
            ObjectType::Commit => "commit",
            ObjectType::Tag => "tag",
            ObjectType::OffsetDelta => "ofs-delta",
            ObjectType::HashDelta => "ref-delta",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_dispatches() {
        let blob = Blob::from_content(b"hi");
        let obj = parse_object(ObjectType::Blob, &blob.data, blob.id).unwrap();
        assert_eq!(obj.object_type(), ObjectType::Blob);
        assert_eq!(obj.as_blob().unwrap().data, b"hi");
        assert!(obj.as_tree().is_err());
    }
}
