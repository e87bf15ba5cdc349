//! Object model definitions for blobs, trees, commits, and tags, plus the
//! [`ObjectTrait`] that lets the pack and loose-object layers build
//! strongly typed values out of raw bytes without knowing which concrete
//! type they're parsing.

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;
pub mod utils;

use std::{
    fmt::Display,
    io::{BufRead, Read},
};

use crate::{
    errors::GitError,
    hash::Fingerprint,
    internal::{object::types::ObjectType, zlib::stream::inflate::ReadBoxed},
};

/// Common interface for the four base object kinds (blob, tree, commit,
/// tag). A store hands callers a value behind this trait once it has been
/// parsed from its framed byte representation.
pub trait ObjectTrait: Send + Sync + Display {
    /// Parse from an object's payload bytes (post framing-header, i.e. the
    /// bytes that follow `"<type> <len>\0"`). `hash` is the fingerprint the
    /// caller already computed or looked up for this object.
    fn from_bytes(data: &[u8], hash: Fingerprint) -> Result<Self, GitError>
    where
        Self: Sized;

    /// Build directly from an inflating, hash-tracking reader. `size` is
    /// only used to preallocate the content buffer.
    fn from_buf_read<R: BufRead>(read: &mut ReadBoxed<R>, size: usize) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let mut content: Vec<u8> = Vec::with_capacity(size);
        read.read_to_end(&mut content)
            .map_err(|e| GitError::Io(e))?;
        let digest = read.hash.clone().finalize();
        let hash = Fingerprint::from_bytes(&digest)
            .map_err(|e| GitError::Corrupt(format!("bad fingerprint length: {e}")))?;
        Self::from_bytes(&content, hash)
    }

    /// The object's type tag.
    fn get_type(&self) -> ObjectType;

    /// Size of the serialized payload in bytes.
    fn get_size(&self) -> usize;

    /// Serialize to the object's payload bytes (without the framing header).
    fn to_data(&self) -> Result<Vec<u8>, GitError>;

    /// Fingerprint of this object, computed over its framed payload.
    ///
    /// The default implementation serializes and hashes fresh each call;
    /// override only when a cached hash is already known to be correct.
    fn object_hash(&self) -> Result<Fingerprint, GitError> {
        let data = self.to_data()?;
        Ok(Fingerprint::of_object(self.get_type(), &data))
    }
}
