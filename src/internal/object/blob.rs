//! A blob is opaque file content: no structure, no metadata, just bytes.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::GitError;
use crate::hash::Fingerprint;
use crate::internal::object::ObjectTrait;
use crate::internal::object::types::ObjectType;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: Fingerprint,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn from_content(content: &[u8]) -> Blob {
        let id = Fingerprint::of_object(ObjectType::Blob, content);
        Blob {
            id,
            data: content.to_vec(),
        }
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "blob {} ({} bytes)", self.id, self.data.len())
    }
}

impl ObjectTrait for Blob {
    fn from_bytes(data: &[u8], hash: Fingerprint) -> Result<Self, GitError> {
        Ok(Blob {
            id: hash,
            data: data.to_vec(),
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn get_size(&self) -> usize {
        self.data.len()
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S1: blob "hello\n" must reproduce the reference fingerprint.
    #[test]
    fn blob_fingerprint_matches_reference() {
        let blob = Blob::from_content(b"hello\n");
        assert_eq!(blob.id.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn roundtrips_through_to_data() {
        let blob = Blob::from_content(b"some content");
        let reparsed = Blob::from_bytes(&blob.to_data().unwrap(), blob.id).unwrap();
        assert_eq!(reparsed, blob);
    }
}
