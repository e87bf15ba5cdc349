//! An annotated tag: a named, dated pointer at another object, carrying a
//! message (and optionally a PGP signature embedded in that message, same
//! convention as commits).

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::errors::GitError;
use crate::hash::Fingerprint;
use crate::internal::object::ObjectTrait;
use crate::internal::object::signature::Signature;
use crate::internal::object::types::ObjectType;

#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Fingerprint,
    pub object_id: Fingerprint,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Signature,
    pub message: String,
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "object {}", self.object_id)?;
        writeln!(f, "type {}", self.object_type)?;
        writeln!(f, "tag {}", self.tag_name)?;
        writeln!(f, "tagger {}", self.tagger)?;
        writeln!(f, "{}", self.message)
    }
}

impl Tag {
    pub fn new(
        object_id: Fingerprint,
        object_type: ObjectType,
        tag_name: String,
        tagger: Signature,
        message: &str,
    ) -> Tag {
        let mut tag = Tag {
            id: Fingerprint::NULL,
            object_id,
            object_type,
            tag_name,
            tagger,
            message: message.to_string(),
        };
        tag.id = Fingerprint::of_object(ObjectType::Tag, &tag.to_data().unwrap());
        tag
    }
}

impl ObjectTrait for Tag {
    fn from_bytes(data: &[u8], hash: Fingerprint) -> Result<Self, GitError> {
        let mut cursor = data;

        let object_end = cursor
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("tag has no object line".to_string()))?;
        let object_id = Fingerprint::from_str(
            std::str::from_utf8(&cursor[7..object_end]).map_err(|e| GitError::Malformed(e.to_string()))?,
        )
        .map_err(GitError::Malformed)?;
        let binding = cursor[object_end + 1..].to_vec();
        cursor = &binding;

        let type_end = cursor
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("tag has no type line".to_string()))?;
        let object_type = ObjectType::from_string(
            std::str::from_utf8(&cursor[5..type_end]).map_err(|e| GitError::Malformed(e.to_string()))?,
        )?;
        let binding = cursor[type_end + 1..].to_vec();
        cursor = &binding;

        let tag_end = cursor
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("tag has no tag-name line".to_string()))?;
        let tag_name = String::from_utf8(cursor[4..tag_end].to_vec())
            .map_err(|e| GitError::Malformed(e.to_string()))?;
        let binding = cursor[tag_end + 1..].to_vec();
        cursor = &binding;

        let tagger_end = cursor
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("tag has no tagger line".to_string()))?;
        let tagger = Signature::from_data(cursor[..tagger_end].to_vec())?;

        let message = String::from_utf8_lossy(&cursor[tagger_end + 1..]).into_owned();

        Ok(Tag {
            id: hash,
            object_id,
            object_type,
            tag_name,
            tagger,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        data.extend(b"object ");
        data.extend(self.object_id.to_hex().as_bytes());
        data.push(b'\n');
        data.extend(b"type ");
        data.extend(self.object_type.to_bytes());
        data.push(b'\n');
        data.extend(b"tag ");
        data.extend(self.tag_name.as_bytes());
        data.push(b'\n');
        data.extend(self.tagger.to_data()?);
        data.push(b'\n');
        data.extend(self.message.as_bytes());
        Ok(data)
    }
}
