//! A commit records the state of the tree at a point in history: the tree
//! fingerprint, zero or more parents, an author and committer identity, and
//! a free-form message.

use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::errors::GitError;
use crate::hash::Fingerprint;
use crate::internal::object::ObjectTrait;
use crate::internal::object::signature::{Signature, SignatureType};
use crate::internal::object::types::ObjectType;

#[derive(Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: Fingerprint,
    pub tree_id: Fingerprint,
    pub parent_commit_ids: Vec<Fingerprint>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "tree: {}", self.tree_id)?;
        for parent in &self.parent_commit_ids {
            writeln!(f, "parent: {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f, "{}", self.message)
    }
}

impl Commit {
    /// Build a commit and compute its fingerprint from the serialized form.
    pub fn new(
        author: Signature,
        committer: Signature,
        tree_id: Fingerprint,
        parent_commit_ids: Vec<Fingerprint>,
        message: &str,
    ) -> Commit {
        let mut commit = Commit {
            id: Fingerprint::NULL,
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message: message.to_string(),
        };
        commit.id = Fingerprint::of_object(ObjectType::Commit, &commit.to_data().unwrap());
        commit
    }

    /// Every commit reachable by walking a single `parent` pointer chain
    /// from this one is a first-parent ancestor; zero parents marks a root.
    pub fn is_root(&self) -> bool {
        self.parent_commit_ids.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_commit_ids.len() > 1
    }

    /// First non-empty line of the message, skipping a trailing PGP
    /// signature block if present.
    pub fn format_message(&self) -> String {
        if let Some(pos) = self
            .message
            .lines()
            .position(|line| line.contains("-----END PGP SIGNATURE-----"))
        {
            return self
                .message
                .lines()
                .skip(pos + 1)
                .find(|line| !line.trim().is_empty())
                .map(|line| line.to_owned())
                .unwrap_or_else(|| self.message.clone());
        }

        self.message
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.to_owned())
            .unwrap_or_else(|| self.message.clone())
    }
}

impl ObjectTrait for Commit {
    fn from_bytes(data: &[u8], hash: Fingerprint) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let mut commit = data;

        let tree_end = commit
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("commit has no tree line".to_string()))?;
        let tree_id = Fingerprint::from_str(
            std::str::from_utf8(&commit[5..tree_end])
                .map_err(|e| GitError::Malformed(e.to_string()))?,
        )
        .map_err(GitError::Malformed)?;
        let binding = commit[tree_end + 1..].to_vec();
        commit = &binding;

        let author_begin = commit
            .find("author")
            .ok_or_else(|| GitError::Malformed("commit has no author line".to_string()))?;
        let parent_commit_ids: Result<Vec<Fingerprint>, GitError> = commit[..author_begin]
            .find_iter("parent")
            .map(|parent| {
                let parent_end = commit[parent..]
                    .find_byte(b'\n')
                    .ok_or_else(|| GitError::Malformed("truncated parent line".to_string()))?
                    + parent;
                Fingerprint::from_str(
                    std::str::from_utf8(&commit[parent + 7..parent_end])
                        .map_err(|e| GitError::Malformed(e.to_string()))?,
                )
                .map_err(GitError::Malformed)
            })
            .collect();
        let parent_commit_ids = parent_commit_ids?;
        let binding = commit[author_begin..].to_vec();
        commit = &binding;

        let author_end = commit
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("commit has no committer line".to_string()))?;
        let author = Signature::from_data(commit[..author_end].to_vec())?;

        let binding = commit[author_end + 1..].to_vec();
        commit = &binding;
        let committer_end = commit
            .find_byte(b'\n')
            .ok_or_else(|| GitError::Malformed("commit has no message".to_string()))?;
        let committer = Signature::from_data(commit[..committer_end].to_vec())?;

        let message = String::from_utf8_lossy(&commit[committer_end + 1..]).into_owned();

        Ok(Commit {
            id: hash,
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();

        data.extend(b"tree ");
        data.extend(self.tree_id.to_hex().as_bytes());
        data.push(b'\n');

        for parent_id in &self.parent_commit_ids {
            data.extend(b"parent ");
            data.extend(parent_id.to_hex().as_bytes());
            data.push(b'\n');
        }

        data.extend(self.author.to_data()?);
        data.push(b'\n');
        data.extend(self.committer.to_data()?);
        data.push(b'\n');
        data.extend(self.message.as_bytes());

        Ok(data)
    }
}
