//! A tree is an ordered listing of named entries (blobs, sub-trees, or
//! symlinks), each tagged with a Unix file mode and pointing at a child
//! fingerprint. Entries are stored sorted by name, with sub-trees sorted as
//! if their name carried a trailing `/` — so `"foo"` (a file) sorts before
//! `"foo.c"`, but `"foo"` (a directory) sorts after it.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::GitError;
use crate::hash::Fingerprint;
use crate::internal::object::ObjectTrait;
use crate::internal::object::types::ObjectType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    Regular = 0o100644,
    Executable = 0o100755,
    Symlink = 0o120000,
    Directory = 0o040000,
}

impl FileMode {
    pub fn from_u32(mode: u32) -> Result<Self, GitError> {
        match mode {
            0o100644 => Ok(FileMode::Regular),
            0o100755 => Ok(FileMode::Executable),
            0o120000 => Ok(FileMode::Symlink),
            0o040000 => Ok(FileMode::Directory),
            _ => Err(GitError::Malformed(format!("invalid tree entry mode {mode:o}"))),
        }
    }

    /// Octal mode string as it appears in the tree's on-disk encoding
    /// (directories are written without the leading `100`/`120` family
    /// digit's width, matching Git's `"40000"` for trees).
    pub fn to_octal_str(self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Directory => "40000",
        }
    }

    pub fn is_tree(self) -> bool {
        matches!(self, FileMode::Directory)
    }

    /// Sort key for Git's tree ordering: directory names compare as if
    /// suffixed with `/`.
    fn sort_suffix(self) -> &'static str {
        if self.is_tree() { "/" } else { "" }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: String,
    pub id: Fingerprint,
}

impl TreeEntry {
    pub fn new(mode: FileMode, name: String, id: Fingerprint) -> Self {
        Self { mode, name, id }
    }

    fn sort_key(&self) -> String {
        format!("{}{}", self.name, self.mode.sort_suffix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub id: Fingerprint,
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build from an unordered entry list, sorting into tree order and
    /// computing the fingerprint.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Tree {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let mut tree = Tree {
            id: Fingerprint::NULL,
            entries,
        };
        tree.id = Fingerprint::of_object(ObjectType::Tree, &tree.to_data().unwrap());
        tree
    }

    pub fn find_entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{:o} {} {}\t{}",
                entry.mode as u32 & 0o777 | if entry.mode.is_tree() { 0o40000 } else { 0o100000 },
                if entry.mode.is_tree() { "tree" } else { "blob" },
                entry.id,
                entry.name
            )?;
        }
        Ok(())
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: Fingerprint) -> Result<Self, GitError> {
        let mut entries = Vec::new();
        let mut cursor = data;
        while !cursor.is_empty() {
            let space = cursor
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| GitError::Malformed("tree entry missing mode separator".to_string()))?;
            let mode_str = std::str::from_utf8(&cursor[..space])
                .map_err(|e| GitError::Malformed(e.to_string()))?;
            let mode_num = u32::from_str_radix(mode_str, 8)
                .map_err(|_| GitError::Malformed(format!("invalid octal mode `{mode_str}`")))?;
            let mode = FileMode::from_u32(if mode_num == 0o40000 { 0o040000 } else { mode_num })?;

            let rest = &cursor[space + 1..];
            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| GitError::Malformed("tree entry missing name terminator".to_string()))?;
            let name = String::from_utf8(rest[..nul].to_vec())
                .map_err(|e| GitError::Malformed(e.to_string()))?;

            let after_name = &rest[nul + 1..];
            if after_name.len() < 20 {
                return Err(GitError::Malformed("truncated tree entry fingerprint".to_string()));
            }
            let id = Fingerprint::from_bytes(&after_name[..20]).map_err(GitError::Malformed)?;
            entries.push(TreeEntry { mode, name, id });
            cursor = &after_name[20..];
        }
        Ok(Tree { id: hash, entries })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();
        for entry in &self.entries {
            data.extend(entry.mode.to_octal_str().as_bytes());
            data.push(b' ');
            data.extend(entry.name.as_bytes());
            data.push(0);
            data.extend(entry.id.as_bytes());
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S2: the empty tree has a fixed, well-known fingerprint.
    #[test]
    fn empty_tree_fingerprint() {
        let tree = Tree::from_entries(vec![]);
        assert_eq!(tree.id.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn directories_sort_after_same_prefixed_files() {
        let blob_id = Fingerprint::of_bytes(b"blob");
        let tree_id = Fingerprint::of_bytes(b"subtree");
        let tree = Tree::from_entries(vec![
            TreeEntry::new(FileMode::Directory, "foo".to_string(), tree_id),
            TreeEntry::new(FileMode::Regular, "foo.c".to_string(), blob_id),
        ]);
        assert_eq!(tree.entries[0].name, "foo.c");
        assert_eq!(tree.entries[1].name, "foo");
    }

    #[test]
    fn roundtrips_through_to_data() {
        let id = Fingerprint::of_bytes(b"x");
        let tree = Tree::from_entries(vec![TreeEntry::new(FileMode::Regular, "a.txt".to_string(), id)]);
        let reparsed = Tree::from_bytes(&tree.to_data().unwrap(), tree.id).unwrap();
        assert_eq!(reparsed.entries, tree.entries);
    }
}
