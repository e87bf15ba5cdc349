//! Content-addressed object storage: loose objects written one-per-file
//! under `objects/<2 hex>/<38 hex>`, pack files searched by a sorted
//! in-memory index, and a composite that chains the two the way a real
//! repository does (loose objects win, because they're always the most
//! recent).

use std::{
    fs,
    io::{Read, Write},
    path::PathBuf,
};

use flate2::{Compression, read::ZlibDecoder, write::ZlibEncoder};

use crate::{
    errors::GitError,
    hash::Fingerprint,
    internal::{
        object::{
            ObjectTrait, blob::Blob, commit::Commit, tag::Tag, tree::Tree, types::ObjectType,
        },
        pack::{Pack, entry::Entry},
    },
    lockfile::LockFile,
};

/// Metadata about a stored object without materializing its full content,
/// mirroring `cat-file --batch-check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub hash: Fingerprint,
    pub kind: ObjectType,
    pub size: usize,
}

/// Uniform read/write surface over however objects happen to be stored.
pub trait ObjectStore {
    fn has(&self, hash: Fingerprint) -> bool;

    fn read(&self, hash: Fingerprint) -> Result<Entry, GitError>;

    /// Read and dereference one level of indirection: an annotated tag
    /// resolves to the object it points at; anything else returns itself.
    fn read_with_reference(&self, hash: Fingerprint) -> Result<Entry, GitError> {
        let entry = self.read(hash)?;
        if entry.obj_type != ObjectType::Tag {
            return Ok(entry);
        }
        let tag = Tag::from_bytes(&entry.data, entry.hash)?;
        self.read(tag.object_id)
    }

    fn write(&self, kind: ObjectType, data: &[u8]) -> Result<Fingerprint, GitError>;

    /// Stream a blob's content without requiring the caller to hold the
    /// whole thing in memory at once.
    fn stream_blob(&self, hash: Fingerprint, out: &mut dyn Write) -> Result<(), GitError> {
        let entry = self.read(hash)?;
        if entry.obj_type != ObjectType::Blob {
            return Err(GitError::TypeMismatch {
                expected: "blob",
                found: type_name(entry.obj_type),
            });
        }
        out.write_all(&entry.data).map_err(GitError::Io)
    }

    fn object_info(&self, hash: Fingerprint) -> Result<ObjectInfo, GitError> {
        let entry = self.read(hash)?;
        Ok(ObjectInfo {
            hash: entry.hash,
            kind: entry.obj_type,
            size: entry.data.len(),
        })
    }
}

/// `cat-file -p`: render an object's content the way each type prints
/// itself, rather than the framed bytes on disk. Blobs print their raw
/// content as text; commits and tags are already textual; trees print one
/// `ls-tree` line per entry via [`Tree`]'s `Display`.
pub fn pretty_print(entry: &Entry) -> Result<String, GitError> {
    match entry.obj_type {
        ObjectType::Blob => {
            Ok(String::from_utf8_lossy(&Blob::from_bytes(&entry.data, entry.hash)?.data).into_owned())
        }
        ObjectType::Tree => Ok(Tree::from_bytes(&entry.data, entry.hash)?.to_string()),
        ObjectType::Commit => Ok(Commit::from_bytes(&entry.data, entry.hash)?.to_string()),
        ObjectType::Tag => Ok(Tag::from_bytes(&entry.data, entry.hash)?.to_string()),
        ObjectType::OffsetDelta | ObjectType::HashDelta => Err(GitError::TypeMismatch {
            expected: "blob, tree, commit, or tag",
            found: type_name(entry.obj_type),
        }),
    }
}

fn type_name(kind: ObjectType) -> &'static str {
    match kind {
        ObjectType::Blob => "blob",
        ObjectType::Tree => "tree",
        ObjectType::Commit => "commit",
        ObjectType::Tag => "tag",
        ObjectType::OffsetDelta => "ofs-delta",
        ObjectType::HashDelta => "ref-delta",
    }
}

/// One object per file under `<object_dir>/<2 hex>/<38 hex>`, zlib-deflated
/// over the standard `"<type> <len>\0<payload>"` frame, written via a
/// lockfile so a reader never observes a half-written object.
pub struct LooseStore {
    pub object_dir: PathBuf,
}

impl LooseStore {
    pub fn new(object_dir: impl Into<PathBuf>) -> Self {
        Self {
            object_dir: object_dir.into(),
        }
    }

    fn path_for(&self, hash: Fingerprint) -> PathBuf {
        let hex = hash.to_hex();
        self.object_dir.join(&hex[..2]).join(&hex[2..])
    }
}

impl ObjectStore for LooseStore {
    fn has(&self, hash: Fingerprint) -> bool {
        self.path_for(hash).is_file()
    }

    fn read(&self, hash: Fingerprint) -> Result<Entry, GitError> {
        let path = self.path_for(hash);
        let file = fs::File::open(&path).map_err(|_| GitError::Missing(hash.to_hex()))?;
        let mut decoder = ZlibDecoder::new(file);
        let mut framed = Vec::new();
        decoder
            .read_to_end(&mut framed)
            .map_err(|e| GitError::Corrupt(format!("loose object {hash} failed to inflate: {e}")))?;

        let nul = framed
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GitError::Corrupt(format!("loose object {hash} missing frame terminator")))?;
        let header = std::str::from_utf8(&framed[..nul])
            .map_err(|e| GitError::Corrupt(format!("loose object {hash} header not utf-8: {e}")))?;
        let (kind_str, len_str) = header
            .split_once(' ')
            .ok_or_else(|| GitError::Corrupt(format!("loose object {hash} frame missing length")))?;
        let kind = ObjectType::from_string(kind_str)?;
        let declared_len: usize = len_str
            .parse()
            .map_err(|_| GitError::Corrupt(format!("loose object {hash} has non-numeric length")))?;

        let data = framed[nul + 1..].to_vec();
        if data.len() != declared_len {
            tracing::warn!(
                "loose object {hash} declared length {declared_len} but has {}",
                data.len()
            );
            return Err(GitError::Corrupt(format!(
                "loose object {hash} declared length {declared_len} but has {}",
                data.len()
            )));
        }

        Ok(Entry {
            obj_type: kind,
            data,
            hash,
            chain_len: 0,
        })
    }

    fn write(&self, kind: ObjectType, data: &[u8]) -> Result<Fingerprint, GitError> {
        let hash = Fingerprint::of_object(kind, data);
        let path = self.path_for(hash);
        if path.is_file() {
            return Ok(hash);
        }
        fs::create_dir_all(path.parent().expect("loose path always has a parent"))
            .map_err(GitError::Io)?;

        let mut framed = Vec::with_capacity(data.len() + 32);
        framed.extend_from_slice(kind.to_data()?.as_slice());
        framed.push(b' ');
        framed.extend_from_slice(data.len().to_string().as_bytes());
        framed.push(0);
        framed.extend_from_slice(data);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&framed).map_err(GitError::Io)?;
        let compressed = encoder.finish().map_err(GitError::Io)?;

        let mut lock = LockFile::acquire(&path)?;
        lock.write_all(&compressed)?;
        lock.commit()?;
        Ok(hash)
    }
}

/// Read-only view over a loaded pack, with a hash-sorted index for binary
/// search. Packs in this crate are rebuilt, not appended to, so there is no
/// `write`.
pub struct PackStore {
    pack: Pack,
    index: Vec<PackIndexEntry>,
}

#[derive(Debug, Clone, Copy)]
struct PackIndexEntry {
    hash: Fingerprint,
    entry_pos: usize,
}

impl PackStore {
    pub fn new(pack: Pack) -> Self {
        let mut index: Vec<PackIndexEntry> = pack
            .entries
            .iter()
            .enumerate()
            .map(|(entry_pos, e)| PackIndexEntry {
                hash: e.hash,
                entry_pos,
            })
            .collect();
        index.sort_by_key(|e| e.hash);
        Self { pack, index }
    }

    fn find(&self, hash: Fingerprint) -> Option<usize> {
        self.index
            .binary_search_by_key(&hash, |e| e.hash)
            .ok()
            .map(|i| self.index[i].entry_pos)
    }
}

impl ObjectStore for PackStore {
    fn has(&self, hash: Fingerprint) -> bool {
        self.find(hash).is_some()
    }

    fn read(&self, hash: Fingerprint) -> Result<Entry, GitError> {
        let pos = self.find(hash).ok_or_else(|| GitError::Missing(hash.to_hex()))?;
        Ok(self.pack.entries[pos].clone())
    }

    fn write(&self, _kind: ObjectType, _data: &[u8]) -> Result<Fingerprint, GitError> {
        Err(GitError::Invariant("pack stores are read-only".to_string()))
    }
}

/// Chains a loose store (checked first, since it always holds the newest
/// objects) with zero or more pack stores.
pub struct CompositeStore {
    pub loose: LooseStore,
    pub packs: Vec<PackStore>,
}

impl CompositeStore {
    pub fn new(loose: LooseStore) -> Self {
        Self {
            loose,
            packs: Vec::new(),
        }
    }

    pub fn add_pack(&mut self, pack: Pack) {
        self.packs.push(PackStore::new(pack));
    }
}

impl ObjectStore for CompositeStore {
    fn has(&self, hash: Fingerprint) -> bool {
        self.loose.has(hash) || self.packs.iter().any(|p| p.has(hash))
    }

    fn read(&self, hash: Fingerprint) -> Result<Entry, GitError> {
        if self.loose.has(hash) {
            return self.loose.read(hash);
        }
        for pack in &self.packs {
            if pack.has(hash) {
                return pack.read(hash);
            }
        }
        Err(GitError::Missing(hash.to_hex()))
    }

    fn write(&self, kind: ObjectType, data: &[u8]) -> Result<Fingerprint, GitError> {
        self.loose.write(kind, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_store_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::new(dir.path());
        let hash = store.write(ObjectType::Blob, b"hello\n").unwrap();
        assert!(store.has(hash));
        let entry = store.read(hash).unwrap();
        assert_eq!(entry.obj_type, ObjectType::Blob);
        assert_eq!(entry.data, b"hello\n");
    }

    #[test]
    fn loose_store_missing_object_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::new(dir.path());
        let err = store.read(Fingerprint::of_bytes(b"nope")).unwrap_err();
        assert!(matches!(err, GitError::Missing(_)));
    }

    #[test]
    fn pack_store_binary_search_finds_every_entry() {
        let entries = vec![
            Entry { obj_type: ObjectType::Blob, data: b"a".to_vec(), hash: Fingerprint::of_object(ObjectType::Blob, b"a"), chain_len: 0 },
            Entry { obj_type: ObjectType::Blob, data: b"bb".to_vec(), hash: Fingerprint::of_object(ObjectType::Blob, b"bb"), chain_len: 0 },
            Entry { obj_type: ObjectType::Blob, data: b"ccc".to_vec(), hash: Fingerprint::of_object(ObjectType::Blob, b"ccc"), chain_len: 0 },
        ];
        let mut buf = Vec::new();
        Pack::encode(&entries, &mut buf).unwrap();
        let pack = Pack::decode(std::io::Cursor::new(buf)).unwrap();
        let store = PackStore::new(pack);
        for e in &entries {
            assert!(store.has(e.hash));
            assert_eq!(store.read(e.hash).unwrap().data, e.data);
        }
        assert!(!store.has(Fingerprint::of_bytes(b"absent")));
    }

    #[test]
    fn composite_store_prefers_loose_over_pack() {
        let dir = tempfile::tempdir().unwrap();
        let loose = LooseStore::new(dir.path());
        let hash = loose.write(ObjectType::Blob, b"fresh\n").unwrap();

        let stale_entry = Entry {
            obj_type: ObjectType::Blob,
            data: b"stale\n".to_vec(),
            hash,
            chain_len: 0,
        };
        let mut buf = Vec::new();
        Pack::encode(&[stale_entry], &mut buf).unwrap();
        let pack = Pack::decode(std::io::Cursor::new(buf)).unwrap();

        let mut composite = CompositeStore::new(LooseStore::new(dir.path()));
        composite.add_pack(pack);

        assert_eq!(composite.read(hash).unwrap().data, b"fresh\n");
    }

    #[test]
    fn composite_store_falls_back_to_pack() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Entry {
            obj_type: ObjectType::Blob,
            data: b"packed\n".to_vec(),
            hash: Fingerprint::of_object(ObjectType::Blob, b"packed\n"),
            chain_len: 0,
        };
        let mut buf = Vec::new();
        Pack::encode(&[entry.clone()], &mut buf).unwrap();
        let pack = Pack::decode(std::io::Cursor::new(buf)).unwrap();

        let mut composite = CompositeStore::new(LooseStore::new(dir.path()));
        composite.add_pack(pack);

        assert!(composite.has(entry.hash));
        assert_eq!(composite.read(entry.hash).unwrap().data, entry.data);
    }

    #[test]
    fn pretty_print_renders_blob_content_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::new(dir.path());
        let hash = store.write(ObjectType::Blob, b"hello\n").unwrap();
        let entry = store.read(hash).unwrap();
        assert_eq!(pretty_print(&entry).unwrap(), "hello\n");
    }

    #[test]
    fn pretty_print_rejects_delta_entries() {
        let entry = Entry {
            obj_type: ObjectType::OffsetDelta,
            data: Vec::new(),
            hash: Fingerprint::of_bytes(b"delta"),
            chain_len: 0,
        };
        assert!(matches!(pretty_print(&entry), Err(GitError::TypeMismatch { .. })));
    }

    #[test]
    fn stream_blob_rejects_non_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::new(dir.path());
        let hash = store.write(ObjectType::Tree, b"").unwrap();
        let mut out = Vec::new();
        let err = store.stream_blob(hash, &mut out).unwrap_err();
        assert!(matches!(err, GitError::TypeMismatch { .. }));
    }
}
