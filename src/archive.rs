//! USTAR tar archive writer for a tree: one entry per path, PAX extended
//! headers for names/link targets too long for the fixed-width USTAR
//! fields, content streamed straight from the object store. Grounded on
//! `tar-tree.c`'s `write_entry`/`write_blocked`/`ustar_header_chksum`.

use std::io::Write;

use crate::{
    errors::GitError,
    hash::Fingerprint,
    internal::object::tree::{FileMode, Tree},
};

/// One physical tar record. The C original batches these into a
/// `BLOCKSIZE = RECORDSIZE * 20` staging buffer before a single write(2);
/// this writer flushes per-record instead, since it targets an arbitrary
/// `Write` rather than a fixed-size output device.
const RECORDSIZE: usize = 512;

const MAGIC: &[u8; 6] = b"ustar\0";
const VERSION: &[u8; 2] = b"00";

/// Longest name/linkname a plain USTAR header can hold before a PAX
/// extended header is required.
const NAME_FIELD_LEN: usize = 100;
const LINKNAME_FIELD_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeFlag {
    Regular,
    Directory,
    Symlink,
    ExtendedHeader,
}

impl TypeFlag {
    fn byte(self) -> u8 {
        match self {
            TypeFlag::Regular => b'0',
            TypeFlag::Directory => b'5',
            TypeFlag::Symlink => b'2',
            TypeFlag::ExtendedHeader => b'x',
        }
    }
}

/// What the archive walker needs from the object store: tree expansion and
/// blob content, the same split [`crate::tree_walk`] uses.
pub trait ArchiveSource {
    fn resolve_tree(&self, id: Fingerprint) -> Tree;
    fn read_blob(&self, id: Fingerprint) -> Vec<u8>;
}

/// Streams a tree as a USTAR+PAX tar archive.
pub struct ArchiveWriter<W: Write> {
    out: W,
    mtime: u64,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W, mtime: u64) -> Self {
        Self { out, mtime }
    }

    /// Write every entry of `tree` under `prefix` (e.g. `"myrepo/"`, empty
    /// for no prefix), then the two end-of-archive zero records.
    pub fn write_tree(&mut self, tree: &Tree, prefix: &str, src: &dyn ArchiveSource) -> Result<(), GitError> {
        self.write_entries(tree, prefix, src)?;
        self.write_trailer()
    }

    fn write_entries(&mut self, tree: &Tree, prefix: &str, src: &dyn ArchiveSource) -> Result<(), GitError> {
        for entry in &tree.entries {
            let path = format!("{prefix}{}", entry.name);
            match entry.mode {
                FileMode::Directory => {
                    let dir_path = format!("{path}/");
                    self.write_one(&dir_path, TypeFlag::Directory, entry.mode, &[])?;
                    let subtree = src.resolve_tree(entry.id);
                    self.write_entries(&subtree, &dir_path, src)?;
                }
                FileMode::Symlink => {
                    let target = src.read_blob(entry.id);
                    self.write_one(&path, TypeFlag::Symlink, entry.mode, &target)?;
                }
                FileMode::Regular | FileMode::Executable => {
                    let data = src.read_blob(entry.id);
                    self.write_one(&path, TypeFlag::Regular, entry.mode, &data)?;
                }
            }
        }
        Ok(())
    }

    fn write_one(&mut self, path: &str, kind: TypeFlag, mode: FileMode, content: &[u8]) -> Result<(), GitError> {
        let name_bytes = path.as_bytes();
        let link_bytes: &[u8] = if kind == TypeFlag::Symlink { content } else { &[] };

        let mut pax_fields = Vec::new();
        let header_name = if name_bytes.len() > NAME_FIELD_LEN {
            pax_fields.push(("path".to_string(), path.to_string()));
            truncated_placeholder(path)
        } else {
            path.to_string()
        };
        let header_link = if kind == TypeFlag::Symlink && link_bytes.len() > LINKNAME_FIELD_LEN {
            let target = String::from_utf8_lossy(link_bytes).into_owned();
            pax_fields.push(("linkpath".to_string(), target));
            String::new()
        } else if kind == TypeFlag::Symlink {
            String::from_utf8_lossy(link_bytes).into_owned()
        } else {
            String::new()
        };

        if !pax_fields.is_empty() {
            let pax_body = encode_pax_records(&pax_fields);
            self.write_ustar_header(&truncated_placeholder(path), TypeFlag::ExtendedHeader, mode, "", pax_body.len() as u64)?;
            self.write_blocked(&pax_body)?;
        }

        let body_len = if kind == TypeFlag::Regular { content.len() as u64 } else { 0 };
        self.write_ustar_header(&header_name, kind, mode, &header_link, body_len)?;
        if kind == TypeFlag::Regular && !content.is_empty() {
            self.write_blocked(content)?;
        }
        Ok(())
    }

    fn write_ustar_header(
        &mut self,
        name: &str,
        kind: TypeFlag,
        mode: FileMode,
        linkname: &str,
        size: u64,
    ) -> Result<(), GitError> {
        let mut header = [0u8; RECORDSIZE];

        put_str(&mut header[0..100], name);
        put_octal(&mut header[100..108], mode_bits(mode, kind), 7);
        put_octal(&mut header[108..116], 0, 7); // uid
        put_octal(&mut header[116..124], 0, 7); // gid
        put_octal(&mut header[124..136], size, 11);
        put_octal(&mut header[136..148], self.mtime, 11);
        header[148..156].fill(b' '); // chksum placeholder while computing
        header[156] = kind.byte();
        put_str(&mut header[157..257], linkname);
        header[257..263].copy_from_slice(MAGIC);
        header[263..265].copy_from_slice(VERSION);
        put_str(&mut header[265..297], "git");
        put_str(&mut header[297..329], "git");
        put_octal(&mut header[329..337], 0, 7); // devmajor
        put_octal(&mut header[337..345], 0, 7); // devminor

        let chksum = header.iter().map(|&b| b as u32).sum::<u32>();
        put_octal(&mut header[148..156], chksum as u64, 7);

        self.write_blocked(&header)
    }

    /// Pad `buf` to a `RECORDSIZE` multiple and write it.
    fn write_blocked(&mut self, buf: &[u8]) -> Result<(), GitError> {
        self.out.write_all(buf).map_err(GitError::Io)?;
        let rem = buf.len() % RECORDSIZE;
        if rem != 0 {
            let pad = vec![0u8; RECORDSIZE - rem];
            self.out.write_all(&pad).map_err(GitError::Io)?;
        }
        Ok(())
    }

    /// Two all-zero records close the archive, matching `write_trailer`.
    fn write_trailer(&mut self) -> Result<(), GitError> {
        let zeros = [0u8; RECORDSIZE * 2];
        self.out.write_all(&zeros).map_err(GitError::Io)
    }
}

fn mode_bits(mode: FileMode, kind: TypeFlag) -> u64 {
    match kind {
        TypeFlag::Directory => 0o775,
        TypeFlag::Symlink => 0o777,
        _ => match mode {
            FileMode::Executable => 0o775,
            _ => 0o664,
        },
    }
}

fn put_str(field: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
}

/// Write `value` as exactly `digits` octal characters followed by a NUL
/// terminator, matching the C original's `sprintf(field, "%0<n>o", value)`
/// into a fixed-width, NUL-terminated header field.
fn put_octal(field: &mut [u8], value: u64, digits: usize) {
    let rendered = format!("{value:0digits$o}", digits = digits);
    put_str(field, &rendered);
    field[digits] = 0;
}

/// Name written into the fixed 100-byte header field when the real path is
/// too long for it and a PAX record carries the actual value instead.
fn truncated_placeholder(path: &str) -> String {
    let bytes = path.as_bytes();
    let cut = bytes.len().min(NAME_FIELD_LEN - 1);
    let mut cut = cut;
    while cut > 0 && !path.is_char_boundary(cut) {
        cut -= 1;
    }
    path[..cut].to_string()
}

/// PAX extended header body: `"<len> <key>=<value>\n"` records, where
/// `<len>` includes its own decimal width.
fn encode_pax_records(fields: &[(String, String)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in fields {
        let mut len = key.len() + value.len() + 3; // ' ' + '=' + '\n'
        let mut digits = len.to_string().len();
        loop {
            let candidate = digits + key.len() + value.len() + 3;
            let candidate_digits = candidate.to_string().len();
            if candidate_digits == digits {
                len = candidate;
                break;
            }
            digits = candidate_digits;
        }
        out.extend_from_slice(format!("{len} {key}={value}\n").as_bytes());
    }
    out
}

/// Convenience: write an in-memory tar archive, returning the bytes.
pub fn write_tar_to_vec(tree: &Tree, prefix: &str, src: &dyn ArchiveSource, mtime: u64) -> Result<Vec<u8>, GitError> {
    let mut buf = Vec::new();
    {
        let mut writer = ArchiveWriter::new(&mut buf, mtime);
        writer.write_tree(tree, prefix, src)?;
    }
    Ok(buf)
}

/// Reads exactly the archive's declared trailer length, for callers that
/// want to validate a stream without buffering the whole thing.
pub fn trailer_len() -> usize {
    RECORDSIZE * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::ObjectTrait;
    use crate::internal::object::tree::TreeEntry;
    use crate::internal::object::types::ObjectType;
    use std::collections::HashMap;

    struct MemSource {
        trees: HashMap<Fingerprint, Tree>,
        blobs: HashMap<Fingerprint, Vec<u8>>,
    }

    impl ArchiveSource for MemSource {
        fn resolve_tree(&self, id: Fingerprint) -> Tree {
            self.trees.get(&id).cloned().unwrap_or_else(|| Tree::from_entries(vec![]))
        }
        fn read_blob(&self, id: Fingerprint) -> Vec<u8> {
            self.blobs.get(&id).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn archive_ends_with_two_zero_records() {
        let blob_id = Fingerprint::of_object(ObjectType::Blob, b"hi\n");
        let tree = Tree::from_entries(vec![TreeEntry::new(FileMode::Regular, "a.txt".to_string(), blob_id)]);
        let mut blobs = HashMap::new();
        blobs.insert(blob_id, b"hi\n".to_vec());
        let src = MemSource { trees: HashMap::new(), blobs };

        let bytes = write_tar_to_vec(&tree, "", &src, 0).unwrap();
        assert_eq!(bytes.len() % RECORDSIZE, 0);
        let tail = &bytes[bytes.len() - trailer_len()..];
        assert!(tail.iter().all(|&b| b == 0));
    }

    #[test]
    fn regular_file_header_has_ustar_magic_and_checksum() {
        let blob_id = Fingerprint::of_object(ObjectType::Blob, b"content\n");
        let tree = Tree::from_entries(vec![TreeEntry::new(FileMode::Regular, "f.txt".to_string(), blob_id)]);
        let mut blobs = HashMap::new();
        blobs.insert(blob_id, b"content\n".to_vec());
        let src = MemSource { trees: HashMap::new(), blobs };

        let bytes = write_tar_to_vec(&tree, "", &src, 0).unwrap();
        let header = &bytes[0..RECORDSIZE];
        assert_eq!(&header[257..263], MAGIC);
        assert_eq!(&header[263..265], VERSION);
        assert_eq!(header[156], b'0');
        assert!(header.starts_with(b"f.txt"));
    }

    #[test]
    fn directory_entries_get_trailing_slash_and_typeflag_five() {
        let inner_blob = Fingerprint::of_object(ObjectType::Blob, b"x");
        let inner_tree = Tree::from_entries(vec![TreeEntry::new(FileMode::Regular, "inner.txt".to_string(), inner_blob)]);
        let root = Tree::from_entries(vec![TreeEntry::new(FileMode::Directory, "dir".to_string(), inner_tree.id)]);

        let mut trees = HashMap::new();
        trees.insert(inner_tree.id, inner_tree);
        let mut blobs = HashMap::new();
        blobs.insert(inner_blob, b"x".to_vec());
        let src = MemSource { trees, blobs };

        let bytes = write_tar_to_vec(&root, "", &src, 0).unwrap();
        let dir_header = &bytes[0..RECORDSIZE];
        assert_eq!(dir_header[156], b'5');
        assert!(dir_header.starts_with(b"dir/"));
    }

    #[test]
    fn long_path_gets_a_pax_extended_header() {
        let long_name = "d/".repeat(40) + "file.txt";
        let blob_id = Fingerprint::of_object(ObjectType::Blob, b"payload");
        let tree = Tree::from_entries(vec![TreeEntry::new(FileMode::Regular, long_name.clone(), blob_id)]);
        let mut blobs = HashMap::new();
        blobs.insert(blob_id, b"payload".to_vec());
        let src = MemSource { trees: HashMap::new(), blobs };

        let bytes = write_tar_to_vec(&tree, "", &src, 0).unwrap();
        let ext_header = &bytes[0..RECORDSIZE];
        assert_eq!(ext_header[156], b'x');
        let pax_body = &bytes[RECORDSIZE..RECORDSIZE * 2];
        let body_str = String::from_utf8_lossy(pax_body);
        assert!(body_str.contains(&format!("path={long_name}")));
    }
}
