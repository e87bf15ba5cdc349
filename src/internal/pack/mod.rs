//! Pack file encoder/decoder that faithfully follows the
//! [pack-format spec](https://git-scm.com/docs/pack-format): a 12-byte
//! header (`PACK`, version, object count), a sequence of type+size-framed
//! records (zlib-deflated payload, or a delta against a base selected by
//! negative offset or by fingerprint), and a trailing pack fingerprint.

pub mod entry;
mod index_entry;
pub mod pack_index;
pub mod waitlist;
pub mod wrapper;

use std::io::{BufRead, Read, Write};

use flate2::{Compression, write::ZlibEncoder};

use crate::{
    delta::{decode::delta_decode, encode::DeltaDiff},
    errors::GitError,
    hash::Fingerprint,
    internal::{
        object::types::ObjectType,
        pack::{
            entry::Entry,
            waitlist::{PendingDelta, Waitlist},
            wrapper::Wrapper,
        },
        zlib::stream::inflate::ReadBoxed,
    },
};

const PACK_SIGNATURE: [u8; 4] = *b"PACK";
const PACK_VERSION: u32 = 2;

/// A decoded pack file: every base object plus every delta resolved
/// against its base, in the order they were read off the stream.
#[derive(Debug, Default)]
pub struct Pack {
    pub version: u32,
    pub entries: Vec<Entry>,
    /// Byte offset from the start of the pack where each entry's header
    /// began, in the same order as `entries` — the offsets `.idx` records.
    pub offsets: Vec<usize>,
}

impl Pack {
    /// Parse a full pack stream (header, every object record, trailer),
    /// resolving delta objects against bases already seen earlier in the
    /// same pack. Bases arriving after their deltas are parked on a
    /// [`Waitlist`] and resolved once decoded.
    pub fn decode<R: BufRead>(reader: R) -> Result<Self, GitError> {
        let mut wrapper = Wrapper::new(reader);

        let mut magic = [0u8; 4];
        wrapper
            .read_exact(&mut magic)
            .map_err(|e| GitError::Corrupt(format!("truncated pack header: {e}")))?;
        if magic != PACK_SIGNATURE {
            return Err(GitError::Corrupt("missing PACK signature".to_string()));
        }

        let version = read_be_u32(&mut wrapper)?;
        if version != 2 && version != 3 {
            return Err(GitError::Corrupt(format!(
                "unsupported pack version {version}"
            )));
        }

        let object_count = read_be_u32(&mut wrapper)? as usize;

        let mut entries: Vec<Entry> = Vec::with_capacity(object_count);
        let mut offsets: Vec<usize> = Vec::with_capacity(object_count);
        let waitlist = Waitlist::new();

        for _ in 0..object_count {
            let offset = wrapper.bytes_read();
            let (obj_type, size) = read_type_and_size(&mut wrapper)?;

            match obj_type {
                ObjectType::OffsetDelta => {
                    let base_rel_offset = read_offset_delta_distance(&mut wrapper)?;
                    let base_offset = offset.checked_sub(base_rel_offset).ok_or_else(|| {
                        GitError::Corrupt("offset delta underflows pack".to_string())
                    })?;
                    let delta_data = inflate_payload(&mut wrapper, size)?;

                    if let Some(pos) = offsets.iter().position(|&o| o == base_offset) {
                        let entry = apply_delta(&entries[pos], &delta_data)?;
                        resolve_chain(&mut entries, &mut offsets, &waitlist, offset, entry);
                    } else {
                        waitlist.insert_offset(
                            base_offset,
                            PendingDelta {
                                offset,
                                base_type: ObjectType::Blob,
                                delta_data,
                            },
                        );
                        offsets.push(offset);
                    }
                }
                ObjectType::HashDelta => {
                    let mut base_hash_bytes = [0u8; 20];
                    wrapper
                        .read_exact(&mut base_hash_bytes)
                        .map_err(|e| GitError::Corrupt(format!("truncated ref-delta base: {e}")))?;
                    let base_hash = Fingerprint::from_bytes(&base_hash_bytes).map_err(GitError::Corrupt)?;
                    let delta_data = inflate_payload(&mut wrapper, size)?;

                    if let Some(base_entry) = entries.iter().find(|e| e.hash == base_hash) {
                        let entry = apply_delta(base_entry, &delta_data)?;
                        resolve_chain(&mut entries, &mut offsets, &waitlist, offset, entry);
                    } else {
                        waitlist.insert_ref(
                            base_hash,
                            PendingDelta {
                                offset,
                                base_type: ObjectType::Blob,
                                delta_data,
                            },
                        );
                        offsets.push(offset);
                    }
                }
                base_type => {
                    let data = inflate_payload(&mut wrapper, size)?;
                    let hash = Fingerprint::of_object(base_type, &data);
                    let entry = Entry {
                        obj_type: base_type,
                        data,
                        hash,
                        chain_len: 0,
                    };
                    resolve_chain(&mut entries, &mut offsets, &waitlist, offset, entry);
                }
            }
        }

        let mut trailer = [0u8; 20];
        wrapper
            .read_exact(&mut trailer)
            .map_err(|e| GitError::Corrupt(format!("truncated pack trailer: {e}")))?;
        let expected = Fingerprint::from_bytes(&trailer).map_err(GitError::Corrupt)?;
        let actual = wrapper.final_hash();
        if expected != actual {
            return Err(GitError::Corrupt(format!(
                "pack trailer fingerprint mismatch: expected {expected}, computed {actual}"
            )));
        }

        Ok(Pack {
            version,
            entries,
            offsets,
        })
    }

    /// Write a pack containing exactly these entries in order, each stored
    /// whole (no delta compression) for simplicity and determinism.
    pub fn encode<W: Write>(entries: &[Entry], mut out: W) -> Result<Fingerprint, GitError> {
        let mut hasher = crate::utils::RunningFingerprint::new();

        let mut header = Vec::with_capacity(12);
        header.extend_from_slice(&PACK_SIGNATURE);
        header.extend_from_slice(&PACK_VERSION.to_be_bytes());
        header.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        out.write_all(&header).map_err(GitError::Io)?;
        hasher.update(&header);

        for entry in entries {
            let mut record = encode_type_and_size(entry.obj_type, entry.data.len())?;
            record.extend_from_slice(&zlib_compress(&entry.data)?);
            out.write_all(&record).map_err(GitError::Io)?;
            hasher.update(&record);
        }

        let trailer = hasher.finalize();
        out.write_all(trailer.as_bytes()).map_err(GitError::Io)?;
        Ok(trailer)
    }

    /// Delta-encode `target` against `base` if that produces a smaller
    /// record than storing it whole; otherwise fall back to a full copy.
    pub fn best_entry(target_type: ObjectType, target: &[u8], base: Option<&Entry>) -> Entry {
        let hash = Fingerprint::of_object(target_type, target);
        if let Some(base) = base {
            let diff = DeltaDiff::new(&base.data, target);
            if let Some(delta) = diff.encode_capped(target.len()) {
                return Entry {
                    obj_type: base.obj_type,
                    data: delta,
                    hash,
                    chain_len: base.chain_len + 1,
                };
            }
        }
        tracing::debug!(?target_type, len = target.len(), "storing pack entry whole, no usable delta base");
        Entry {
            obj_type: target_type,
            data: target.to_vec(),
            hash,
            chain_len: 0,
        }
    }
}

/// Record a freshly decoded/resolved entry, then drain and resolve any
/// deltas that were waiting on it (transitively, for delta chains).
fn resolve_chain(
    entries: &mut Vec<Entry>,
    offsets: &mut Vec<usize>,
    waitlist: &Waitlist,
    offset: usize,
    entry: Entry,
) {
    let hash = entry.hash;
    offsets.push(offset);
    entries.push(entry);

    let mut pending = waitlist.take(offset, hash);
    while let Some(p) = pending.pop() {
        let base = entries.last().expect("just pushed");
        if let Ok(resolved) = apply_delta(base, &p.delta_data) {
            let resolved_hash = resolved.hash;
            offsets.push(p.offset);
            entries.push(resolved);
            pending.extend(waitlist.take(p.offset, resolved_hash));
        }
    }
}

fn apply_delta(base: &Entry, delta_data: &[u8]) -> Result<Entry, GitError> {
    let mut cursor = delta_data;
    let data = delta_decode(&mut cursor, &base.data)
        .map_err(|e| GitError::Corrupt(format!("delta application failed: {e}")))?;
    let hash = Fingerprint::of_object(base.obj_type, &data);
    Ok(Entry {
        obj_type: base.obj_type,
        data,
        hash,
        chain_len: base.chain_len + 1,
    })
}

fn read_be_u32<R: Read>(r: &mut R) -> Result<u32, GitError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|e| GitError::Corrupt(format!("truncated pack stream: {e}")))?;
    Ok(u32::from_be_bytes(buf))
}

/// Pack object header: a varint where the low 4 bits of the first byte
/// hold the size, the next 3 bits hold the type, and each continuation
/// byte contributes 7 more size bits.
fn read_type_and_size<R: Read>(r: &mut R) -> Result<(ObjectType, usize), GitError> {
    let mut byte = [0u8; 1];
    r.read_exact(&mut byte)
        .map_err(|e| GitError::Corrupt(format!("truncated object header: {e}")))?;
    let mut b = byte[0];
    let obj_type = ObjectType::from_pack_type_u8((b >> 4) & 0x07)?;
    let mut size = (b & 0x0f) as usize;
    let mut shift = 4;
    while b & 0x80 != 0 {
        r.read_exact(&mut byte)
            .map_err(|e| GitError::Corrupt(format!("truncated object header: {e}")))?;
        b = byte[0];
        size |= ((b & 0x7f) as usize) << shift;
        shift += 7;
    }
    Ok((obj_type, size))
}

fn encode_type_and_size(obj_type: ObjectType, size: usize) -> Result<Vec<u8>, GitError> {
    let type_bits = obj_type.to_pack_type_u8()?;
    let mut out = Vec::with_capacity(4);
    let mut size = size;
    let mut first = (type_bits << 4) | (size & 0x0f) as u8;
    size >>= 4;
    if size > 0 {
        first |= 0x80;
    }
    out.push(first);
    while size > 0 {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
    Ok(out)
}

/// Offset-delta base distance: a big-endian varint with a +1 bias applied
/// to every continuation byte (Git's "offset encoding").
fn read_offset_delta_distance<R: Read>(r: &mut R) -> Result<usize, GitError> {
    let mut byte = [0u8; 1];
    r.read_exact(&mut byte)
        .map_err(|e| GitError::Corrupt(format!("truncated offset-delta distance: {e}")))?;
    let mut b = byte[0];
    let mut value = (b & 0x7f) as usize;
    while b & 0x80 != 0 {
        r.read_exact(&mut byte)
            .map_err(|e| GitError::Corrupt(format!("truncated offset-delta distance: {e}")))?;
        b = byte[0];
        value = ((value + 1) << 7) | (b & 0x7f) as usize;
    }
    Ok(value)
}

fn inflate_payload<R: BufRead>(r: &mut R, expected_size: usize) -> Result<Vec<u8>, GitError> {
    let mut inflate = ReadBoxed::new_for_delta(r);
    let mut data = Vec::with_capacity(expected_size);
    inflate
        .read_to_end(&mut data)
        .map_err(|e| GitError::Corrupt(format!("failed to inflate object: {e}")))?;
    if data.len() != expected_size {
        return Err(GitError::Corrupt(format!(
            "inflated size {} does not match header size {expected_size}",
            data.len()
        )));
    }
    Ok(data)
}

fn zlib_compress(data: &[u8]) -> Result<Vec<u8>, GitError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(GitError::Io)?;
    encoder.finish().map_err(GitError::Io)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tracing_subscriber::util::SubscriberInitExt;

    use super::*;

    /// `RUST_LOG=debug cargo test -- --nocapture` to see pack decode/encode
    /// traces; harmless to call more than once, `try_init` swallows the
    /// "already set" error.
    #[allow(dead_code)]
    pub(crate) fn init_logger() {
        let _ = tracing_subscriber::fmt::Subscriber::builder()
            .with_target(false)
            .without_time()
            .with_level(true)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
            .try_init();
    }

    fn sample_entries() -> Vec<Entry> {
        let blob_data = b"hello\n".to_vec();
        let blob_hash = Fingerprint::of_object(ObjectType::Blob, &blob_data);
        vec![Entry {
            obj_type: ObjectType::Blob,
            data: blob_data,
            hash: blob_hash,
            chain_len: 0,
        }]
    }

    #[test]
    fn round_trips_a_simple_pack() {
        let entries = sample_entries();
        let mut buf = Vec::new();
        let trailer = Pack::encode(&entries, &mut buf).expect("encode");

        let pack = Pack::decode(Cursor::new(buf)).expect("decode");
        assert_eq!(pack.version, PACK_VERSION);
        assert_eq!(pack.entries.len(), 1);
        assert_eq!(pack.entries[0].hash, entries[0].hash);
        assert_eq!(pack.entries[0].data, entries[0].data);
        assert!(!trailer.is_null());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"NOPE");
        buf.extend_from_slice(&PACK_VERSION.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        let err = Pack::decode(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, GitError::Corrupt(_)));
    }
}
