//! Integration test that builds a small pack in memory, decodes it back,
//! and cross-checks the `.idx` file's recorded offsets against the
//! offsets `Pack::encode` actually wrote.

use std::{collections::HashMap, convert::TryInto, io::Cursor};

use content_store::{
    errors::GitError,
    hash::Fingerprint,
    internal::{
        object::types::ObjectType,
        pack::{Pack, entry::Entry, pack_index::IdxBuilder, pack_index::IndexEntry},
    },
};
use tokio::sync::mpsc;

fn entry(kind: ObjectType, payload: &[u8]) -> Entry {
    let hash = Fingerprint::of_object(kind, payload);
    Entry {
        obj_type: kind,
        data: payload.to_vec(),
        hash,
        chain_len: 0,
    }
}

fn parse_idx_offsets(idx_bytes: &[u8]) -> HashMap<Vec<u8>, u64> {
    assert!(idx_bytes.len() >= 8, "idx too short");
    assert_eq!(&idx_bytes[0..4], &[0xFF, 0x74, 0x4F, 0x63], "idx magic");
    let version = u32::from_be_bytes(idx_bytes[4..8].try_into().unwrap());
    assert_eq!(version, 2, "idx version must be 2 per pack-format spec");

    let mut cursor = 8usize;
    let mut fanout = [0u32; 256];
    for (i, slot) in fanout.iter_mut().enumerate() {
        *slot = u32::from_be_bytes(idx_bytes[cursor + i * 4..cursor + i * 4 + 4].try_into().unwrap());
    }
    cursor += 256 * 4;

    let object_count = fanout[255] as usize;
    let names_end = cursor + object_count * 20;
    let names = &idx_bytes[cursor..names_end];
    cursor = names_end;

    cursor += object_count * 4; // skip CRC32s

    let offsets_end = cursor + object_count * 4;
    let offsets_bytes = &idx_bytes[cursor..offsets_end];
    cursor = offsets_end;

    let large_count = offsets_bytes
        .chunks_exact(4)
        .filter(|raw| u32::from_be_bytes((*raw).try_into().unwrap()) & 0x8000_0000 != 0)
        .count();

    let mut large_offsets = Vec::with_capacity(large_count);
    for _ in 0..large_count {
        let v = u64::from_be_bytes(idx_bytes[cursor..cursor + 8].try_into().unwrap());
        large_offsets.push(v);
        cursor += 8;
    }

    let mut map = HashMap::new();
    for (i, raw) in offsets_bytes.chunks_exact(4).enumerate() {
        let raw = u32::from_be_bytes(raw.try_into().unwrap());
        let offset = if raw & 0x8000_0000 == 0 {
            raw as u64
        } else {
            large_offsets[(raw & 0x7FFF_FFFF) as usize]
        };
        map.insert(names[i * 20..(i + 1) * 20].to_vec(), offset);
    }
    map
}

#[tokio::test]
async fn idx_offsets_match_encoded_pack() -> Result<(), GitError> {
    let entries = vec![
        entry(ObjectType::Blob, b"hello\n"),
        entry(ObjectType::Blob, b"a second, different blob\n"),
        entry(ObjectType::Tree, b""),
    ];

    let mut pack_bytes = Vec::new();
    let pack_hash = Pack::encode(&entries, &mut pack_bytes)?;

    let decoded = Pack::decode(Cursor::new(pack_bytes))?;
    assert_eq!(decoded.entries.len(), entries.len());
    assert_eq!(decoded.offsets.len(), entries.len());

    // Ask the decoder for the real offsets rather than predicting
    // compressed-record sizes ourselves.
    let idx_entries: Vec<IndexEntry> = decoded
        .entries
        .iter()
        .zip(decoded.offsets.iter())
        .map(|(e, &offset)| IndexEntry::new(e, offset))
        .collect();

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(1024);
    let mut builder = IdxBuilder::new(idx_entries.len(), tx, pack_hash);
    builder.write_idx(idx_entries.clone()).await?;

    let mut idx_bytes = Vec::new();
    while let Some(chunk) = rx.recv().await {
        idx_bytes.extend_from_slice(&chunk);
    }

    let offsets_map = parse_idx_offsets(&idx_bytes);
    for e in &idx_entries {
        let actual = *offsets_map
            .get(e.hash.as_bytes().as_slice())
            .unwrap_or_else(|| panic!("hash missing in idx: {}", e.hash));
        assert_eq!(actual, e.offset, "offset mismatch for {}", e.hash);
    }
    Ok(())
}
