//! Per-entry metadata carried alongside a pack entry as it moves through
//! the encode/decode pipeline: source path, which pack it came from, its
//! byte offset, whether it was stored as a delta, and its CRC32 (used when
//! writing a `.idx`).

#[derive(Debug, Clone, Default)]
pub struct EntryMeta {
    /// Source file path, relative to the repository root.
    pub file_path: Option<String>,

    /// Containing pack file id or index number.
    pub pack_id: Option<String>,

    /// Byte offset within the pack file.
    pub pack_offset: Option<usize>,

    pub is_delta: Option<bool>,

    /// CRC32 of the entry's compressed on-disk bytes, as written to `.idx`.
    pub crc32: Option<u32>,
}

impl EntryMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pack_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.pack_id = Some(id.into());
        self
    }

    pub fn set_pack_offset(&mut self, offset: usize) -> &mut Self {
        self.pack_offset = Some(offset);
        self
    }

    pub fn set_crc32(&mut self, crc32: u32) -> &mut Self {
        self.crc32 = Some(crc32);
        self
    }
}
