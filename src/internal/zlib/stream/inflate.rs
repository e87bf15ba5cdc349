//! Buffered inflate reader that decodes zlib-compressed loose-object
//! payloads while simultaneously tracking a running SHA-1 for integrity
//! verification against the object's fingerprint.

use std::{io, io::BufRead};

use flate2::{Decompress, FlushDecompress, Status};

use crate::{internal::object::types::ObjectType, utils::RunningFingerprint};

/// Wraps a zlib-compressed `BufRead` and exposes its decompressed bytes
/// through `Read`, without over-reading past the end of the DEFLATE stream
/// (so the caller's reader is left positioned right after it, ready for
/// whatever follows — a pack trailer, the next packed object, ...).
pub struct ReadBoxed<R> {
    pub inner: R,
    pub decompressor: Box<Decompress>,
    /// Whether `read` should fold output bytes into `hash`. Off for delta
    /// objects, whose hash is computed only after reconstruction against
    /// their base.
    count_hash: bool,
    pub hash: RunningFingerprint,
}

impl<R> ReadBoxed<R>
where
    R: BufRead,
{
    /// Reader for a base object; seeds the hash with the
    /// `"<type> <size>\0"` framing header up front.
    pub fn new(inner: R, obj_type: ObjectType, size: usize) -> Self {
        let mut hash = RunningFingerprint::new();
        hash.update(obj_type.to_bytes());
        hash.update(b" ");
        hash.update(size.to_string().as_bytes());
        hash.update(b"\0");
        ReadBoxed {
            inner,
            hash,
            count_hash: true,
            decompressor: Box::new(Decompress::new(true)),
        }
    }

    /// Reader for a delta object; doesn't touch the hash accumulator.
    pub fn new_for_delta(inner: R) -> Self {
        ReadBoxed {
            inner,
            hash: RunningFingerprint::new(),
            count_hash: false,
            decompressor: Box::new(Decompress::new(true)),
        }
    }
}

impl<R> io::Read for ReadBoxed<R>
where
    R: BufRead,
{
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let o = read(&mut self.inner, &mut self.decompressor, into)?;
        if self.count_hash {
            self.hash.update(&into[..o]);
        }
        Ok(o)
    }
}

fn read(rd: &mut impl BufRead, state: &mut Decompress, mut dst: &mut [u8]) -> io::Result<usize> {
    let mut total_written = 0;
    loop {
        let (written, consumed, ret, eof);
        {
            let input = rd.fill_buf()?;
            eof = input.is_empty();
            let before_out = state.total_out();
            let before_in = state.total_in();
            let flush = if eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            ret = state.decompress(input, dst, flush);
            written = (state.total_out() - before_out) as usize;
            total_written += written;
            dst = &mut dst[written..];
            consumed = (state.total_in() - before_in) as usize;
        }
        rd.consume(consumed);

        match ret {
            Ok(Status::StreamEnd) => return Ok(total_written),
            Ok(Status::Ok | Status::BufError) if eof || dst.is_empty() => return Ok(total_written),
            Ok(Status::Ok | Status::BufError) if consumed != 0 || written != 0 => continue,
            Ok(Status::Ok | Status::BufError) => unreachable!("decompressor stalled with no progress"),
            Err(..) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "corrupt deflate stream",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use flate2::{Compression, write::ZlibEncoder};
    use sha1::{Digest, Sha1};

    use super::*;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn inflate_object_counts_hash() {
        let body = b"hello\n";
        let compressed = zlib_compress(body);
        let cursor = io::Cursor::new(compressed);

        let mut reader = ReadBoxed::new(cursor, ObjectType::Blob, body.len());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);

        let mut expected = Sha1::new();
        expected.update(ObjectType::Blob.to_bytes());
        expected.update(b" ");
        expected.update(body.len().to_string());
        expected.update(b"\0");
        expected.update(body);
        assert_eq!(reader.hash.finalize().as_bytes(), expected.finalize().as_slice());
    }

    #[test]
    fn inflate_delta_skips_hash() {
        let body = b"delta bytes";
        let compressed = zlib_compress(body);
        let cursor = io::Cursor::new(compressed);

        let mut reader = ReadBoxed::new_for_delta(cursor);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);

        let empty_hash = Sha1::new().finalize();
        assert_eq!(reader.hash.finalize().as_bytes(), empty_hash.as_slice());
    }

    #[test]
    fn corrupt_stream_returns_error() {
        let data = b"not a valid zlib stream";
        let mut reader = ReadBoxed::new(io::Cursor::new(data), ObjectType::Blob, data.len());
        let mut out = [0u8; 16];
        let err = reader.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
