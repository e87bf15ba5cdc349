//! Shared I/O helpers: buffered reads, byte counting, and an incremental
//! SHA-1 writer used while streaming object content in and out of storage.

use std::io::{self, BufRead, Read, Write};

use sha1::{Digest, Sha1};

use crate::hash::Fingerprint;

pub fn read_bytes(file: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_fingerprint(file: &mut impl Read) -> io::Result<Fingerprint> {
    Fingerprint::from_stream(file)
}

/// A lightweight wrapper that counts bytes read from the underlying reader,
/// used in place of a running total kept by hand at each call site.
pub struct CountingReader<R> {
    pub inner: R,
    pub bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.bytes_read += amt as u64;
        self.inner.consume(amt);
    }
}

/// Incremental SHA-1 state exposed through `std::io::Write`, so a running
/// fingerprint can be folded into any `io::copy`-style pipeline (pack
/// writing, loose-object inflate/verify).
#[derive(Clone, Default)]
pub struct RunningFingerprint(Sha1);

impl RunningFingerprint {
    pub fn new() -> Self {
        Self(Sha1::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> Fingerprint {
        let digest = self.0.finalize();
        Fingerprint::from_bytes(digest.as_ref()).expect("sha1 digest is 20 bytes")
    }
}

impl Write for RunningFingerprint {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
