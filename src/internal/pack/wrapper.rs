//! Reader wrapper that tracks how many bytes of a pack have been consumed
//! while keeping a running fingerprint for trailer verification.

use std::io::{self, BufRead, Read};

use crate::{hash::Fingerprint, utils::RunningFingerprint};

pub struct Wrapper<R> {
    inner: R,
    hash: RunningFingerprint,
    bytes_read: usize,
}

impl<R> Wrapper<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hash: RunningFingerprint::new(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Fingerprint of everything read so far (not a final consuming call —
    /// may be called repeatedly as more bytes are read).
    pub fn final_hash(&self) -> Fingerprint {
        self.hash.clone().finalize()
    }
}

impl<R> BufRead for Wrapper<R>
where
    R: BufRead,
{
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        let buffer = self.inner.fill_buf().expect("failed to fill buffer");
        self.hash.update(&buffer[..amt]);
        self.inner.consume(amt);
        self.bytes_read += amt;
    }
}

impl<R> Read for Wrapper<R>
where
    R: BufRead,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let o = self.inner.read(buf)?;
        self.hash.update(&buf[..o]);
        self.bytes_read += o;
        Ok(o)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Read};

    use sha1::{Digest, Sha1};

    use crate::{hash::Fingerprint, internal::pack::wrapper::Wrapper};

    #[test]
    fn reads_through_unchanged() {
        let data = b"Hello, world!";
        let cursor = Cursor::new(data.as_ref());
        let buf_reader = BufReader::new(cursor);
        let mut wrapper = Wrapper::new(buf_reader);

        let mut buffer = vec![0; data.len()];
        wrapper.read_exact(&mut buffer).unwrap();
        assert_eq!(buffer, data);
    }

    #[test]
    fn tracks_running_hash() {
        let data = b"Hello, world!";
        let cursor = Cursor::new(data.as_ref());
        let buf_reader = BufReader::new(cursor);
        let mut wrapper = Wrapper::new(buf_reader);

        let mut buffer = vec![0; data.len()];
        wrapper.read_exact(&mut buffer).unwrap();

        let expected = Fingerprint::from_bytes(&Sha1::digest(data)).unwrap();
        assert_eq!(wrapper.final_hash(), expected);
    }
}
