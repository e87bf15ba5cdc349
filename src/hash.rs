//! Content-addressed fingerprints for stored objects.
//!
//! A [`Fingerprint`] is the 20-byte SHA-1 digest of an object's framed
//! representation (`"<type> <len>\0<payload>"`). Unlike the hash-agile
//! design some Git reimplementations carry, this crate fixes the digest
//! algorithm and width: every fingerprint is exactly 20 bytes / 40 hex
//! nibbles, matching the on-disk and wire formats this crate reads and
//! writes.

use std::{fmt, io, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::Digest;

use crate::internal::object::types::ObjectType;

/// Number of raw bytes in a fingerprint.
pub const FINGERPRINT_LEN: usize = 20;

/// The all-zero fingerprint, used as a sentinel for "no object" (e.g. an
/// unborn branch tip or a creation-side filepair endpoint).
pub const NULL_FINGERPRINT: Fingerprint = Fingerprint([0u8; FINGERPRINT_LEN]);

/// A 20-byte content-addressed identifier.
///
/// Ordering is lexicographic over the raw bytes, which matches the sort
/// order pack indexes and tree entries rely on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Fingerprint(pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// The zero fingerprint.
    pub const NULL: Fingerprint = NULL_FINGERPRINT;

    /// Hash `data` directly (no type/length framing). Used for content
    /// that is already framed by the caller, e.g. delta base matching.
    pub fn of_bytes(data: &[u8]) -> Fingerprint {
        let digest = sha1::Sha1::digest(data);
        let mut bytes = [0u8; FINGERPRINT_LEN];
        bytes.copy_from_slice(digest.as_ref());
        Fingerprint(bytes)
    }

    /// Hash an object's payload under the standard `"<type> <len>\0"` frame.
    pub fn of_object(kind: ObjectType, payload: &[u8]) -> Fingerprint {
        let mut framed = Vec::with_capacity(payload.len() + 24);
        framed.extend_from_slice(kind.to_data().expect("object type has a name"));
        framed.push(b' ');
        framed.extend_from_slice(payload.len().to_string().as_bytes());
        framed.push(0);
        framed.extend_from_slice(payload);
        Fingerprint::of_bytes(&framed)
    }

    /// Build from exactly 20 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Fingerprint, String> {
        if bytes.len() != FINGERPRINT_LEN {
            return Err(format!(
                "invalid fingerprint length: got {}, expected {FINGERPRINT_LEN}",
                bytes.len()
            ));
        }
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(bytes);
        Ok(Fingerprint(out))
    }

    /// Read 20 raw bytes from a stream.
    pub fn from_stream(r: &mut impl io::Read) -> io::Result<Fingerprint> {
        let mut out = [0u8; FINGERPRINT_LEN];
        r.read_exact(&mut out)?;
        Ok(Fingerprint(out))
    }

    /// Raw byte view.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// `true` if this is the all-zero sentinel.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; FINGERPRINT_LEN]
    }

    /// Lowercase 40-hex-nibble string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Shortest-prefix-hex used for human-facing display (first 7 nibbles,
    /// matching the abbreviation length commonly used for commit display).
    pub fn to_short_hex(self) -> String {
        self.to_hex()[..7].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Fingerprint::NULL
    }
}

/// Parse from a 40-character lowercase (or uppercase) hex string.
impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(format!("invalid fingerprint hex length: {}", s.len()));
        }
        let raw = hex::decode(s).map_err(|e| e.to_string())?;
        Fingerprint::from_bytes(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::types::ObjectType;

    /// S1: hashing a blob "hello\n" must reproduce the reference fingerprint.
    #[test]
    fn blob_fingerprint_stability() {
        let fp = Fingerprint::of_object(ObjectType::Blob, b"hello\n");
        assert_eq!(fp.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn hex_roundtrip() {
        let fp = Fingerprint::of_bytes(b"some data");
        let parsed: Fingerprint = fp.to_hex().parse().unwrap();
        assert_eq!(fp, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Fingerprint::from_bytes(&[0u8; 19]).is_err());
        assert!("deadbeef".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn null_is_all_zero() {
        assert!(Fingerprint::NULL.is_null());
        assert_eq!(
            Fingerprint::NULL.to_hex(),
            "0000000000000000000000000000000000000000".chars().take(40).collect::<String>()
        );
    }
}
