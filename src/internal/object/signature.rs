//! Author/committer identity lines as embedded in commit and tag objects:
//! `"<role> <name> <<email>> <unix-seconds> <+/-HHMM>"`.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::errors::GitError;

/// Which role a `Signature` line plays within a commit object.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SignatureType {
    Author,
    Committer,
    Tagger,
}

impl SignatureType {
    fn as_str(self) -> &'static str {
        match self {
            SignatureType::Author => "author",
            SignatureType::Committer => "committer",
            SignatureType::Tagger => "tagger",
        }
    }

    fn from_str(s: &str) -> Result<Self, GitError> {
        match s {
            "author" => Ok(SignatureType::Author),
            "committer" => Ok(SignatureType::Committer),
            "tagger" => Ok(SignatureType::Tagger),
            _ => Err(GitError::Malformed(format!(
                "`{s}` is not a valid signature role"
            ))),
        }
    }
}

/// One author/committer/tagger identity line.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub signature_type: SignatureType,
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Signed minute offset from UTC (e.g. `+0800` is `480`).
    pub timezone_offset_minutes: i32,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} <{}> {} {}",
            self.signature_type.as_str(),
            self.name,
            self.email,
            self.timestamp,
            format_tz_offset(self.timezone_offset_minutes)
        )
    }
}

impl Signature {
    pub fn new(
        signature_type: SignatureType,
        name: String,
        email: String,
        timestamp: i64,
        timezone_offset_minutes: i32,
    ) -> Self {
        Signature {
            signature_type,
            name,
            email,
            timestamp,
            timezone_offset_minutes,
        }
    }

    /// Parse one signature line, e.g.
    /// `author benjamin.747 <benjamin.747@outlook.com> 1757467768 +0800`.
    pub fn from_data(data: Vec<u8>) -> Result<Self, GitError> {
        let line = String::from_utf8(data)
            .map_err(|e| GitError::Malformed(format!("signature line is not UTF-8: {e}")))?;

        let (role, rest) = line
            .split_once(' ')
            .ok_or_else(|| GitError::Malformed("signature line has no role".to_string()))?;
        let signature_type = SignatureType::from_str(role)?;

        let email_start = rest
            .find('<')
            .ok_or_else(|| GitError::Malformed("signature line has no `<email>`".to_string()))?;
        let email_end = rest
            .find('>')
            .ok_or_else(|| GitError::Malformed("signature line has no `<email>`".to_string()))?;
        let name = rest[..email_start].trim().to_string();
        let email = rest[email_start + 1..email_end].to_string();

        let tail = rest[email_end + 1..].trim();
        let mut parts = tail.split_whitespace();
        let timestamp: i64 = parts
            .next()
            .ok_or_else(|| GitError::Malformed("signature line has no timestamp".to_string()))?
            .parse()
            .map_err(|_| GitError::Malformed("signature timestamp is not an integer".to_string()))?;
        let timezone_offset_minutes = parts
            .next()
            .map(parse_tz_offset)
            .transpose()?
            .unwrap_or(0);

        Ok(Signature {
            signature_type,
            name,
            email,
            timestamp,
            timezone_offset_minutes,
        })
    }

    pub fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(self.to_string().into_bytes())
    }
}

fn format_tz_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let minutes = minutes.abs();
    format!("{sign}{:02}{:02}", minutes / 60, minutes % 60)
}

fn parse_tz_offset(s: &str) -> Result<i32, GitError> {
    if s.len() != 5 || !(s.starts_with('+') || s.starts_with('-')) {
        return Err(GitError::Malformed(format!("`{s}` is not a valid tz offset")));
    }
    let sign = if s.starts_with('-') { -1 } else { 1 };
    let hours: i32 = s[1..3]
        .parse()
        .map_err(|_| GitError::Malformed(format!("`{s}` is not a valid tz offset")))?;
    let mins: i32 = s[3..5]
        .parse()
        .map_err(|_| GitError::Malformed(format!("`{s}` is not a valid tz offset")))?;
    Ok(sign * (hours * 60 + mins))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let line = b"author benjamin.747 <benjamin.747@outlook.com> 1757467768 +0800".to_vec();
        let sig = Signature::from_data(line.clone()).unwrap();
        assert_eq!(sig.name, "benjamin.747");
        assert_eq!(sig.email, "benjamin.747@outlook.com");
        assert_eq!(sig.timestamp, 1757467768);
        assert_eq!(sig.timezone_offset_minutes, 480);
        assert_eq!(sig.to_data().unwrap(), line);
    }

    #[test]
    fn negative_offset() {
        let line = b"committer jane <jane@example.com> 1000 -0530".to_vec();
        let sig = Signature::from_data(line).unwrap();
        assert_eq!(sig.timezone_offset_minutes, -330);
    }
}
