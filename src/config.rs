//! Ambient repository configuration: pack decode resource limits and the
//! on-disk object directory. Not a general `.git/config`-style key/value
//! store (config-file parsing is out of scope for this crate) — just the
//! handful of knobs the store and pack decoder need, with `serde` derives
//! so a host application can load them from its own config format.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Environment variable that overrides the default `objects/` directory
/// location, mirroring `GIT_OBJECT_DIRECTORY`.
pub const OBJECT_DIR_ENV: &str = "GIT_OBJECT_DIRECTORY";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PackConfig {
    #[serde(deserialize_with = "string_or_usize")]
    pub pack_decode_mem_size: String,
    #[serde(deserialize_with = "string_or_usize")]
    pub pack_decode_disk_size: String,
    pub pack_decode_cache_path: PathBuf,
    pub clean_cache_after_decode: bool,
    pub channel_message_size: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            pack_decode_mem_size: "4G".to_string(),
            pack_decode_disk_size: "20%".to_string(),
            pack_decode_cache_path: PathBuf::from("pack_decode_cache"),
            clean_cache_after_decode: true,
            channel_message_size: 1_000_000,
        }
    }
}

/// Repository-level configuration: where loose objects and packs live, and
/// how the pack decoder is allowed to use memory/disk.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RepoConfig {
    pub object_dir: PathBuf,
    pub pack: PackConfig,
}

impl RepoConfig {
    /// Build from `object_dir`, honoring `GIT_OBJECT_DIRECTORY` as an
    /// override when the caller hasn't set one explicitly.
    pub fn with_object_dir(object_dir: impl Into<PathBuf>) -> Self {
        let object_dir = std::env::var(OBJECT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| object_dir.into());
        Self {
            object_dir,
            pack: PackConfig::default(),
        }
    }
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self::with_object_dir("objects")
    }
}

fn string_or_usize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrUSize {
        String(String),
        USize(usize),
    }

    Ok(match StringOrUSize::deserialize(deserializer)? {
        StringOrUSize::String(v) => v,
        StringOrUSize::USize(v) => v.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_object_dir_is_objects() {
        let cfg = RepoConfig::default();
        assert_eq!(cfg.object_dir, PathBuf::from("objects"));
    }
}
