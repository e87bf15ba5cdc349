//! Zlib (de)compression plumbing shared by loose objects and pack entries.

pub mod stream;
