//! Streaming wrappers around `flate2`'s zlib codec.

pub mod inflate;
