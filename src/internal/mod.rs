//! Internal building blocks (metadata, object model, pack/zlib) that power the public APIs.

pub mod metadata;
pub mod object;
pub mod pack;
pub mod zlib;
