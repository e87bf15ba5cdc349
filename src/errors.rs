//! Error taxonomy for the object store, delta codec, commit graph, and the
//! other subsystems in this crate.
//!
//! The variants mirror the eight failure categories the object model
//! distinguishes: objects that don't exist, objects that exist but are
//! corrupt, objects of the wrong type for an operation, references that
//! resolve ambiguously, lock contention, I/O failure, malformed input that
//! never should have been accepted, and violated internal invariants.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    /// No object, reference, or path exists under the given identity.
    #[error("not found: {0}")]
    Missing(String),

    /// An object was located but its stored bytes don't hash to its key,
    /// or its framing/encoding is internally inconsistent.
    #[error("corrupt object: {0}")]
    Corrupt(String),

    /// An operation expected one object type but found another (e.g.
    /// dereferencing a blob as a tree).
    #[error("wrong object type: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A short fingerprint or revision expression matched more than one
    /// object and could not be resolved uniquely.
    #[error("ambiguous reference `{0}`: matches {1} objects")]
    Ambiguous(String, usize),

    /// A lockfile could not be acquired, or was held past its timeout.
    #[error("locked: {0}")]
    Locked(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Input that is syntactically or semantically invalid and was never a
    /// matter of missing data (bad revision syntax, truncated pack header,
    /// invalid tree entry mode, non-UTF-8 where UTF-8 was required, ...).
    #[error("malformed input: {0}")]
    Malformed(String),

    /// An internal invariant was violated. Reserved for bugs in this crate;
    /// callers should never need to match on this variant.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, GitError>;

/// Abort with a diagnostic for a broken internal invariant, as opposed to
/// returning `GitError::Invariant` for conditions a caller could plausibly
/// recover from. Use sparingly, only where continuing would silently
/// corrupt state (e.g. a refcount underflow in the blame scoreboard).
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        panic!("internal invariant violated: {}", format!($($arg)*))
    };
}
