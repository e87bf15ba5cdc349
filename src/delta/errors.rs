//! Error variants for the custom delta encoder/decoder so callers can surface friendly failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitDeltaError {
    #[error("delta encoding failed: {0}")]
    DeltaEncoderError(String),

    #[error("delta decoding failed: {0}")]
    DeltaDecoderError(String),
}
