use thiserror::Error;

use crate::header::ArtifactKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),

    #[error("incompatible artifact kind: expected {expected:?}, found {found:?}")]
    WrongArtifact {
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    #[error("incompatible schema version: expected {expected}, found {found}")]
    WrongSchema { expected: u32, found: u32 },

    #[error("truncated file: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("payload hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: u64, found: u64 },

    #[error("payload encoding failed: {0}")]
    Encode(String),

    #[error("payload decoding failed: {0}")]
    Decode(String),
}
