use crate::field_dictionary::FieldType;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FortilogError>;

pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;

/// Fatal (whole stream) and I/O errors.
#[derive(Debug, Error)]
pub enum FortilogError {
    #[error("Unknown log header magic `{:02X}{:02X}`, expected `ECCF` or `AA01`", magic[0], magic[1])]
    UnknownMagic { magic: [u8; 2] },

    #[error("Stream is too short to hold a header (have {have} bytes, need 2)")]
    MissingHeader { have: usize },

    #[error("Failed to open file {}: {}", path.display(), source)]
    FailedToOpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),

    #[error("`serde_json` failed with error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bounds errors raised by the byte cursor helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeserializationError {
    #[error("Offset {offset}: need {need} bytes for {what}, only {have} left")]
    Truncated {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },
}

/// Failure of a type decoder. Always local to one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{field_type} payload must be {expected} bytes, found {found}")]
    LengthMismatch {
        field_type: FieldType,
        expected: usize,
        found: usize,
    },
}
