use crate::log_file_header::Magic;

use log::Level;
use serde::Serialize;
use std::fmt;

/// Per-stream counters, returned once the stream is decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub magic: Option<Magic>,
    pub records_decoded: u64,
    /// Partial records discarded because of corruption or a truncated tail.
    pub records_skipped: u64,
    pub resync_events: u64,
    pub unresolved_tags: u64,
    pub lossy_strings: u64,
    pub bytes_total: u64,
    pub header_bytes: u64,
    /// Bytes of chunks that framed and decoded correctly.
    pub bytes_consumed: u64,
    /// Bytes stepped over by resynchronization.
    pub bytes_skipped: u64,
    /// Bytes left unparsed at the end of the stream.
    pub bytes_truncated: u64,
    /// Offset of the truncated tail, if any.
    pub truncated_at: Option<u64>,
}

impl DecodeReport {
    pub fn new(bytes_total: usize) -> Self {
        DecodeReport {
            bytes_total: bytes_total as u64,
            ..Default::default()
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated_at.is_some()
    }

    /// Every byte of the stream is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.header_bytes + self.bytes_consumed + self.bytes_skipped + self.bytes_truncated
            == self.bytes_total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    LengthMismatch {
        tag: u8,
        expected: usize,
        found: usize,
    },
    ChunkOverrun {
        tag: u8,
        declared: usize,
        available: usize,
    },
    Resynchronized {
        resumed_at: u64,
        skipped: u64,
    },
    TruncatedTail {
        remaining: u64,
    },
    UnresolvedTag {
        tag: u8,
    },
    InvalidTextEncoding {
        tag: u8,
    },
}

/// A non-fatal condition, attributed to the stream offset where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub offset: u64,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(offset: u64, kind: DiagnosticKind) -> Self {
        Diagnostic { offset, kind }
    }

    /// Level the diagnostic is logged at.
    pub fn level(&self) -> Level {
        match self.kind {
            DiagnosticKind::UnresolvedTag { .. } | DiagnosticKind::InvalidTextEncoding { .. } => {
                Level::Info
            }
            _ => Level::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset {}: ", self.offset)?;
        match self.kind {
            DiagnosticKind::LengthMismatch {
                tag,
                expected,
                found,
            } => write!(
                f,
                "LengthMismatch - tag {:#04x} needs {} bytes, chunk declares {}",
                tag, expected, found
            ),
            DiagnosticKind::ChunkOverrun {
                tag,
                declared,
                available,
            } => write!(
                f,
                "ChunkOverrun - tag {:#04x} declares {} bytes, only {} left",
                tag, declared, available
            ),
            DiagnosticKind::Resynchronized {
                resumed_at,
                skipped,
            } => write!(
                f,
                "Resynchronized - skipped {} bytes, resuming at offset {}",
                skipped, resumed_at
            ),
            DiagnosticKind::TruncatedTail { remaining } => {
                write!(f, "TruncatedTail - {} trailing bytes left unparsed", remaining)
            }
            DiagnosticKind::UnresolvedTag { tag } => {
                write!(f, "UnresolvedTag - tag {:#04x} rendered as raw bytes", tag)
            }
            DiagnosticKind::InvalidTextEncoding { tag } => write!(
                f,
                "InvalidTextEncoding - tag {:#04x} is not valid UTF-8, decoded lossily",
                tag
            ),
        }
    }
}
