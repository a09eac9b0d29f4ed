use crate::err::{FortilogError, Result};

use serde::Serialize;
use std::fmt;

pub const LOG_HEADER_SIZE: usize = 2;

/// Layout variant announced by the first two bytes of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Magic {
    /// `0xECCF`, the elog layout.
    Eccf,
    /// `0xAA01`, the tlc layout.
    Aa01,
}

impl Magic {
    pub fn from_bytes(magic: [u8; 2]) -> Option<Magic> {
        match magic {
            [0xEC, 0xCF] => Some(Magic::Eccf),
            [0xAA, 0x01] => Some(Magic::Aa01),
            _ => None,
        }
    }

    pub fn bytes(self) -> [u8; 2] {
        match self {
            Magic::Eccf => [0xEC, 0xCF],
            Magic::Aa01 => [0xAA, 0x01],
        }
    }

    /// Framing used when the caller does not override it.
    pub fn default_framing(self) -> FramingRules {
        match self {
            Magic::Eccf => FramingRules::new(LengthWidth::One),
            Magic::Aa01 => FramingRules::new(LengthWidth::Two),
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [hi, lo] = self.bytes();
        write!(f, "0x{:02X}{:02X}", hi, lo)
    }
}

/// Width of the big-endian length field that follows each tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LengthWidth {
    One = 1,
    Two = 2,
}

impl LengthWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }
}

/// Per-version chunk framing: a 1-byte tag followed by a length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FramingRules {
    pub length_width: LengthWidth,
}

impl FramingRules {
    pub const TAG_WIDTH: usize = 1;

    pub const fn new(length_width: LengthWidth) -> Self {
        FramingRules { length_width }
    }

    /// Size of the tag + length prefix of every chunk.
    #[inline]
    pub fn chunk_header_size(&self) -> usize {
        Self::TAG_WIDTH + self.length_width.bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogFileHeader {
    pub magic: Magic,
    pub framing: FramingRules,
}

impl LogFileHeader {
    /// Parses the magic at the start of `data`, resolving framing through `framing_for`.
    pub fn from_bytes(
        data: &[u8],
        framing_for: impl FnOnce(Magic) -> FramingRules,
    ) -> Result<LogFileHeader> {
        let magic: [u8; LOG_HEADER_SIZE] = match data.get(..LOG_HEADER_SIZE) {
            Some(bytes) => [bytes[0], bytes[1]],
            None => return Err(FortilogError::MissingHeader { have: data.len() }),
        };

        let magic = Magic::from_bytes(magic).ok_or(FortilogError::UnknownMagic { magic })?;

        Ok(LogFileHeader {
            magic,
            framing: framing_for(magic),
        })
    }
}
