use crate::err::Result;
use crate::log_file_header::{FramingRules, LOG_HEADER_SIZE, LogFileHeader, LengthWidth, Magic};
use crate::utils::{ByteCursor, bytes};

use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Start,
    HeaderRead,
    Streaming,
    Done,
    Fatal,
}

/// One framed `(tag, length, payload)` unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'a> {
    /// Offset of the tag byte from the start of the stream.
    pub offset: u64,
    pub tag: u8,
    pub payload: &'a [u8],
    /// Tag + length field + payload.
    pub framed_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Chunk(RawChunk<'a>),
    /// The declared payload reaches past the end of the stream.
    ///
    /// Nothing is consumed and the reader stops; call [`FrameReader::resume_at`] to continue
    /// from another position.
    Overrun {
        offset: u64,
        tag: u8,
        declared: usize,
        available: usize,
    },
    /// Fewer bytes than a chunk header remain. Terminal.
    TruncatedTail { offset: u64, remaining: usize },
}

/// Cursor over one decompressed stream, yielding chunks.
///
/// The reader knows nothing about records: terminators are ordinary chunks to it.
#[derive(Debug)]
pub struct FrameReader<'a> {
    cursor: ByteCursor<'a>,
    state: FrameState,
    header: Option<LogFileHeader>,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        FrameReader {
            cursor: ByteCursor::new(data),
            state: FrameState::Start,
            header: None,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn header(&self) -> Option<&LogFileHeader> {
        self.header.as_ref()
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn stream_len(&self) -> usize {
        self.cursor.buf().len()
    }

    pub fn data(&self) -> &'a [u8] {
        self.cursor.buf()
    }

    fn framing(&self) -> FramingRules {
        // Only reachable once streaming, where the header is always set.
        self.header
            .map(|h| h.framing)
            .unwrap_or(FramingRules::new(LengthWidth::One))
    }

    /// `Start → HeaderRead → Streaming`.
    ///
    /// Returns `Ok(None)` for an empty stream, which is simply done. An unknown or incomplete
    /// magic moves the reader to `Fatal`.
    pub fn read_header(
        &mut self,
        framing_for: impl FnOnce(Magic) -> FramingRules,
    ) -> Result<Option<LogFileHeader>> {
        debug_assert_eq!(self.state, FrameState::Start);

        if self.cursor.is_eof() {
            self.state = FrameState::Done;
            return Ok(None);
        }

        let header = match LogFileHeader::from_bytes(self.cursor.buf(), framing_for) {
            Ok(header) => header,
            Err(e) => {
                self.state = FrameState::Fatal;
                return Err(e);
            }
        };

        self.cursor.set_pos(LOG_HEADER_SIZE, "log header")?;
        self.state = FrameState::HeaderRead;
        debug!(
            "Log header {} - tag width {}, length width {}",
            header.magic,
            FramingRules::TAG_WIDTH,
            header.framing.length_width.bytes()
        );

        self.header = Some(header);
        self.state = FrameState::Streaming;
        Ok(Some(header))
    }

    /// Reads the `(tag, declared length)` prefix of a chunk starting at `pos`, without moving.
    pub fn chunk_header_at(&self, pos: usize) -> Option<(u8, usize)> {
        let buf = self.cursor.buf();
        let tag = bytes::read_u8(buf, pos)?;
        let len_pos = pos.checked_add(FramingRules::TAG_WIDTH)?;
        let len = match self.framing().length_width {
            LengthWidth::One => usize::from(bytes::read_u8(buf, len_pos)?),
            LengthWidth::Two => usize::from(bytes::read_u16_be(buf, len_pos)?),
        };
        Some((tag, len))
    }

    /// Whether a whole chunk declaring `len` payload bytes at `pos` lies inside the stream.
    pub fn chunk_fits_at(&self, pos: usize, len: usize) -> bool {
        pos.checked_add(self.framing().chunk_header_size())
            .and_then(|p| p.checked_add(len))
            .is_some_and(|end| end <= self.stream_len())
    }

    /// Finds the first position in `from..` holding an in-bounds chunk accepted by `plausible`.
    ///
    /// The scan is bounded by the end of the stream and never moves the reader.
    pub fn scan_forward(
        &self,
        from: usize,
        mut plausible: impl FnMut(u8, usize) -> bool,
    ) -> Option<usize> {
        let last = self
            .stream_len()
            .checked_sub(self.framing().chunk_header_size())?;

        (from..=last).find(|&pos| {
            self.chunk_header_at(pos)
                .is_some_and(|(tag, len)| self.chunk_fits_at(pos, len) && plausible(tag, len))
        })
    }

    /// Moves the cursor to `pos` and continues streaming from there.
    ///
    /// Used by resynchronization, which may move back into bytes that were already framed.
    pub fn resume_at(&mut self, pos: usize) -> Result<()> {
        self.cursor.set_pos(pos, "resync position")?;
        self.state = FrameState::Streaming;
        Ok(())
    }

    /// Ends the stream at the current position.
    pub fn finish(&mut self) {
        self.state = FrameState::Done;
    }

    /// Reads the next frame, or `None` once the reader is done.
    pub fn next_frame(&mut self) -> Option<Frame<'a>> {
        if self.state != FrameState::Streaming {
            return None;
        }

        let offset = self.cursor.position();
        let header_size = self.framing().chunk_header_size();

        if self.cursor.is_eof() {
            trace!("Offset {}: clean end of stream", offset);
            self.state = FrameState::Done;
            return None;
        }

        if self.cursor.require(header_size, "chunk header").is_err() {
            self.state = FrameState::Done;
            return Some(Frame::TruncatedTail {
                offset,
                remaining: self.cursor.remaining(),
            });
        }

        // `require` above guarantees the prefix is readable.
        let mut chunk_cursor = self.cursor;
        let tag = chunk_cursor.u8_named("chunk tag").ok()?;
        let declared = match self.framing().length_width {
            LengthWidth::One => usize::from(chunk_cursor.u8_named("chunk length").ok()?),
            LengthWidth::Two => usize::from(chunk_cursor.u16_named("chunk length").ok()?),
        };

        if chunk_cursor.require(declared, "chunk payload").is_err() {
            self.state = FrameState::Done;
            return Some(Frame::Overrun {
                offset,
                tag,
                declared,
                available: chunk_cursor.remaining(),
            });
        }

        let payload = chunk_cursor.take_bytes(declared, "chunk payload").ok()?;
        self.cursor = chunk_cursor;

        trace!(
            "Offset {}: chunk tag {:#04x}, {} payload bytes",
            offset, tag, declared
        );

        Some(Frame::Chunk(RawChunk {
            offset,
            tag,
            payload,
            framed_len: header_size + declared,
        }))
    }
}
