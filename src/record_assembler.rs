use crate::decode_report::{DecodeReport, Diagnostic, DiagnosticKind};
use crate::err::{DecodeError, Result};
use crate::field_dictionary::{self, FieldType};
use crate::frame_reader::{Frame, FrameReader, RawChunk};
use crate::log_file_header::{LOG_HEADER_SIZE, LogFileHeader};
use crate::log_parser::ParserSettings;
use crate::log_record::{Field, FieldName, LogRecord};
use crate::utils::dump_region;
use crate::value_variant::{self, TypedValue};

use log::{debug, log, trace};
use std::collections::VecDeque;
use std::collections::vec_deque::Drain;

/// Diagnostics kept for the caller before the oldest ones are logged and dropped.
const MAX_PENDING_DIAGNOSTICS: usize = 1024;

/// Whether `(tag, len)` at some position could start a real chunk.
///
/// Only dictionary fields qualify: unknown tags and the terminator are far too common in
/// corrupted data to resume on. Bounds are checked by the frame reader.
fn is_plausible_chunk(tag: u8, len: usize) -> bool {
    !field_dictionary::is_terminator(tag)
        && field_dictionary::lookup(tag).is_some_and(|def| def.field_type.accepts_len(len))
}

/// Turns the chunk sequence of one stream into records.
///
/// This is a single-pass iterator. Corruption never surfaces as an error: the damaged record is
/// dropped, the reader is resynchronized and the condition is queued as a [`Diagnostic`].
#[derive(Debug)]
pub struct RecordAssembler<'a> {
    reader: FrameReader<'a>,
    resynchronize: bool,
    current: Option<LogRecord>,
    report: DecodeReport,
    diagnostics: VecDeque<Diagnostic>,
    exhausted: bool,
}

impl<'a> RecordAssembler<'a> {
    /// Reads the stream header. Fails only on a fatal header.
    pub fn new(data: &'a [u8], settings: &ParserSettings) -> Result<Self> {
        let mut reader = FrameReader::new(data);
        let mut report = DecodeReport::new(data.len());

        let header = reader.read_header(|magic| settings.framing_for(magic))?;
        if let Some(header) = header {
            report.magic = Some(header.magic);
            report.header_bytes = LOG_HEADER_SIZE as u64;
        }

        Ok(RecordAssembler {
            reader,
            resynchronize: settings.should_resynchronize(),
            current: None,
            report,
            diagnostics: VecDeque::new(),
            exhausted: header.is_none(),
        })
    }

    pub fn header(&self) -> Option<&LogFileHeader> {
        self.reader.header()
    }

    pub fn report(&self) -> &DecodeReport {
        &self.report
    }

    pub fn into_report(self) -> DecodeReport {
        self.report
    }

    /// Diagnostics raised since the last drain, oldest first.
    pub fn drain_diagnostics(&mut self) -> Drain<'_, Diagnostic> {
        self.diagnostics.drain(..)
    }

    fn diagnose(&mut self, offset: u64, kind: DiagnosticKind) {
        if self.diagnostics.len() >= MAX_PENDING_DIAGNOSTICS {
            if let Some(oldest) = self.diagnostics.pop_front() {
                log!(oldest.level(), "{}", oldest);
            }
        }
        self.diagnostics.push_back(Diagnostic::new(offset, kind));
    }

    fn push_field(&mut self, offset: u64, field: Field) {
        self.current
            .get_or_insert_with(|| LogRecord::new(offset))
            .push(field);
    }

    /// Closes the current record, returning it unless it is empty.
    fn finish_record(&mut self) -> Option<LogRecord> {
        let record = self.current.take().filter(|r| !r.is_empty())?;
        self.report.records_decoded += 1;
        trace!(
            "Offset {}: record with {} fields",
            record.offset,
            record.len()
        );
        Some(record)
    }

    fn discard_record(&mut self) {
        if let Some(record) = self.current.take().filter(|r| !r.is_empty()) {
            debug!(
                "Offset {}: discarding partial record with {} fields",
                record.offset,
                record.len()
            );
            self.report.records_skipped += 1;
        }
    }

    fn decode_chunk(&mut self, chunk: &RawChunk<'a>) -> std::result::Result<Field, DecodeError> {
        let Some(def) = field_dictionary::lookup(chunk.tag) else {
            self.report.unresolved_tags += 1;
            self.diagnose(chunk.offset, DiagnosticKind::UnresolvedTag { tag: chunk.tag });
            return Ok(Field {
                tag: chunk.tag,
                name: FieldName::Unknown(chunk.tag),
                value: value_variant::decode_raw(chunk.payload),
            });
        };

        let value = match def.field_type {
            FieldType::String => {
                let (text, lossy) = value_variant::decode_text(chunk.payload);
                if lossy {
                    self.report.lossy_strings += 1;
                    self.diagnose(
                        chunk.offset,
                        DiagnosticKind::InvalidTextEncoding { tag: chunk.tag },
                    );
                }
                TypedValue::String(text)
            }
            field_type => value_variant::decode(field_type, chunk.payload)?,
        };

        Ok(Field {
            tag: chunk.tag,
            name: FieldName::Known(def.name),
            value,
        })
    }

    /// Stops decoding, reporting everything from `offset` on as a truncated tail.
    fn truncate_at(&mut self, offset: u64) {
        let remaining = self.report.bytes_total.saturating_sub(offset);
        self.report.bytes_truncated += remaining;
        self.report.truncated_at = Some(offset);
        self.diagnose(offset, DiagnosticKind::TruncatedTail { remaining });
        self.discard_record();
        self.reader.finish();
    }

    /// Drops the record holding the corrupt chunk at `offset` and scans for the next plausible
    /// chunk after it.
    fn resynchronize_after(&mut self, offset: u64) {
        // The corrupt chunk is lost with its record, even when it was the first field.
        self.current = None;
        self.report.records_skipped += 1;
        dump_region(self.reader.data(), offset as usize);

        if !self.resynchronize {
            self.truncate_at(offset);
            return;
        }

        let from = offset as usize + 1;
        let Some(pos) = self.reader.scan_forward(from, is_plausible_chunk) else {
            debug!("Offset {}: no plausible chunk until end of stream", offset);
            self.truncate_at(offset);
            return;
        };

        if self.reader.resume_at(pos).is_err() {
            self.truncate_at(offset);
            return;
        }

        let skipped = pos as u64 - offset;
        self.report.bytes_skipped += skipped;
        self.report.resync_events += 1;
        self.diagnose(
            offset,
            DiagnosticKind::Resynchronized {
                resumed_at: pos as u64,
                skipped,
            },
        );
    }
}

impl<'a> Iterator for RecordAssembler<'a> {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        if self.exhausted {
            return None;
        }

        loop {
            match self.reader.next_frame() {
                None => {
                    self.exhausted = true;
                    return self.finish_record();
                }
                Some(Frame::Chunk(chunk)) if field_dictionary::is_terminator(chunk.tag) => {
                    self.report.bytes_consumed += chunk.framed_len as u64;
                    if let Some(record) = self.finish_record() {
                        return Some(record);
                    }
                }
                Some(Frame::Chunk(chunk)) => match self.decode_chunk(&chunk) {
                    Ok(field) => {
                        self.report.bytes_consumed += chunk.framed_len as u64;
                        self.push_field(chunk.offset, field);
                    }
                    Err(DecodeError::LengthMismatch {
                        expected, found, ..
                    }) => {
                        self.diagnose(
                            chunk.offset,
                            DiagnosticKind::LengthMismatch {
                                tag: chunk.tag,
                                expected,
                                found,
                            },
                        );
                        self.resynchronize_after(chunk.offset);
                    }
                },
                Some(Frame::Overrun {
                    offset,
                    tag,
                    declared,
                    available,
                }) => {
                    self.diagnose(
                        offset,
                        DiagnosticKind::ChunkOverrun {
                            tag,
                            declared,
                            available,
                        },
                    );
                    self.resynchronize_after(offset);
                }
                Some(Frame::TruncatedTail { offset, .. }) => {
                    self.truncate_at(offset);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assemble(data: &[u8]) -> (Vec<LogRecord>, DecodeReport, Vec<Diagnostic>) {
        let mut assembler = RecordAssembler::new(data, &ParserSettings::default()).unwrap();
        let mut records = vec![];
        let mut diagnostics = vec![];
        while let Some(record) = assembler.next() {
            diagnostics.extend(assembler.drain_diagnostics());
            records.push(record);
        }
        diagnostics.extend(assembler.drain_diagnostics());
        let report = assembler.into_report();
        assert!(report.is_balanced(), "unbalanced report {:?}", report);
        (records, report, diagnostics)
    }

    #[test]
    fn test_terminator_splits_records() {
        let data = [
            0xEC, 0xCF, //
            0x05, 0x01, 0x06, // proto=6
            0x00, 0x00, //
            0x03, 0x02, 0x01, 0xBB, // src_port=443
            0x00, 0x00,
        ];
        let (records, report, diagnostics) = assemble(&data);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, 2);
        assert_eq!(records[1].offset, 7);
        assert_eq!(records[1].get("src_port"), Some(&value_variant::TypedValue::UInt(443)));
        assert_eq!(report.records_decoded, 2);
        assert_eq!(report.bytes_consumed, 11);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_zero_padding_produces_nothing() {
        let (records, report, _) = assemble(&[0xEC, 0xCF, 0, 0, 0, 0, 0, 0]);
        assert!(records.is_empty());
        assert_eq!(report.records_decoded, 0);
        assert!(!report.is_truncated());
    }

    #[test]
    fn test_unknown_tag_degrades_to_raw() {
        let data = [0xEC, 0xCF, 0x7F, 0x02, 0xBE, 0xEF, 0x05, 0x01, 0x11];
        let (records, report, diagnostics) = assemble(&data);
        assert_eq!(records.len(), 1);
        let fields = records[0].fields();
        assert_eq!(fields[0].name, FieldName::Unknown(0x7F));
        assert_eq!(
            fields[0].value,
            value_variant::TypedValue::Bytes(vec![0xBE, 0xEF])
        );
        assert_eq!(fields[1].name, FieldName::Known("proto"));
        assert_eq!(report.unresolved_tags, 1);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::new(2, DiagnosticKind::UnresolvedTag { tag: 0x7F })]
        );
    }

    #[test]
    fn test_length_mismatch_resynchronizes() {
        let data = [
            0xEC, 0xCF, //
            0x01, 0x03, 0x7F, 0x00, 0x00, // src_ip with 3 bytes
            0x01, 0x04, 0x7F, 0x00, 0x00, 0x01,
        ];
        let (records, report, diagnostics) = assemble(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].offset, 7);
        assert_eq!(report.bytes_skipped, 5);
        assert_eq!(report.resync_events, 1);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(
            diagnostics,
            vec![
                Diagnostic::new(
                    2,
                    DiagnosticKind::LengthMismatch {
                        tag: 0x01,
                        expected: 4,
                        found: 3,
                    }
                ),
                Diagnostic::new(
                    2,
                    DiagnosticKind::Resynchronized {
                        resumed_at: 7,
                        skipped: 5,
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_overrun_without_candidate_truncates() {
        let data = [0xEC, 0xCF, 0x01, 0x04, 0x7F, 0x00, 0x00];
        let (records, report, diagnostics) = assemble(&data);
        assert!(records.is_empty());
        assert_eq!(report.truncated_at, Some(2));
        assert_eq!(report.bytes_truncated, 5);
        assert_eq!(
            diagnostics.last(),
            Some(&Diagnostic::new(
                2,
                DiagnosticKind::TruncatedTail { remaining: 5 }
            ))
        );
    }

    #[test]
    fn test_pending_record_is_dropped_on_truncated_tail() {
        let data = [0xEC, 0xCF, 0x05, 0x01, 0x06, 0x05];
        let (records, report, _) = assemble(&data);
        assert!(records.is_empty());
        assert_eq!(report.records_skipped, 1);
        assert_eq!(report.bytes_consumed, 3);
        assert_eq!(report.bytes_truncated, 1);
    }

    #[test]
    fn test_resync_can_be_disabled() {
        let data = [
            0xEC, 0xCF, //
            0x01, 0x03, 0x7F, 0x00, 0x00, //
            0x01, 0x04, 0x7F, 0x00, 0x00, 0x01,
        ];
        let settings = ParserSettings::default().resynchronize(false);
        let mut assembler = RecordAssembler::new(&data, &settings).unwrap();
        assert_eq!(assembler.next(), None);
        let report = assembler.into_report();
        assert_eq!(report.truncated_at, Some(2));
        assert_eq!(report.bytes_truncated, 11);
        assert!(report.is_balanced());
    }

    #[test]
    fn test_lossy_string_is_reported() {
        let data = [0xEC, 0xCF, 0x06, 0x02, 0xC3, 0x28];
        let (records, report, diagnostics) = assemble(&data);
        assert_eq!(records.len(), 1);
        assert_eq!(report.lossy_strings, 1);
        assert_eq!(
            diagnostics,
            vec![Diagnostic::new(
                2,
                DiagnosticKind::InvalidTextEncoding { tag: 0x06 }
            )]
        );
    }

    #[test]
    fn test_valid_multibyte_string_is_not_reported() {
        let data = [0xEC, 0xCF, 0x06, 0x02, 0xC3, 0xA9];
        let (records, report, diagnostics) = assemble(&data);
        assert_eq!(
            records[0].get("action"),
            Some(&TypedValue::String("\u{e9}".to_string()))
        );
        assert_eq!(report.lossy_strings, 0);
        assert!(diagnostics.is_empty());
    }
}
