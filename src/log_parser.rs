use crate::decode_report::DecodeReport;
use crate::err::{FortilogError, Result};
use crate::log_file_header::{FramingRules, LengthWidth, Magic};
use crate::record_assembler::RecordAssembler;
use crate::text_output::{RecordOutput, TextOutput, TimestampFormat};

use log::{debug, info, log};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    /// Framing overrides, `None` keeps the version default.
    eccf_length_width: Option<LengthWidth>,
    aa01_length_width: Option<LengthWidth>,
    resynchronize: bool,
    timestamp_format: TimestampFormat,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            eccf_length_width: None,
            aa01_length_width: None,
            resynchronize: true,
            timestamp_format: TimestampFormat::default(),
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// Sets the width of the length field for streams announced by `magic`.
    pub fn length_width(mut self, magic: Magic, width: LengthWidth) -> Self {
        match magic {
            Magic::Eccf => self.eccf_length_width = Some(width),
            Magic::Aa01 => self.aa01_length_width = Some(width),
        }
        self
    }

    /// When off, the first corrupt chunk ends the stream as a truncated tail.
    pub fn resynchronize(mut self, resynchronize: bool) -> Self {
        self.resynchronize = resynchronize;
        self
    }

    pub fn timestamp_format(mut self, timestamp_format: TimestampFormat) -> Self {
        self.timestamp_format = timestamp_format;
        self
    }

    pub fn framing_for(&self, magic: Magic) -> FramingRules {
        let width = match magic {
            Magic::Eccf => self.eccf_length_width,
            Magic::Aa01 => self.aa01_length_width,
        };

        width
            .map(FramingRules::new)
            .unwrap_or_else(|| magic.default_framing())
    }

    pub fn should_resynchronize(&self) -> bool {
        self.resynchronize
    }

    pub fn get_timestamp_format(&self) -> TimestampFormat {
        self.timestamp_format
    }
}

/// Decoder for one already decompressed elog/tlog stream.
///
/// The parser owns the bytes; every call to [`FortilogParser::records`] starts a fresh pass.
#[derive(Debug, Clone)]
pub struct FortilogParser {
    data: Vec<u8>,
    config: ParserSettings,
}

impl FortilogParser {
    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        FortilogParser {
            data: buffer,
            config: ParserSettings::default(),
        }
    }

    /// Reads `reader` to the end.
    pub fn from_read<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::from_buffer(data))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| FortilogError::FailedToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_read(f)
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.config
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Starts a pass over the stream. Fails with the fatal header error, if any.
    pub fn records(&self) -> Result<RecordAssembler<'_>> {
        RecordAssembler::new(&self.data, &self.config)
    }

    /// Decodes the whole stream into `output`, forwarding diagnostics to the logger.
    ///
    /// Only a fatal header error (or a failing output) is returned as an error; everything
    /// else ends up in the returned report.
    pub fn dump<O: RecordOutput>(&self, output: &mut O) -> Result<DecodeReport> {
        let mut records = self.records()?;

        if let Some(header) = records.header() {
            debug!(
                "Decoding {} bytes with header {}",
                self.data.len(),
                header.magic
            );
        }

        while let Some(record) = records.next() {
            for diagnostic in records.drain_diagnostics() {
                log!(diagnostic.level(), "{}", diagnostic);
            }
            output.visit_record(&record)?;
        }

        for diagnostic in records.drain_diagnostics() {
            log!(diagnostic.level(), "{}", diagnostic);
        }
        output.finish()?;

        let report = records.into_report();
        info!(
            "Decoded {} records ({} skipped, {} resyncs, {} bytes truncated)",
            report.records_decoded,
            report.records_skipped,
            report.resync_events,
            report.bytes_truncated
        );

        Ok(report)
    }

    /// Shorthand for [`FortilogParser::dump`] into a [`TextOutput`].
    pub fn dump_text<W: Write>(&self, writer: W) -> Result<DecodeReport> {
        let mut output = TextOutput::with_writer(writer, &self.config);
        self.dump(&mut output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_env_logger_initialized;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump_text_single_record() {
        ensure_env_logger_initialized();
        let parser =
            FortilogParser::from_buffer(vec![0xEC, 0xCF, 0x01, 0x04, 0x7F, 0x00, 0x00, 0x01]);

        let mut out = Vec::new();
        let report = parser.dump_text(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "src_ip=\"127.0.0.1\"\n");
        assert_eq!(report.records_decoded, 1);
        assert_eq!(report.magic, Some(Magic::Eccf));
        assert!(report.is_balanced());
    }

    #[test]
    fn test_fatal_header_writes_nothing() {
        ensure_env_logger_initialized();
        let parser = FortilogParser::from_buffer(vec![0x1F, 0x8B, 0x08, 0x00]);

        let mut out = Vec::new();
        let err = parser.dump_text(&mut out).unwrap_err();
        assert!(matches!(err, FortilogError::UnknownMagic { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_length_width_override() {
        ensure_env_logger_initialized();
        // ECCF stream framed with 2-byte lengths.
        let data = vec![0xEC, 0xCF, 0x05, 0x00, 0x01, 0x11];
        let settings = ParserSettings::new().length_width(Magic::Eccf, LengthWidth::Two);
        let parser = FortilogParser::from_buffer(data).with_configuration(settings);

        let mut out = Vec::new();
        parser.dump_text(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "proto=17\n");
    }

    #[test]
    fn test_from_path_reports_missing_file() {
        let err = FortilogParser::from_path("/definitely/not/here.log").unwrap_err();
        assert!(matches!(err, FortilogError::FailedToOpenFile { .. }));
    }

    #[test]
    fn test_default_framing() {
        let settings = ParserSettings::default();
        assert_eq!(
            settings.framing_for(Magic::Aa01),
            FramingRules::new(LengthWidth::Two)
        );
        assert_eq!(
            settings.framing_for(Magic::Eccf),
            FramingRules::new(LengthWidth::One)
        );
        assert!(settings.should_resynchronize());
    }
}
