//! Decoder for FortiNet binary `elog`/`tlog` firewall log records.
//!
//! A stream (already decompressed from its gzip/zstd container) starts with a two byte magic,
//! followed by tag-length-value chunks. Chunks are resolved against a static field dictionary,
//! decoded into typed values and grouped into records, which are rendered as `key=value` lines.
//!
//! ```
//! use fortilog::FortilogParser;
//!
//! let parser = FortilogParser::from_buffer(vec![0xEC, 0xCF, 0x01, 0x04, 0x7F, 0x00, 0x00, 0x01]);
//! let mut out = Vec::new();
//! let report = parser.dump_text(&mut out).unwrap();
//!
//! assert_eq!(out, b"src_ip=\"127.0.0.1\"\n");
//! assert_eq!(report.records_decoded, 1);
//! ```

#![forbid(unsafe_code)]
#![deny(unused_must_use)]

pub use decode_report::{DecodeReport, Diagnostic, DiagnosticKind};
pub use field_dictionary::{FieldDef, FieldType, IntWidth, RECORD_TERMINATOR};
pub use frame_reader::{Frame, FrameReader, FrameState, RawChunk};
pub use json_output::{JsonLinesOutput, record_to_json};
pub use log_file_header::{FramingRules, LengthWidth, LogFileHeader, Magic};
pub use log_parser::{FortilogParser, ParserSettings};
pub use log_record::{Field, FieldName, LogRecord};
pub use record_assembler::RecordAssembler;
pub use text_output::{RecordOutput, TextOutput, TimestampFormat, render};
pub use value_variant::{MacAddress, TypedValue};

pub mod decode_report;
pub mod err;
pub mod field_dictionary;
pub mod frame_reader;
mod json_output;
pub mod log_file_header;
mod log_parser;
pub mod log_record;
mod record_assembler;
mod text_output;
pub mod utils;
pub mod value_variant;

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;
    use std::sync::Once;

    static LOGGER_INIT: Once = Once::new();

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
