use crate::err::Result;
use crate::log_parser::ParserSettings;
use crate::log_record::{Field, LogRecord};
use crate::utils::to_hex;
use crate::value_variant::TypedValue;

use jiff::Timestamp;
use std::fmt::Write as FmtWrite;
use std::io::Write;

/// Sink for assembled records.
pub trait RecordOutput {
    fn visit_record(&mut self, record: &LogRecord) -> Result<()>;

    /// Called once after the last record of a stream.
    fn finish(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Decimal seconds since the epoch.
    #[default]
    EpochSeconds,
    /// RFC 3339 in UTC, e.g. `2024-02-14T13:50:04Z`.
    Rfc3339,
}

fn write_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
}

fn write_value(out: &mut String, value: &TypedValue, timestamps: TimestampFormat) {
    // Writing into a `String` cannot fail.
    match value {
        TypedValue::Timestamp(secs) if timestamps == TimestampFormat::Rfc3339 => {
            match Timestamp::from_second(i64::from(*secs)) {
                Ok(ts) => {
                    let _ = write!(out, "{}", ts);
                }
                Err(_) => {
                    let _ = write!(out, "{}", secs);
                }
            }
        }
        TypedValue::String(s) => {
            out.push('"');
            write_escaped(out, s);
            out.push('"');
        }
        // addresses and hex never need escaping
        other if other.is_quoted() => {
            let _ = write!(out, "\"{}\"", other);
        }
        other => {
            let _ = write!(out, "{}", other);
        }
    }
}

fn write_field(out: &mut String, field: &Field, timestamps: TimestampFormat) {
    let _ = write!(out, "{}=", field.name);
    if field.name.is_unknown() {
        if let TypedValue::Bytes(bytes) = &field.value {
            out.push_str(&to_hex(bytes));
            return;
        }
    }
    write_value(out, &field.value, timestamps);
}

/// Appends the `name=value` line for `record` to `out`, without a line terminator.
pub fn render_into(out: &mut String, record: &LogRecord, timestamps: TimestampFormat) {
    for (i, field) in record.fields().iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_field(out, field, timestamps);
    }
}

/// Renders `record` as one `name=value` line, without a line terminator.
pub fn render(record: &LogRecord, timestamps: TimestampFormat) -> String {
    let mut out = String::with_capacity(record.len() * 24);
    render_into(&mut out, record, timestamps);
    out
}

/// Writes one text line per record.
pub struct TextOutput<W: Write> {
    writer: W,
    line: String,
    timestamps: TimestampFormat,
}

impl<W: Write> TextOutput<W> {
    pub fn with_writer(writer: W, settings: &ParserSettings) -> Self {
        TextOutput {
            writer,
            line: String::new(),
            timestamps: settings.get_timestamp_format(),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordOutput for TextOutput<W> {
    fn visit_record(&mut self, record: &LogRecord) -> Result<()> {
        self.line.clear();
        render_into(&mut self.line, record, self.timestamps);
        self.line.push('\n');
        self.writer.write_all(self.line.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_record::FieldName;
    use crate::value_variant::MacAddress;
    use pretty_assertions::assert_eq;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn record(fields: Vec<(FieldName, TypedValue)>) -> LogRecord {
        let mut record = LogRecord::new(2);
        for (name, value) in fields {
            let tag = match name {
                FieldName::Unknown(tag) => tag,
                FieldName::Known(_) => 0x01,
            };
            record.push(Field { tag, name, value });
        }
        record
    }

    #[test]
    fn test_renders_every_value_kind() {
        let r = record(vec![
            (
                FieldName::Known("src_ip"),
                TypedValue::Ipv4(Ipv4Addr::new(10, 0, 0, 1)),
            ),
            (FieldName::Known("dst_ip6"), TypedValue::Ipv6(Ipv6Addr::LOCALHOST)),
            (
                FieldName::Known("src_mac"),
                TypedValue::Mac(MacAddress([0, 0x09, 0x0f, 0, 0, 0xff])),
            ),
            (FieldName::Known("dst_port"), TypedValue::UInt(443)),
            (FieldName::Known("tz_offset"), TypedValue::Int(-120)),
            (FieldName::Known("event_time"), TypedValue::Timestamp(1_707_918_604)),
            (FieldName::Known("action"), TypedValue::String("accept".into())),
            (FieldName::Known("zbuf"), TypedValue::Bytes(vec![0xca, 0xfe])),
            (FieldName::Unknown(0x7f), TypedValue::Bytes(vec![0xbe, 0xef])),
        ]);

        assert_eq!(
            render(&r, TimestampFormat::EpochSeconds),
            "src_ip=\"10.0.0.1\" dst_ip6=\"::1\" src_mac=\"00:09:0f:00:00:ff\" dst_port=443 \
             tz_offset=-120 event_time=1707918604 action=\"accept\" zbuf=\"cafe\" unknown_7f=beef"
        );
    }

    #[test]
    fn test_escapes_quotes_and_line_breaks() {
        let r = record(vec![(
            FieldName::Known("msg"),
            TypedValue::String("say \"hi\"\\\nbye".into()),
        )]);
        assert_eq!(
            render(&r, TimestampFormat::EpochSeconds),
            r#"msg="say \"hi\"\\\nbye""#
        );
    }

    #[test]
    fn test_rfc3339_timestamps() {
        let r = record(vec![(
            FieldName::Known("event_time"),
            TypedValue::Timestamp(1_707_918_604),
        )]);
        assert_eq!(
            render(&r, TimestampFormat::Rfc3339),
            "event_time=2024-02-14T13:50:04Z"
        );
    }

    #[test]
    fn test_empty_unknown_payload() {
        let r = record(vec![(FieldName::Unknown(0xa0), TypedValue::Bytes(vec![]))]);
        assert_eq!(render(&r, TimestampFormat::EpochSeconds), "unknown_a0=");
    }

    #[test]
    fn test_text_output_writes_lines() {
        let r = record(vec![(FieldName::Known("proto"), TypedValue::UInt(6))]);
        let mut output = TextOutput::with_writer(Vec::new(), &ParserSettings::default());
        output.visit_record(&r).unwrap();
        output.visit_record(&r).unwrap();
        output.finish().unwrap();
        assert_eq!(output.into_writer(), b"proto=6\nproto=6\n".to_vec());
    }
}
