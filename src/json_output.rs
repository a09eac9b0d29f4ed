use crate::err::Result;
use crate::log_parser::ParserSettings;
use crate::log_record::LogRecord;
use crate::text_output::{RecordOutput, TimestampFormat};
use crate::value_variant::TypedValue;

use jiff::Timestamp;
use serde_json::{Map, Value, json};
use std::io::Write;

fn value_to_json(value: &TypedValue, timestamps: TimestampFormat) -> Value {
    match value {
        TypedValue::UInt(v) => json!(v),
        TypedValue::Int(v) => json!(v),
        TypedValue::Timestamp(secs) => match timestamps {
            TimestampFormat::EpochSeconds => json!(secs),
            TimestampFormat::Rfc3339 => Timestamp::from_second(i64::from(*secs))
                .map(|ts| Value::String(ts.to_string()))
                .unwrap_or_else(|_| json!(secs)),
        },
        TypedValue::String(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Builds the JSON object for `record`.
///
/// Keys keep stream order. A repeated name becomes an array of its values, in order.
pub fn record_to_json(record: &LogRecord, timestamps: TimestampFormat) -> Value {
    let mut map = Map::new();

    for field in record.fields() {
        let key = field.name.to_string();
        let value = value_to_json(&field.value, timestamps);

        match map.get_mut(&key) {
            None => {
                map.insert(key, value);
            }
            // field values are never arrays themselves, so an array is an earlier duplicate
            Some(Value::Array(values)) => {
                values.push(value);
            }
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }

    Value::Object(map)
}

/// Writes one JSON object per line.
pub struct JsonLinesOutput<W: Write> {
    writer: W,
    timestamps: TimestampFormat,
}

impl<W: Write> JsonLinesOutput<W> {
    pub fn with_writer(writer: W, settings: &ParserSettings) -> Self {
        JsonLinesOutput {
            writer,
            timestamps: settings.get_timestamp_format(),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordOutput for JsonLinesOutput<W> {
    fn visit_record(&mut self, record: &LogRecord) -> Result<()> {
        let value = record_to_json(record, self.timestamps);
        serde_json::to_writer(&mut self.writer, &value)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
