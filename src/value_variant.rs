use crate::err::DecodeError;
use crate::field_dictionary::FieldType;
use crate::utils::to_hex;

use byteorder::{BigEndian, ByteOrder};
use std::borrow::Cow;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypedValue {
    UInt(u64),
    Int(i64),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Mac(MacAddress),
    /// Seconds since the Unix epoch.
    Timestamp(u32),
    String(String),
    /// Opaque payload, rendered as lowercase hex.
    Bytes(Vec<u8>),
}

impl TypedValue {
    /// Whether the text form of this value is written between double quotes.
    pub fn is_quoted(&self) -> bool {
        !matches!(
            self,
            TypedValue::UInt(_) | TypedValue::Int(_) | TypedValue::Timestamp(_)
        )
    }
}

/// Unquoted, unescaped text form.
impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::UInt(v) => write!(f, "{}", v),
            TypedValue::Int(v) => write!(f, "{}", v),
            TypedValue::Ipv4(v) => write!(f, "{}", v),
            TypedValue::Ipv6(v) => write!(f, "{}", v),
            TypedValue::Mac(v) => write!(f, "{}", v),
            TypedValue::Timestamp(v) => write!(f, "{}", v),
            TypedValue::String(v) => f.write_str(v),
            TypedValue::Bytes(v) => f.write_str(&to_hex(v)),
        }
    }
}

fn expect_width(field_type: FieldType, payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() != expected {
        return Err(DecodeError::LengthMismatch {
            field_type,
            expected,
            found: payload.len(),
        });
    }
    Ok(())
}

/// Decodes a string payload, replacing invalid UTF-8 sequences.
///
/// The flag is set when a replacement happened.
pub fn decode_text(payload: &[u8]) -> (String, bool) {
    match String::from_utf8_lossy(payload) {
        Cow::Borrowed(text) => (text.to_owned(), false),
        Cow::Owned(text) => (text, true),
    }
}

/// Decode `payload` as a value of `field_type`.
///
/// Pure: fixed-width types fail with [`DecodeError::LengthMismatch`] on a wrong width, strings
/// are decoded lossily and never fail.
pub fn decode(field_type: FieldType, payload: &[u8]) -> Result<TypedValue, DecodeError> {
    if let Some(width) = field_type.fixed_width() {
        expect_width(field_type, payload, width)?;
    }

    let value = match field_type {
        FieldType::UInt(w) => TypedValue::UInt(BigEndian::read_uint(payload, w.bytes())),
        FieldType::Int(w) => TypedValue::Int(BigEndian::read_int(payload, w.bytes())),
        FieldType::Ipv4 => {
            let octets: [u8; 4] = payload.try_into().map_err(|_| DecodeError::LengthMismatch {
                field_type,
                expected: 4,
                found: payload.len(),
            })?;
            TypedValue::Ipv4(Ipv4Addr::from(octets))
        }
        FieldType::Ipv6 => {
            let octets: [u8; 16] =
                payload.try_into().map_err(|_| DecodeError::LengthMismatch {
                    field_type,
                    expected: 16,
                    found: payload.len(),
                })?;
            TypedValue::Ipv6(Ipv6Addr::from(octets))
        }
        FieldType::MacAddress => {
            let octets: [u8; 6] = payload.try_into().map_err(|_| DecodeError::LengthMismatch {
                field_type,
                expected: 6,
                found: payload.len(),
            })?;
            TypedValue::Mac(MacAddress(octets))
        }
        FieldType::Timestamp => TypedValue::Timestamp(BigEndian::read_u32(payload)),
        FieldType::String => TypedValue::String(decode_text(payload).0),
        FieldType::RawBytes => TypedValue::Bytes(payload.to_vec()),
    };

    Ok(value)
}

/// Fallback for tags the dictionary does not know.
#[inline]
pub fn decode_raw(payload: &[u8]) -> TypedValue {
    TypedValue::Bytes(payload.to_vec())
}
