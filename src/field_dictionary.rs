//! The process-wide tag → (name, type) table.
//!
//! Both header variants share one dictionary. The table is compiled in and indexed once on first
//! use; nothing mutates it afterwards, so it can be shared freely between threads decoding
//! different files.

use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Reserved tag closing the current record.
pub const RECORD_TERMINATOR: u8 = 0x00;

/// Width in bytes of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IntWidth {
    W8 = 1,
    W16 = 2,
    W32 = 4,
    W64 = 8,
}

impl IntWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn bits(self) -> usize {
        self.bytes() * 8
    }
}

/// Value type of a dictionary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FieldType {
    UInt(IntWidth),
    Int(IntWidth),
    Ipv4,
    Ipv6,
    MacAddress,
    /// Unsigned seconds since the Unix epoch.
    Timestamp,
    String,
    RawBytes,
}

impl FieldType {
    /// Exact payload width, `None` for length-prefixed types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldType::UInt(w) | FieldType::Int(w) => Some(w.bytes()),
            FieldType::Ipv4 => Some(4),
            FieldType::Ipv6 => Some(16),
            FieldType::MacAddress => Some(6),
            FieldType::Timestamp => Some(4),
            FieldType::String | FieldType::RawBytes => None,
        }
    }

    /// Whether a chunk declaring `len` payload bytes can hold a value of this type.
    #[inline]
    pub fn accepts_len(self, len: usize) -> bool {
        self.fixed_width().is_none_or(|w| w == len)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::UInt(w) => write!(f, "uint{}", w.bits()),
            FieldType::Int(w) => write!(f, "int{}", w.bits()),
            FieldType::Ipv4 => f.write_str("ipv4"),
            FieldType::Ipv6 => f.write_str("ipv6"),
            FieldType::MacAddress => f.write_str("mac"),
            FieldType::Timestamp => f.write_str("timestamp"),
            FieldType::String => f.write_str("string"),
            FieldType::RawBytes => f.write_str("bytes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    pub tag: u8,
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn field(tag: u8, name: &'static str, field_type: FieldType) -> FieldDef {
    FieldDef {
        tag,
        name,
        field_type,
    }
}

use FieldType::*;
use IntWidth::*;

static FIELDS: &[FieldDef] = &[
    // traffic
    field(0x01, "src_ip", Ipv4),
    field(0x02, "dst_ip", Ipv4),
    field(0x03, "src_port", UInt(W16)),
    field(0x04, "dst_port", UInt(W16)),
    field(0x05, "proto", UInt(W8)),
    field(0x06, "action", String),
    field(0x07, "policy_id", UInt(W32)),
    field(0x08, "session_id", UInt(W32)),
    field(0x09, "event_time", Timestamp),
    field(0x0a, "duration", UInt(W32)),
    field(0x0b, "sent_bytes", UInt(W64)),
    field(0x0c, "rcvd_bytes", UInt(W64)),
    field(0x0d, "sent_pkts", UInt(W32)),
    field(0x0e, "rcvd_pkts", UInt(W32)),
    field(0x0f, "src_ip6", Ipv6),
    field(0x10, "dst_ip6", Ipv6),
    field(0x11, "src_mac", MacAddress),
    field(0x12, "dst_mac", MacAddress),
    field(0x13, "src_intf", String),
    field(0x14, "dst_intf", String),
    field(0x15, "service", String),
    field(0x16, "app", String),
    field(0x17, "app_cat", String),
    field(0x18, "trans_ip", Ipv4),
    field(0x19, "trans_port", UInt(W16)),
    field(0x1a, "log_id", UInt(W32)),
    field(0x1b, "level", String),
    field(0x1c, "type", String),
    field(0x1d, "subtype", String),
    // minutes east of UTC
    field(0x1e, "tz_offset", Int(W16)),
    field(0x1f, "msg", String),
    // device / container header (tlc layout)
    field(0x20, "devid", String),
    field(0x21, "devname", String),
    field(0x22, "vdom", String),
    field(0x23, "devtype", String),
    field(0x24, "logtype", UInt(W16)),
    field(0x25, "tmzone", String),
    field(0x26, "fazid", String),
    field(0x27, "dev_src_ip", Ipv4),
    field(0x28, "num_logs", UInt(W32)),
    field(0x29, "unzip_len", UInt(W32)),
    field(0x2a, "incr_zip", UInt(W8)),
    field(0x2b, "prefix", RawBytes),
    field(0x2c, "zbuf", RawBytes),
    // identity / web
    field(0x2d, "user", String),
    field(0x2e, "group", String),
    field(0x2f, "hostname", String),
    field(0x30, "url", String),
    field(0x31, "crscore", UInt(W32)),
    field(0x32, "craction", UInt(W32)),
    // dBm, negative
    field(0x33, "signal", Int(W8)),
    // nanoseconds since the epoch
    field(0x34, "eventtime_ns", Int(W64)),
    field(0x35, "pol_uuid", RawBytes),
    field(0x36, "threat_weight", Int(W32)),
];

static INDEX: LazyLock<[Option<&'static FieldDef>; 256]> = LazyLock::new(|| {
    let mut index = [None; 256];
    for def in FIELDS {
        index[usize::from(def.tag)] = Some(def);
    }
    index
});

/// Resolve `tag`. `None` is not an error: callers degrade to raw bytes.
#[inline]
pub fn lookup(tag: u8) -> Option<&'static FieldDef> {
    INDEX[usize::from(tag)]
}

#[inline]
pub fn is_terminator(tag: u8) -> bool {
    tag == RECORD_TERMINATOR
}

/// Every defined field, in tag order.
pub fn fields() -> &'static [FieldDef] {
    FIELDS
}
