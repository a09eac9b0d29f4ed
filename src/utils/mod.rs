mod byte_cursor;
pub(crate) mod bytes;
mod hexdump;

pub(crate) use self::byte_cursor::ByteCursor;
pub use self::hexdump::hexdump;

use log::{Level, debug, log_enabled};
use std::cmp;

/// Number of bytes dumped around a corrupted region at debug level.
const DUMP_WINDOW: usize = 64;

/// Logs a hexdump of the bytes starting at `offset` (at most [`DUMP_WINDOW`] bytes).
///
/// This is a no-op unless debug logging is enabled.
pub(crate) fn dump_region(buf: &[u8], offset: usize) {
    if !log_enabled!(Level::Debug) {
        return;
    }

    let start = cmp::min(offset, buf.len());
    let end = cmp::min(start.saturating_add(DUMP_WINDOW), buf.len());
    debug!("\n{}", hexdump(&buf[start..end], start));
}

/// Lowercase hex of `bytes`, without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}
