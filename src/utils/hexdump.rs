use std::cmp;
use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Formats `data` as a canonical hex display (`hexdump -C` style).
///
/// Each line holds the absolute address (`base_offset` + position) in hexadecimal, sixteen
/// space-separated two column bytes, and the same bytes as printable ASCII between `|` characters.
pub fn hexdump(data: &[u8], base_offset: usize) -> String {
    let mut out = String::with_capacity((data.len() / BYTES_PER_LINE + 1) * 80);
    let mut address = 0;

    while address < data.len() {
        let end = cmp::min(address + BYTES_PER_LINE, data.len());
        write_line(&mut out, &data[address..end], base_offset + address);
        address += BYTES_PER_LINE;
    }

    out
}

fn write_line(out: &mut String, line: &[u8], address: usize) {
    // Writing into a `String` cannot fail.
    let _ = write!(out, "{:08x}:", address);

    for b in line {
        let _ = write!(out, " {:02x}", b);
    }

    // align the ASCII column of a short last line
    for _ in line.len()..BYTES_PER_LINE {
        out.push_str("   ");
    }

    out.push_str("  |");
    for &c in line {
        // replace all non-printable chars with dots
        if c.is_ascii_graphic() || c == b' ' {
            out.push(c as char);
        } else {
            out.push('.');
        }
    }
    out.push_str("|\n");
}
