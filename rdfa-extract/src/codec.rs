//! UTF-8 encoding and decoding for host text.
//!
//! Hosts that embed the extractor hand over strings as UTF-16 code units and
//! do not necessarily provide a codec of their own. These functions convert
//! between the two encodings byte-for-byte the way a conforming encoder
//! would, combining surrogate pairs into a single four-byte sequence.
//!
//! Malformed input is handled on a best-effort basis: an unpaired surrogate
//! encodes as U+FFFD, and a broken UTF-8 sequence decodes to U+FFFD before
//! resuming at the next byte. Neither direction panics.

const REPLACEMENT: u32 = 0xFFFD;

const HIGH_SURROGATES: std::ops::RangeInclusive<u16> = 0xD800..=0xDBFF;
const LOW_SURROGATES: std::ops::RangeInclusive<u16> = 0xDC00..=0xDFFF;

/// Encodes UTF-16 code units as UTF-8.
pub fn encode_utf8(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        i += 1;

        let scalar = if HIGH_SURROGATES.contains(&unit) {
            match units.get(i) {
                Some(&low) if LOW_SURROGATES.contains(&low) => {
                    i += 1;
                    0x10000 + (((u32::from(unit) & 0x3FF) << 10) | (u32::from(low) & 0x3FF))
                }
                _ => REPLACEMENT,
            }
        } else if LOW_SURROGATES.contains(&unit) {
            REPLACEMENT
        } else {
            u32::from(unit)
        };

        push_scalar(&mut out, scalar);
    }

    out
}

/// Encodes a Rust string by way of its UTF-16 form.
///
/// The output is identical to `text.as_bytes()`; this exists so that
/// callers holding host text and callers holding Rust text share one path.
pub fn encode_str(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    encode_utf8(&units)
}

fn push_scalar(out: &mut Vec<u8>, c: u32) {
    if c < 0x80 {
        out.push(c as u8);
    } else if c < 0x800 {
        out.push(0xC0 | (c >> 6) as u8);
        out.push(0x80 | (c & 0x3F) as u8);
    } else if c < 0x10000 {
        out.push(0xE0 | (c >> 12) as u8);
        out.push(0x80 | ((c >> 6) & 0x3F) as u8);
        out.push(0x80 | (c & 0x3F) as u8);
    } else {
        out.push(0xF0 | (c >> 18) as u8);
        out.push(0x80 | ((c >> 12) & 0x3F) as u8);
        out.push(0x80 | ((c >> 6) & 0x3F) as u8);
        out.push(0x80 | (c & 0x3F) as u8);
    }
}

/// Decodes UTF-8 into UTF-16 code units.
pub fn decode_utf8(bytes: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        // (payload bits of the lead byte, number of continuation bytes, smallest legal scalar)
        let (initial, continuation, min) = match lead {
            0x00..=0x7F => {
                out.push(u16::from(lead));
                i += 1;
                continue;
            }
            0xC0..=0xDF => (u32::from(lead & 0x1F), 1, 0x80),
            0xE0..=0xEF => (u32::from(lead & 0x0F), 2, 0x800),
            0xF0..=0xF7 => (u32::from(lead & 0x07), 3, 0x10000),
            // stray continuation byte or invalid lead byte
            _ => {
                out.push(REPLACEMENT as u16);
                i += 1;
                continue;
            }
        };

        let mut scalar = initial;
        let mut consumed = 1;
        while consumed <= continuation {
            match bytes.get(i + consumed) {
                Some(&b) if b & 0xC0 == 0x80 => {
                    scalar = (scalar << 6) | u32::from(b & 0x3F);
                    consumed += 1;
                }
                _ => break,
            }
        }

        if consumed <= continuation
            || scalar < min
            || scalar > 0x10FFFF
            || (0xD800..=0xDFFF).contains(&scalar)
        {
            // truncated, overlong, or out of range; resume after the lead byte
            out.push(REPLACEMENT as u16);
            i += 1;
            continue;
        }

        i += consumed;
        push_utf16(&mut out, scalar);
    }

    out
}

fn push_utf16(out: &mut Vec<u16>, scalar: u32) {
    if scalar < 0x10000 {
        out.push(scalar as u16);
    } else {
        let offset = scalar - 0x10000;
        out.push(0xD800 | (offset >> 10) as u16);
        out.push(0xDC00 | (offset & 0x3FF) as u16);
    }
}

/// Decodes UTF-8 straight into a Rust string.
pub fn decode_to_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&decode_utf8(bytes))
}
