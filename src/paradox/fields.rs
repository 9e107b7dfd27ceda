//! Per-cell field decoding: raw bytes plus type metadata → neutral values.
//!
//! Fixed-width numeric, date and time cells share one protocol: the MSB of
//! the first stored byte is a non-null marker. An all-zero cell is Null;
//! otherwise the marker bit is flipped and the cell is interpreted as signed
//! big-endian. A cleared marker with a non-zero body is a valid negative
//! value. Doubles extend the idea: marker set means clear it and read the
//! IEEE bits, marker clear means all 64 bits are inverted.

use byteorder::{ByteOrder, LittleEndian};

use super::encoding;
use super::models::{BlobRef, FieldDesc, FieldType, Value};

/// Days between 0001-01-01 and 1970-01-01 in the Paradox day count.
const DAYS_TO_UNIX_EPOCH: i32 = 719_163;
/// Raw day counts outside (0, 3 000 000] are sentinel or corrupt data.
const MAX_RAW_DAYS: i32 = 3_000_000;
/// Trailing bytes of a blob-bearing cell: offset descriptor (4), declared
/// length (4), modifier (2).
const BLOB_TRAILER_LEN: usize = 10;

/// Result of decoding one cell: either a finished value or a reference the
/// blob resolver still has to chase into the `.MB` file.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Value(Value),
    Blob(BlobRef),
}

/// Decodes one cell. `cell` is exactly `desc.len` bytes, sliced out of the
/// current block by the record iterator. Never fails: malformed cells decode
/// to Null.
pub fn decode(cell: &[u8], desc: &FieldDesc, codepage: &str) -> Decoded {
    let value = match desc.kind {
        FieldType::Alpha => decode_alpha(cell, codepage),
        FieldType::Short => match decode_i16(cell) {
            Some(v) => Value::Int(i64::from(v)),
            None => Value::Null,
        },
        FieldType::Long | FieldType::AutoInc => match decode_i32(cell) {
            Some(v) => Value::Int(i64::from(v)),
            None => Value::Null,
        },
        FieldType::Date => decode_date(cell),
        FieldType::Time => decode_time(cell),
        FieldType::Number | FieldType::Currency => match decode_f64(cell) {
            Some(v) => Value::Float(v),
            None => Value::Null,
        },
        FieldType::Timestamp => decode_timestamp(cell),
        FieldType::Logical => decode_logical(cell),
        FieldType::Bcd => match decode_bcd(cell, desc.precision) {
            Some(text) => Value::Text(text),
            None => Value::Null,
        },
        FieldType::Bytes => Value::Bytes(cell.to_vec()),
        FieldType::Memo
        | FieldType::FmtMemo
        | FieldType::Binary
        | FieldType::Ole
        | FieldType::Graphic => return decode_blob_cell(cell, desc, codepage),
        FieldType::Unknown(_) => Value::Null,
    };
    Decoded::Value(value)
}

/// Converts a resolved blob payload into the final value for its field type.
pub fn blob_value(kind: FieldType, payload: Vec<u8>, codepage: &str) -> Value {
    if payload.is_empty() {
        Value::Null
    } else if kind.is_text_blob() {
        Value::Text(encoding::recode(&payload, codepage).into_owned())
    } else {
        Value::Blob(payload)
    }
}

fn decode_alpha(cell: &[u8], codepage: &str) -> Value {
    let end = cell
        .iter()
        .rposition(|&b| b != 0)
        .map(|p| p + 1)
        .unwrap_or(0);
    if end == 0 {
        return Value::Null;
    }
    Value::Text(encoding::recode(&cell[..end], codepage).into_owned())
}

fn decode_i16(cell: &[u8]) -> Option<i16> {
    if cell.len() != 2 || cell.iter().all(|&b| b == 0) {
        return None;
    }
    Some(i16::from_be_bytes([cell[0] ^ 0x80, cell[1]]))
}

fn decode_i32(cell: &[u8]) -> Option<i32> {
    if cell.len() != 4 || cell.iter().all(|&b| b == 0) {
        return None;
    }
    Some(i32::from_be_bytes([
        cell[0] ^ 0x80,
        cell[1],
        cell[2],
        cell[3],
    ]))
}

fn decode_f64(cell: &[u8]) -> Option<f64> {
    if cell.len() != 8 || cell.iter().all(|&b| b == 0) {
        return None;
    }
    let mut bits = [0u8; 8];
    bits.copy_from_slice(cell);
    if bits[0] & 0x80 != 0 {
        // Stored sign bit set: the value is positive, clear the marker.
        bits[0] &= 0x7F;
    } else {
        // Stored sign bit clear: the value is negative, all bits inverted.
        for byte in &mut bits {
            *byte = !*byte;
        }
    }
    Some(f64::from_be_bytes(bits))
}

fn decode_date(cell: &[u8]) -> Value {
    match decode_i32(cell) {
        Some(raw) if raw > 0 && raw <= MAX_RAW_DAYS => Value::Date(raw - DAYS_TO_UNIX_EPOCH),
        _ => Value::Null,
    }
}

fn decode_time(cell: &[u8]) -> Value {
    match decode_i32(cell) {
        Some(ms) if ms >= 0 => Value::Time(f64::from(ms) / 1000.0),
        _ => Value::Null,
    }
}

fn decode_timestamp(cell: &[u8]) -> Value {
    match decode_f64(cell) {
        Some(ms) if ms > 0.0 => {
            Value::Timestamp(ms / 1000.0 - f64::from(DAYS_TO_UNIX_EPOCH) * 86_400.0)
        }
        _ => Value::Null,
    }
}

fn decode_logical(cell: &[u8]) -> Value {
    match cell.first().copied() {
        None | Some(0) => Value::Null,
        Some(b) => Value::Bool(b & 0x7F != 0),
    }
}

/// Packed BCD: byte 0 carries the sign marker (bit 7); bytes 1..17 hold 32
/// decimal nibbles, most significant first. The fractional digit count is
/// schema-level, taken from the field descriptor. Negative values store
/// complemented nibbles. An all-zero cell is the null sentinel.
fn decode_bcd(cell: &[u8], precision: u8) -> Option<String> {
    if cell.len() != 17 || cell.iter().all(|&b| b == 0) {
        return None;
    }
    let negative = cell[0] & 0x80 == 0;
    let decimals = usize::from(precision).min(32);

    let mut digits = [0u8; 32];
    for (i, digit) in digits.iter_mut().enumerate() {
        let byte = cell[1 + i / 2];
        let mut nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        if negative {
            nibble ^= 0x0F;
        }
        *digit = nibble;
    }

    let int_len = 32 - decimals;
    let mut out = String::with_capacity(36);
    if negative {
        out.push('-');
    }
    let first_significant = digits[..int_len]
        .iter()
        .position(|&d| d != 0)
        .unwrap_or(int_len.saturating_sub(1));
    for &d in &digits[first_significant..int_len] {
        out.push(digit_char(d));
    }
    if int_len == 0 {
        out.push('0');
    }
    if decimals > 0 {
        out.push('.');
        for &d in &digits[int_len..] {
            out.push(digit_char(d));
        }
    }
    Some(out)
}

fn digit_char(d: u8) -> char {
    if d <= 9 {
        char::from(b'0' + d)
    } else {
        // A nibble above 9 only appears in corrupt cells.
        '?'
    }
}

/// Splits a blob-bearing cell into inline payload or a [`BlobRef`].
///
/// The cell is `desc.len` bytes: an inline tail of `desc.len − 10` bytes,
/// then the 10-byte trailer. A declared length that fits the tail means the
/// payload is fully inline and no `.MB` access is needed.
fn decode_blob_cell(cell: &[u8], desc: &FieldDesc, codepage: &str) -> Decoded {
    if cell.len() < BLOB_TRAILER_LEN {
        return Decoded::Value(Value::Null);
    }
    let split = cell.len() - BLOB_TRAILER_LEN;
    let tail = &cell[..split];
    let trailer = &cell[split..];
    let descriptor = LittleEndian::read_u32(&trailer[0..4]);
    let len = LittleEndian::read_u32(&trailer[4..8]);
    let modifier = LittleEndian::read_u16(&trailer[8..10]);

    if len == 0 {
        return Decoded::Value(Value::Null);
    }
    if len as usize <= tail.len() {
        return Decoded::Value(blob_value(
            desc.kind,
            tail[..len as usize].to_vec(),
            codepage,
        ));
    }
    Decoded::Blob(BlobRef {
        descriptor,
        len,
        modifier,
        tail: tail.to_vec(),
    })
}
