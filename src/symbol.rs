//! Decodes and encodes a field's symbol block: a flat sequence of self-delimiting,
//! typed symbol records (§4.2 of the format).

use crate::error::{QvdError, Result};
use crate::value::FieldValue;

const TAG_INT32: u8 = 0x01;
const TAG_FLOAT64: u8 = 0x02;
const TAG_RESERVED: u8 = 0x03;
const TAG_TEXT: u8 = 0x04;
const TAG_DUAL_INT: u8 = 0x05;
const TAG_DUAL_FLOAT: u8 = 0x06;

/// Decodes exactly `no_of_symbols` symbols out of `bytes`.
///
/// Fails with [`QvdError::TruncatedSymbolBlock`] if the block runs out before every
/// symbol is read, and [`QvdError::UnknownSymbolTag`] on any tag outside `1..=6`.
pub fn decode_symbols(field_name: &str, bytes: &[u8], no_of_symbols: usize) -> Result<Vec<FieldValue>> {
    let mut symbols = Vec::with_capacity(no_of_symbols);
    let mut pos = 0usize;

    for _ in 0..no_of_symbols {
        let tag = *bytes.get(pos).ok_or_else(|| truncated(field_name, pos, bytes.len()))?;
        pos += 1;

        let value = match tag {
            TAG_INT32 => {
                let v = read_i32(field_name, bytes, &mut pos)?;
                FieldValue::Integer32(v)
            }
            TAG_FLOAT64 => {
                let v = read_f64(field_name, bytes, &mut pos)?;
                FieldValue::Float64(v)
            }
            TAG_RESERVED => FieldValue::NullRef,
            TAG_TEXT => {
                let s = read_nul_terminated(field_name, bytes, &mut pos)?;
                FieldValue::Utf8Text(s)
            }
            TAG_DUAL_INT => {
                let n = read_i32(field_name, bytes, &mut pos)?;
                let s = read_nul_terminated(field_name, bytes, &mut pos)?;
                FieldValue::DualInt(s, n)
            }
            TAG_DUAL_FLOAT => {
                let n = read_f64(field_name, bytes, &mut pos)?;
                let s = read_nul_terminated(field_name, bytes, &mut pos)?;
                FieldValue::DualFloat(s, n)
            }
            other => {
                return Err(QvdError::UnknownSymbolTag {
                    field: field_name.to_string(),
                    tag: other,
                })
            }
        };
        symbols.push(value);
    }

    Ok(symbols)
}

fn truncated(field_name: &str, consumed: usize, len: usize) -> QvdError {
    QvdError::TruncatedSymbolBlock {
        field: field_name.to_string(),
        consumed,
        len,
    }
}

fn read_i32(field_name: &str, bytes: &[u8], pos: &mut usize) -> Result<i32> {
    let end = *pos + 4;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| truncated(field_name, *pos, bytes.len()))?;
    *pos = end;
    Ok(i32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_f64(field_name: &str, bytes: &[u8], pos: &mut usize) -> Result<f64> {
    let end = *pos + 8;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| truncated(field_name, *pos, bytes.len()))?;
    *pos = end;
    Ok(f64::from_le_bytes(slice.try_into().unwrap()))
}

fn read_nul_terminated(field_name: &str, bytes: &[u8], pos: &mut usize) -> Result<String> {
    let start = *pos;
    let nul = bytes[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| truncated(field_name, start, bytes.len()))?;
    let end = start + nul;
    let s = std::str::from_utf8(&bytes[start..end])
        .map_err(|_| QvdError::InvalidUtf8Symbol {
            field: field_name.to_string(),
        })?
        .to_string();
    *pos = end + 1;
    Ok(s)
}

/// Encodes an ordered, distinct list of symbol values into their on-disk byte form.
/// The assigned symbol index is the position of each value in `values`.
pub fn encode_symbols(values: &[FieldValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        match value {
            FieldValue::Integer32(v) => {
                out.push(TAG_INT32);
                out.extend_from_slice(&v.to_le_bytes());
            }
            FieldValue::Float64(v) => {
                out.push(TAG_FLOAT64);
                out.extend_from_slice(&v.to_le_bytes());
            }
            FieldValue::NullRef => {
                out.push(TAG_RESERVED);
            }
            FieldValue::Utf8Text(s) => {
                out.push(TAG_TEXT);
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            FieldValue::DualInt(s, n) => {
                out.push(TAG_DUAL_INT);
                out.extend_from_slice(&n.to_le_bytes());
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            FieldValue::DualFloat(s, n) => {
                out.push(TAG_DUAL_FLOAT);
                out.extend_from_slice(&n.to_le_bytes());
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
        }
    }
    out
}

/// The column-wide kind a reader infers for an external schema: the numerically
/// maximum symbol tag observed among a field's symbols.
pub fn inferred_tag(symbols: &[FieldValue]) -> Option<u8> {
    symbols.iter().map(FieldValue::tag).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_an_integer_and_a_string_symbol() {
        let mut bytes = Vec::new();
        bytes.push(TAG_INT32);
        bytes.extend_from_slice(&7i32.to_le_bytes());
        bytes.push(TAG_TEXT);
        bytes.extend_from_slice(b"hi\0");

        let symbols = decode_symbols("X", &bytes, 2).unwrap();
        assert_eq!(symbols[0], FieldValue::Integer32(7));
        assert_eq!(symbols[1], FieldValue::Utf8Text("hi".into()));
    }

    #[test]
    fn decodes_dual_symbols_retaining_both_parts() {
        let mut bytes = Vec::new();
        bytes.push(TAG_DUAL_INT);
        bytes.extend_from_slice(&45292i32.to_le_bytes());
        bytes.extend_from_slice(b"2024-01-01\0");

        let symbols = decode_symbols("D", &bytes, 1).unwrap();
        assert_eq!(symbols[0], FieldValue::DualInt("2024-01-01".into(), 45292));
    }

    #[test]
    fn fails_on_truncated_block() {
        let bytes = vec![TAG_INT32, 0x01, 0x02];
        let err = decode_symbols("X", &bytes, 1).unwrap_err();
        assert!(matches!(err, QvdError::TruncatedSymbolBlock { .. }));
    }

    #[test]
    fn fails_on_unknown_tag() {
        let bytes = vec![0x09];
        let err = decode_symbols("X", &bytes, 1).unwrap_err();
        assert!(matches!(err, QvdError::UnknownSymbolTag { tag: 0x09, .. }));
    }

    #[test]
    fn encode_then_decode_recovers_the_same_values() {
        let values = vec![
            FieldValue::Integer32(7),
            FieldValue::Integer32(9),
            FieldValue::Utf8Text("a".into()),
        ];
        let bytes = encode_symbols(&values);
        let decoded = decode_symbols("X", &bytes, values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn inferred_tag_is_the_max_tag_observed() {
        let values = vec![FieldValue::Integer32(1), FieldValue::Utf8Text("a".into())];
        assert_eq!(inferred_tag(&values), Some(TAG_TEXT));
    }
}
