//! Packs and unpacks the fixed-width record section: one little-endian bitstream
//! per row, each field contributing a fixed-width symbol index at a fixed offset.

use crate::bitmask::mask;
use crate::error::{QvdError, Result};
use crate::header::FieldHeader;
use crate::value::FieldValue;

/// Reads a `bit_width`-wide field out of a byte buffer, treating the whole
/// buffer as one little-endian bitstream (bit 0 is the LSB of byte 0).
///
/// Fails with [`QvdError::Overflow`] rather than panicking when `bit_width > 64`,
/// since `BitWidth` is untrusted header data on the read path.
fn get_bits(field_name: &str, bytes: &[u8], bit_offset: u32, bit_width: u32) -> Result<u64> {
    if bit_width > 64 {
        return Err(QvdError::Overflow(format!(
            "field {field_name:?} has BitWidth {bit_width}, more than the 64-bit maximum"
        )));
    }
    if bit_width == 0 {
        return Ok(0);
    }
    let mut result: u64 = 0;
    for i in 0..bit_width {
        let bit_index = bit_offset + i;
        let byte_index = (bit_index / 8) as usize;
        let bit_in_byte = bit_index % 8;
        let bit = bytes.get(byte_index).map(|b| (b >> bit_in_byte) & 1).unwrap_or(0);
        result |= (bit as u64) << i;
    }
    Ok(result & mask(bit_width))
}

fn set_bits(bytes: &mut [u8], bit_offset: u32, bit_width: u32, value: u64) {
    for i in 0..bit_width {
        if (value >> i) & 1 == 1 {
            let bit_index = bit_offset + i;
            let byte_index = (bit_index / 8) as usize;
            let bit_in_byte = bit_index % 8;
            bytes[byte_index] |= 1 << bit_in_byte;
        }
    }
}

/// `bit_length(n)`: the number of bits needed to represent `n` (`0` for `n == 0`).
fn bit_length(n: u64) -> u32 {
    64 - n.leading_zeros()
}

/// Assigns `BitOffset`/`BitWidth`/`Bias` to every field from its (already-populated)
/// `NoOfSymbols`, then applies the padding policy so the total row width is a byte
/// multiple. Returns the final total bit width (a multiple of 8).
pub fn assign_bit_layout(fields: &mut [FieldHeader]) -> Result<u32> {
    let mut bit_offset = 0u32;
    for field in fields.iter_mut() {
        let bit_width = if field.no_of_symbols() > 1 {
            bit_length(field.no_of_symbols() as u64 - 1)
        } else {
            0
        };
        if bit_width > 64 {
            return Err(QvdError::Overflow(format!(
                "field {:?} would need a {}-bit symbol index, more than the 64-bit maximum",
                field.field_name(),
                bit_width
            )));
        }
        field.set_bias(if field.no_of_symbols() == 0 { -2 } else { 0 });
        field.set_bit_offset(bit_offset);
        field.set_bit_width(bit_width);
        bit_offset += bit_width;
    }

    if bit_offset == 0 {
        // RecordByteSize is always at least 1, even for a table whose only
        // columns are all-null (or a table with no columns at all).
        return Ok(8);
    }

    let remainder = bit_offset % 8;
    if remainder == 0 {
        return Ok(bit_offset);
    }
    let pad = 8 - remainder;

    let mut padded = false;
    for field in fields.iter_mut() {
        if !padded {
            if field.no_of_symbols() > 1 && (field.bit_offset() + field.bit_width() + pad) % 8 == 0 {
                field.set_bit_width(field.bit_width() + pad);
                padded = true;
            }
        } else if field.bit_offset() > 0 {
            field.set_bit_offset(field.bit_offset() + pad);
        }
    }

    Ok(bit_offset + pad)
}

/// Encodes one row per entry of `indices` (outer: field, inner: row) into the
/// packed record section. `indices[i][r]` is the symbol index row `r` resolved to
/// for field `i`; fields with `NoOfSymbols <= 1` are ignored (their rows carry no bits).
pub fn encode_records(
    fields: &[FieldHeader],
    indices: &[Vec<u64>],
    no_of_records: u64,
    record_byte_size: u64,
) -> Vec<u8> {
    let mut out = vec![0u8; (record_byte_size * no_of_records) as usize];
    for (field, field_indices) in fields.iter().zip(indices) {
        if field.no_of_symbols() <= 1 {
            continue;
        }
        for r in 0..no_of_records as usize {
            let start = r * record_byte_size as usize;
            let end = start + record_byte_size as usize;
            set_bits(&mut out[start..end], field.bit_offset(), field.bit_width(), field_indices[r]);
        }
    }
    out
}

/// Decodes the packed record section into resolved values, one column per field
/// in declaration order. A field with `Bias == -2` yields `None` for every row
/// without consulting its bits; an out-of-range index is [`QvdError::CorruptRecordIndex`].
///
/// `on_row` is called with the 1-based row count after each row is decoded, so a
/// caller can report progress (e.g. every 1,000,000 rows) as the pass actually runs
/// rather than after the fact.
pub fn decode_records(
    fields: &[FieldHeader],
    record_bytes: &[u8],
    no_of_records: u64,
    record_byte_size: u64,
    mut on_row: impl FnMut(u64),
) -> Result<Vec<Vec<Option<FieldValue>>>> {
    let expected_len = (record_byte_size * no_of_records) as usize;
    if record_bytes.len() != expected_len {
        return Err(QvdError::Overflow(format!(
            "record section is {} bytes, expected {} ({} records of {} bytes)",
            record_bytes.len(),
            expected_len,
            no_of_records,
            record_byte_size
        )));
    }

    let mut columns: Vec<Vec<Option<FieldValue>>> = fields
        .iter()
        .map(|_| Vec::with_capacity(no_of_records as usize))
        .collect();

    for r in 0..no_of_records as usize {
        let start = r * record_byte_size as usize;
        let end = start + record_byte_size as usize;
        let row = &record_bytes[start..end];

        for (field, column) in fields.iter().zip(columns.iter_mut()) {
            if field.is_all_null() {
                column.push(None);
                continue;
            }
            let index = get_bits(field.field_name(), row, field.bit_offset(), field.bit_width())?;
            let symbols = field.symbols();
            if index as usize >= field.no_of_symbols().max(symbols.len()) {
                return Err(QvdError::CorruptRecordIndex {
                    field: field.field_name().clone(),
                    index,
                    no_of_symbols: field.no_of_symbols(),
                });
            }
            let value = symbols.get(index as usize).cloned().unwrap_or(FieldValue::NullRef);
            column.push(match value {
                FieldValue::NullRef => None,
                other => Some(other),
            });
        }

        on_row(r as u64 + 1);
    }

    Ok(columns)
}
