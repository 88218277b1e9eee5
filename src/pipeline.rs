//! Composes the header, symbol, and record codecs into the two end-to-end flows
//! a caller drives: [`read`] and [`write`].

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use time::OffsetDateTime;

use crate::config::Config;
use crate::error::{QvdError, Result};
use crate::header::{FieldHeader, TableHeader};
use crate::logger::Logger;
use crate::record;
use crate::symbol;
use crate::table::{Column, Table};
use crate::value::{FieldTag, FieldType, FieldValue, NumberFormat};
use crate::xml;

const PROGRESS_INTERVAL: u64 = 1_000_000;
const QV_BUILD_NO: &str = "50668";

/// Reads a QVD file end to end: whole-file load, header parse, per-field symbol
/// decode, then record decode into a columnar [`Table`].
pub fn read(config: &Config, logger: &dyn Logger) -> Result<Table> {
    let path = config.path();
    let span = tracing::info_span!("qvd_read", path = %path.display());
    let _enter = span.enter();

    logger.info(&format!("starts reading from {}", path.display()));

    let bytes = fs::read(path).map_err(|e| QvdError::io(path, e))?;

    let sentinel = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| QvdError::InvalidXml("no NUL sentinel found after the XML header".into()))?;

    let header = {
        let _span = tracing::info_span!("parse_header").entered();
        xml::parse_header(&bytes[..sentinel])?
    };

    let payload = &bytes[sentinel + 1..];

    let mut fields = header.fields().clone();
    let mut columns = Vec::with_capacity(fields.len());

    for field in fields.iter_mut() {
        let _span = tracing::debug_span!("decode_symbols", field = field.field_name().as_str()).entered();
        let start = field.offset() as usize;
        let end = start + field.length() as usize;
        let block = payload
            .get(start..end)
            .ok_or_else(|| QvdError::TruncatedSymbolBlock {
                field: field.field_name().clone(),
                consumed: payload.len(),
                len: end,
            })?;
        let symbols = symbol::decode_symbols(field.field_name(), block, field.no_of_symbols())?;
        tracing::debug!(
            field = field.field_name().as_str(),
            inferred_tag = ?symbol::inferred_tag(&symbols),
            "decoded symbol block"
        );
        *field.symbols_mut() = symbols;
    }

    logger.info(&format!("Total number of records: {}", header.no_of_records()));

    let record_start = header.offset() as usize;
    let record_end = record_start + header.length() as usize;
    let record_bytes = payload
        .get(record_start..record_end)
        .ok_or_else(|| QvdError::Overflow(format!(
            "record section [{record_start}, {record_end}) is out of bounds for a {}-byte payload",
            payload.len()
        )))?;

    let decoded = {
        let _span = tracing::info_span!("decode_records", rows = header.no_of_records()).entered();
        record::decode_records(
            &fields,
            record_bytes,
            header.no_of_records(),
            header.record_byte_size(),
            |row| {
                if row % PROGRESS_INTERVAL == 0 {
                    logger.info(&format!("Read {row} records ..."));
                }
            },
        )?
    };

    for (field, values) in fields.iter().zip(decoded) {
        columns.push(Column::new(field.field_name(), values));
    }

    logger.info(&format!("finished reading from {}", path.display()));

    Ok(Table::new(columns))
}

/// A lookup key for the order-preserving symbol dictionary; wraps `f64` by its
/// bit pattern so floats can be deduplicated with exact equality, matching the
/// "first occurrence assigns the index" rule of the symbol-table contract.
#[derive(PartialEq, Eq, Hash)]
enum SymbolKey {
    Int(i32),
    Float(u64),
    Text(String),
    DualInt(String, i32),
    DualFloat(String, u64),
}

fn symbol_key(value: &FieldValue) -> SymbolKey {
    match value {
        FieldValue::Integer32(v) => SymbolKey::Int(*v),
        FieldValue::Float64(v) => SymbolKey::Float(v.to_bits()),
        FieldValue::NullRef => SymbolKey::Text(String::new()),
        FieldValue::Utf8Text(s) => SymbolKey::Text(s.clone()),
        FieldValue::DualInt(s, n) => SymbolKey::DualInt(s.clone(), *n),
        FieldValue::DualFloat(s, n) => SymbolKey::DualFloat(s.clone(), n.to_bits()),
    }
}

/// The symbol tag, declared [`FieldType`], and attached [`FieldTag`]s a column's
/// non-null values map to, per the writer's element-type-family table.
fn classify_column(name: &str, values: &[Option<FieldValue>]) -> Result<(FieldType, Vec<FieldTag>)> {
    let mut observed: Option<u8> = None;
    for v in values.iter().flatten() {
        let tag = v.tag();
        match observed {
            None => observed = Some(tag),
            Some(existing) if existing == tag => {}
            Some(existing) => {
                return Err(QvdError::SchemaMismatch {
                    column: name.to_string(),
                    found: format!("mixed symbol kinds 0x{existing:02x} and 0x{tag:02x}"),
                })
            }
        }
    }

    Ok(match observed {
        None => (FieldType::Unknown, Vec::new()),
        Some(0x01) => (FieldType::Integer, vec![FieldTag::Integer, FieldTag::Numeric]),
        Some(0x02) => (FieldType::Real, vec![FieldTag::Numeric]),
        Some(0x04) => (FieldType::Ascii, vec![FieldTag::Ascii, FieldTag::Text]),
        Some(0x05) => (FieldType::Date, vec![FieldTag::Integer, FieldTag::Numeric, FieldTag::Date]),
        Some(0x06) => (FieldType::Timestamp, vec![FieldTag::Numeric, FieldTag::Timestamp]),
        Some(other) => {
            return Err(QvdError::SchemaMismatch {
                column: name.to_string(),
                found: format!("symbol tag 0x{other:02x} is not a writable column value"),
            })
        }
    })
}

fn table_name_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "TABLE".to_string())
}

/// Writes a [`Table`] to a QVD file end to end: symbol-table construction, bit
/// layout assignment, record encoding, then a two-phase write of the XML header
/// followed by the binary payload.
pub fn write(table: &Table, config: &Config, logger: &dyn Logger) -> Result<()> {
    let path = config.path();
    let span = tracing::info_span!("qvd_write", path = %path.display());
    let _enter = span.enter();

    logger.info(&format!("starts writing to {}", path.display()));

    let no_of_records = table.no_of_records() as u64;
    let mut fields: Vec<FieldHeader> = Vec::with_capacity(table.columns().len());
    let mut indices_by_field: Vec<Vec<u64>> = Vec::with_capacity(table.columns().len());
    let mut symbol_bytes_by_field: Vec<Vec<u8>> = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        let (field_type, tags) = classify_column(column.name(), column.values())?;

        let mut dedup: HashMap<SymbolKey, usize> = HashMap::new();
        let mut symbols: Vec<FieldValue> = Vec::new();
        let mut indices = Vec::with_capacity(column.len());
        for value in column.values() {
            let index = match value {
                None => 0u64,
                Some(v) => {
                    let key = symbol_key(v);
                    *dedup.entry(key).or_insert_with(|| {
                        symbols.push(v.clone());
                        symbols.len() - 1
                    }) as u64
                }
            };
            indices.push(index);
        }

        let symbol_bytes = symbol::encode_symbols(&symbols);

        let mut field = FieldHeader::new(column.name());
        field.set_no_of_symbols(symbols.len());
        field.set_number_format(NumberFormat::with_type(field_type));
        *field.tags_mut() = tags;
        field.set_length(symbol_bytes.len() as u64);
        *field.symbols_mut() = symbols;

        tracing::debug!(
            field = column.name(),
            no_of_symbols = field.no_of_symbols(),
            "classified column"
        );

        fields.push(field);
        indices_by_field.push(indices);
        symbol_bytes_by_field.push(symbol_bytes);
    }

    let total_bits = record::assign_bit_layout(&mut fields)?;
    let record_byte_size = (total_bits / 8) as u64;

    let mut running_offset = 0u64;
    for (field, bytes) in fields.iter_mut().zip(&symbol_bytes_by_field) {
        field.set_offset(running_offset);
        running_offset += bytes.len() as u64;
    }
    let table_offset = running_offset;

    let record_bytes = {
        let _span = tracing::info_span!("encode_records", rows = no_of_records).entered();
        record::encode_records(&fields, &indices_by_field, no_of_records, record_byte_size)
    };
    let table_length = record_byte_size * no_of_records;

    tracing::debug!(record_byte_size, no_of_records, "finalized record layout");

    let now = OffsetDateTime::now_utc();
    let mut header = TableHeader::new(table_name_from_path(path));
    header.set_qv_build_no(QV_BUILD_NO.to_string());
    header.set_creator_doc(path.display().to_string());
    header.set_create_utc_time(format_utc(now));
    header.set_source_create_utc_time(String::new());
    header.set_source_file_utc_time(String::new());
    header.set_source_file_size(-1);
    header.set_stale_utc_time(String::new());
    header.set_compression(String::new());
    header.set_record_byte_size(record_byte_size);
    header.set_no_of_records(no_of_records);
    header.set_offset(table_offset);
    header.set_length(table_length);
    header.set_comment(String::new());
    *header.fields_mut() = fields;

    let header_bytes = {
        let _span = tracing::info_span!("emit_header").entered();
        xml::emit_header(&header)?
    };

    fs::write(path, &header_bytes).map_err(|e| QvdError::io(path, e))?;
    {
        use std::io::Write;
        let mut handle = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| QvdError::io(path, e))?;
        handle.write_all(b"\r\n\0").map_err(|e| QvdError::io(path, e))?;
        for bytes in &symbol_bytes_by_field {
            handle.write_all(bytes).map_err(|e| QvdError::io(path, e))?;
        }
        handle.write_all(&record_bytes).map_err(|e| QvdError::io(path, e))?;
    }

    logger.info(&format!("Total number of records: {no_of_records}"));
    let mut reached = PROGRESS_INTERVAL;
    while reached <= no_of_records {
        logger.info(&format!("Wrote {reached} records ..."));
        reached += PROGRESS_INTERVAL;
    }
    logger.info(&format!("finished writing to {}", path.display()));

    Ok(())
}

fn format_utc(now: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::StderrLogger;
    use crate::value::FieldValue;

    fn temp_config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.qvd");
        let config = Config::new(path);
        (dir, config)
    }

    #[test]
    fn scenario_a_single_integer_column_round_trips() {
        let (_dir, config) = temp_config();
        let table = Table::new(vec![Column::new(
            "X",
            vec![
                Some(FieldValue::Integer32(7)),
                Some(FieldValue::Integer32(7)),
                Some(FieldValue::Integer32(9)),
                None,
            ],
        )]);

        write(&table, &config, &StderrLogger).unwrap();
        let read_back = read(&config, &StderrLogger).unwrap();

        let column = read_back.column("X").unwrap();
        assert_eq!(column.len(), 4);
        assert_eq!(column.values()[0], Some(FieldValue::Integer32(7)));
        assert_eq!(column.values()[2], Some(FieldValue::Integer32(9)));
    }

    #[test]
    fn scenario_c_all_null_column_round_trips_to_null() {
        let (_dir, config) = temp_config();
        let table = Table::new(vec![Column::new("N", vec![None, None])]);

        write(&table, &config, &StderrLogger).unwrap();
        let read_back = read(&config, &StderrLogger).unwrap();

        assert_eq!(read_back.column("N").unwrap().values(), &vec![None, None]);
    }

    #[test]
    fn scenario_d_string_and_float_columns_round_trip_row_for_row() {
        let (_dir, config) = temp_config();
        let table = Table::new(vec![
            Column::new(
                "Name",
                vec![
                    Some(FieldValue::Utf8Text("a".into())),
                    Some(FieldValue::Utf8Text("b".into())),
                    Some(FieldValue::Utf8Text("a".into())),
                ],
            ),
            Column::new(
                "V",
                vec![
                    Some(FieldValue::Float64(1.0)),
                    Some(FieldValue::Float64(2.0)),
                    Some(FieldValue::Float64(1.0)),
                ],
            ),
        ]);

        write(&table, &config, &StderrLogger).unwrap();
        let read_back = read(&config, &StderrLogger).unwrap();

        assert_eq!(read_back.column("Name").unwrap().values(), table.column("Name").unwrap().values());
        assert_eq!(read_back.column("V").unwrap().values(), table.column("V").unwrap().values());
    }

    #[test]
    fn scenario_g_empty_table_round_trips_with_zero_records() {
        let (_dir, config) = temp_config();
        let table = Table::new(vec![Column::new("X", Vec::<Option<FieldValue>>::new())]);

        write(&table, &config, &StderrLogger).unwrap();
        let read_back = read(&config, &StderrLogger).unwrap();

        assert_eq!(read_back.no_of_records(), 0);
        assert_eq!(read_back.column("X").unwrap().values(), &Vec::<Option<FieldValue>>::new());
    }

    #[test]
    fn write_rejects_a_column_with_mixed_symbol_kinds() {
        let (_dir, config) = temp_config();
        let table = Table::new(vec![Column::new(
            "Mixed",
            vec![Some(FieldValue::Integer32(1)), Some(FieldValue::Utf8Text("a".into()))],
        )]);

        let err = write(&table, &config, &StderrLogger).unwrap_err();
        assert!(matches!(err, QvdError::SchemaMismatch { .. }));
    }
}
