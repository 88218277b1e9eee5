//! The metadata model carried by the XML header: [`TableHeader`] and its [`FieldHeader`]s.

use getset::{CopyGetters, Getters, MutGetters, Setters};

use crate::value::{FieldTag, FieldValue, NumberFormat};

/// Per-field metadata, plus the symbol list once a field has been decoded.
///
/// `Symbols` is transient: the reader fills it in while decoding and the writer
/// fills it in while scanning a column; neither persists it beyond the lifetime
/// of a single read/write call.
#[derive(Debug, Clone, Getters, CopyGetters, MutGetters, Setters)]
pub struct FieldHeader {
    #[getset(get = "pub", set = "pub")]
    field_name: String,
    #[getset(get_copy = "pub", set = "pub")]
    bit_offset: u32,
    #[getset(get_copy = "pub", set = "pub")]
    bit_width: u32,
    #[getset(get_copy = "pub", set = "pub")]
    bias: i32,
    #[getset(get = "pub", get_mut = "pub", set = "pub")]
    number_format: NumberFormat,
    #[getset(get_copy = "pub", set = "pub")]
    no_of_symbols: usize,
    #[getset(get_copy = "pub", set = "pub")]
    offset: u64,
    #[getset(get_copy = "pub", set = "pub")]
    length: u64,
    #[getset(get = "pub", set = "pub")]
    comment: String,
    #[getset(get = "pub", get_mut = "pub", set = "pub")]
    tags: Vec<FieldTag>,
    #[getset(get = "pub", get_mut = "pub", set = "pub")]
    symbols: Vec<FieldValue>,
}

impl FieldHeader {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            bit_offset: 0,
            bit_width: 0,
            bias: 0,
            number_format: NumberFormat::default(),
            no_of_symbols: 0,
            offset: 0,
            length: 0,
            comment: String::new(),
            tags: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// A field whose `Bias` marks every row as null, regardless of bit width.
    pub fn is_all_null(&self) -> bool {
        self.bias == -2
    }
}

/// The lineage sub-tree; QVD always nests a single `LineageInfo` under `Lineage`.
#[derive(Debug, Clone, Default, Getters, Setters)]
pub struct LineageInfo {
    #[getset(get = "pub", set = "pub")]
    discriminator: String,
    #[getset(get = "pub", set = "pub")]
    statement: String,
}

/// Table-level metadata parsed from, or destined for, the `QvdTableHeader` XML document.
#[derive(Debug, Clone, Getters, CopyGetters, MutGetters, Setters)]
pub struct TableHeader {
    #[getset(get = "pub", set = "pub")]
    qv_build_no: String,
    #[getset(get = "pub", set = "pub")]
    creator_doc: String,
    #[getset(get = "pub", set = "pub")]
    create_utc_time: String,
    #[getset(get = "pub", set = "pub")]
    source_create_utc_time: String,
    #[getset(get = "pub", set = "pub")]
    source_file_utc_time: String,
    #[getset(get = "pub", set = "pub")]
    stale_utc_time: String,
    #[getset(get = "pub", set = "pub")]
    table_name: String,
    #[getset(get_copy = "pub", set = "pub")]
    source_file_size: i64,
    #[getset(get = "pub", get_mut = "pub", set = "pub")]
    fields: Vec<FieldHeader>,
    #[getset(get = "pub", set = "pub")]
    compression: String,
    #[getset(get_copy = "pub", set = "pub")]
    record_byte_size: u64,
    #[getset(get_copy = "pub", set = "pub")]
    no_of_records: u64,
    #[getset(get_copy = "pub", set = "pub")]
    offset: u64,
    #[getset(get_copy = "pub", set = "pub")]
    length: u64,
    #[getset(get = "pub", set = "pub")]
    comment: String,
    #[getset(get = "pub", get_mut = "pub", set = "pub")]
    lineage: LineageInfo,
}

impl TableHeader {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            qv_build_no: String::new(),
            creator_doc: String::new(),
            create_utc_time: String::new(),
            source_create_utc_time: String::new(),
            source_file_utc_time: String::new(),
            stale_utc_time: String::new(),
            table_name: table_name.into(),
            source_file_size: -1,
            fields: Vec::new(),
            compression: String::new(),
            record_byte_size: 0,
            no_of_records: 0,
            offset: 0,
            length: 0,
            comment: String::new(),
            lineage: LineageInfo::default(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldHeader> {
        self.fields.iter().find(|f| f.field_name == name)
    }
}
