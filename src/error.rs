use std::path::PathBuf;

use thiserror::Error;

/// The crate-wide result alias; every fallible operation returns this.
pub type Result<T> = std::result::Result<T, QvdError>;

/// Every way a read or write of a QVD file can fail.
#[derive(Debug, Error)]
pub enum QvdError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid XML header: {0}")]
    InvalidXml(String),

    #[error("missing required element <{0}>")]
    MissingRequiredElement(&'static str),

    #[error("symbol block for field {field:?} ended after {consumed} of {len} bytes with symbols remaining")]
    TruncatedSymbolBlock {
        field: String,
        consumed: usize,
        len: usize,
    },

    #[error("unknown symbol tag 0x{tag:02x} in field {field:?}")]
    UnknownSymbolTag { field: String, tag: u8 },

    #[error("symbol in field {field:?} is not valid utf-8")]
    InvalidUtf8Symbol { field: String },

    #[error("record index {index} in field {field:?} is out of range for {no_of_symbols} symbols")]
    CorruptRecordIndex {
        field: String,
        index: u64,
        no_of_symbols: usize,
    },

    #[error("column {column:?} has unsupported type {found} for a QVD write")]
    SchemaMismatch { column: String, found: String },

    #[error("overflow: {0}")]
    Overflow(String),
}

impl QvdError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
