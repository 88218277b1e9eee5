//! The typed vocabulary shared by the header, symbol and record codecs.

use getset::{CopyGetters, Getters, Setters};

/// A single decoded symbol, or a resolved cell value once a record has been unpacked.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer32(i32),
    Float64(f64),
    NullRef,
    Utf8Text(String),
    /// Carries both representations of a dual symbol; the text is canonical for display.
    DualInt(String, i32),
    /// Carries both representations of a dual symbol; the text is canonical for display.
    DualFloat(String, f64),
}

impl FieldValue {
    /// The on-disk symbol tag this value would be encoded with.
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Integer32(_) => 0x01,
            FieldValue::Float64(_) => 0x02,
            FieldValue::NullRef => 0x03,
            FieldValue::Utf8Text(_) => 0x04,
            FieldValue::DualInt(..) => 0x05,
            FieldValue::DualFloat(..) => 0x06,
        }
    }

    /// The text a reader materializes for this value, per the "text is canonical" rule.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Utf8Text(s) => Some(s),
            FieldValue::DualInt(s, _) => Some(s),
            FieldValue::DualFloat(s, _) => Some(s),
            _ => None,
        }
    }
}

/// The on-disk field type, as recorded in `NumberFormat/Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Unknown,
    Ascii,
    Date,
    Timestamp,
    Integer,
    Real,
    Interval,
    Fix,
}

impl FieldType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            FieldType::Unknown => "UNKNOWN",
            FieldType::Ascii => "ASCII",
            FieldType::Date => "DATE",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Integer => "INTEGER",
            FieldType::Real => "REAL",
            FieldType::Interval => "INTERVAL",
            FieldType::Fix => "FIX",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "UNKNOWN" => FieldType::Unknown,
            "ASCII" => FieldType::Ascii,
            "DATE" => FieldType::Date,
            "TIMESTAMP" => FieldType::Timestamp,
            "INTEGER" => FieldType::Integer,
            "REAL" => FieldType::Real,
            "INTERVAL" => FieldType::Interval,
            "FIX" => FieldType::Fix,
            _ => return None,
        })
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Unknown
    }
}

/// One of the fixed `$`-prefixed tag strings QVD attaches to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTag {
    Numeric,
    Integer,
    Ascii,
    Text,
    Timestamp,
    Date,
    Hidden,
    Key,
}

impl FieldTag {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            FieldTag::Numeric => "$numeric",
            FieldTag::Integer => "$integer",
            FieldTag::Ascii => "$ascii",
            FieldTag::Text => "$text",
            FieldTag::Timestamp => "$timestamp",
            FieldTag::Date => "$date",
            FieldTag::Hidden => "$hidden",
            FieldTag::Key => "$key",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "$numeric" => FieldTag::Numeric,
            "$integer" => FieldTag::Integer,
            "$ascii" => FieldTag::Ascii,
            "$text" => FieldTag::Text,
            "$timestamp" => FieldTag::Timestamp,
            "$date" => FieldTag::Date,
            "$hidden" => FieldTag::Hidden,
            "$key" => FieldTag::Key,
            _ => return None,
        })
    }
}

/// Display/parsing hints attached to a field; QVD rarely populates more than `Type`.
#[derive(Debug, Clone, Default, CopyGetters, Getters, Setters)]
pub struct NumberFormat {
    #[getset(get_copy = "pub", set = "pub")]
    r#type: FieldType,
    #[getset(get_copy = "pub", set = "pub")]
    n_dec: i32,
    #[getset(get_copy = "pub", set = "pub")]
    use_thou: i32,
    #[getset(get = "pub", set = "pub")]
    fmt: Option<String>,
    #[getset(get = "pub", set = "pub")]
    dec: Option<String>,
    #[getset(get = "pub", set = "pub")]
    thou: Option<String>,
}

impl NumberFormat {
    pub fn with_type(r#type: FieldType) -> Self {
        Self {
            r#type,
            ..Default::default()
        }
    }
}
