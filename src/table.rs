//! The in-memory columnar representation exchanged with callers: the external
//! interchange surface described in §6, modeled directly rather than left abstract.

use getset::Getters;

use crate::value::FieldValue;

/// One named, typed column: a dense array of optional values, one per row.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct Column {
    #[getset(get = "pub")]
    name: String,
    #[getset(get = "pub")]
    values: Vec<Option<FieldValue>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<FieldValue>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An ordered list of named columns sharing a common row count.
#[derive(Debug, Clone, Default, PartialEq, Getters)]
pub struct Table {
    #[getset(get = "pub")]
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn no_of_records(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Appends another batch's rows to each matching column, in schema order.
    /// Concatenating batches lets a caller feed successive record batches before
    /// a single `write` call, as the external table surface requires.
    pub fn concat(mut self, other: Table) -> crate::error::Result<Table> {
        if self.columns.is_empty() {
            return Ok(other);
        }
        if other.columns.is_empty() {
            return Ok(self);
        }
        if self.columns.len() != other.columns.len() {
            return Err(crate::error::QvdError::SchemaMismatch {
                column: "<table>".to_string(),
                found: format!(
                    "batch has {} columns, expected {}",
                    other.columns.len(),
                    self.columns.len()
                ),
            });
        }
        for (col, mut other_col) in self.columns.iter_mut().zip(other.columns) {
            if col.name != other_col.name {
                return Err(crate::error::QvdError::SchemaMismatch {
                    column: other_col.name.clone(),
                    found: format!("expected column {:?} at this position", col.name),
                });
            }
            col.values.append(&mut other_col.values);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_appends_rows_column_by_column() {
        let a = Table::new(vec![Column::new("X", vec![Some(FieldValue::Integer32(1))])]);
        let b = Table::new(vec![Column::new("X", vec![Some(FieldValue::Integer32(2))])]);
        let merged = a.concat(b).unwrap();
        assert_eq!(merged.no_of_records(), 2);
        assert_eq!(
            merged.column("X").unwrap().values(),
            &vec![Some(FieldValue::Integer32(1)), Some(FieldValue::Integer32(2))]
        );
    }

    #[test]
    fn concat_rejects_mismatched_schemas() {
        let a = Table::new(vec![Column::new("X", vec![None])]);
        let b = Table::new(vec![Column::new("Y", vec![None])]);
        assert!(a.concat(b).is_err());
    }

    #[test]
    fn concat_with_an_empty_table_is_a_no_op() {
        let a = Table::new(vec![Column::new("X", vec![Some(FieldValue::Integer32(1))])]);
        let merged = a.clone().concat(Table::default()).unwrap();
        assert_eq!(merged, a);
    }
}
