//! Ordinal-Keyed Record
//!
//! Cells live in a fixed-size vector aligned to the table definition's
//! column order; name access resolves to an ordinal through the
//! definition.

use std::sync::Arc;

use crate::error::{DataError, DataResult};
use crate::metadata::TableDef;
use crate::value::{CellState, Value};

use super::Record;

/// Record backed by a cell vector in declaration order.
///
/// `None` is an unset cell, `Some(Value::Null)` an explicit null.
#[derive(Debug, Clone)]
pub struct OrdinalRecord {
    table: Arc<TableDef>,
    cells: Vec<Option<Value>>,
}

impl OrdinalRecord {
    /// Create an empty record for the given table.
    #[must_use]
    pub fn new(table: Arc<TableDef>) -> Self {
        let cells = vec![None; table.column_count()];
        Self { table, cells }
    }

    /// Write a cell directly by ordinal.
    pub fn put_at(&mut self, ordinal: usize, value: Value) -> DataResult<()> {
        if ordinal >= self.cells.len() {
            return Err(DataError::validation(format!(
                "ordinal {ordinal} out of range for table {}",
                self.table.name()
            )));
        }
        self.cells[ordinal] = Some(value);
        Ok(())
    }

    fn resolve(&self, name: &str) -> DataResult<usize> {
        self.table.ordinal_of(name).ok_or_else(|| {
            DataError::validation(format!(
                "unknown column {name} in table {}",
                self.table.name()
            ))
        })
    }
}

impl Record for OrdinalRecord {
    fn table_def(&self) -> &Arc<TableDef> {
        &self.table
    }

    fn get(&self, name: &str) -> Value {
        self.table
            .ordinal_of(name)
            .and_then(|i| self.cells[i].clone())
            .unwrap_or(Value::Null)
    }

    fn get_at(&self, ordinal: usize) -> DataResult<Value> {
        if ordinal >= self.cells.len() {
            return Err(DataError::validation(format!(
                "ordinal {ordinal} out of range for table {}",
                self.table.name()
            )));
        }
        Ok(self.cells[ordinal].clone().unwrap_or(Value::Null))
    }

    fn put(&mut self, name: &str, value: Value) -> DataResult<()> {
        let ordinal = self.resolve(name)?;
        self.cells[ordinal] = Some(value);
        Ok(())
    }

    fn cell_state(&self, name: &str) -> CellState {
        match self.table.ordinal_of(name).map(|i| &self.cells[i]) {
            None | Some(None) => CellState::Unset,
            Some(Some(Value::Null)) => CellState::Null,
            Some(Some(_)) => CellState::Set,
        }
    }

    fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDef, DataType};

    fn student() -> Arc<TableDef> {
        Arc::new(
            TableDef::builder("student")
                .add_primary_key_column(ColumnDef::new("id_student", DataType::Integer))
                .add_column(ColumnDef::new("first_name", DataType::varchar()))
                .add_column(ColumnDef::new("last_name", DataType::varchar()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_name_resolves_to_ordinal() {
        let mut record = OrdinalRecord::new(student());
        record.put("First_Name", Value::from("Ada")).unwrap();
        assert_eq!(record.get_at(1).unwrap(), Value::from("Ada"));
        assert_eq!(record.get("first_name"), Value::from("Ada"));
    }

    #[test]
    fn test_put_at_by_ordinal() {
        let mut record = OrdinalRecord::new(student());
        record.put_at(2, Value::from("Lovelace")).unwrap();
        assert_eq!(record.get("LAST_NAME"), Value::from("Lovelace"));
        assert!(record.put_at(3, Value::Null).is_err());
    }

    #[test]
    fn test_unset_versus_explicit_null() {
        let mut record = OrdinalRecord::new(student());
        record.put("last_name", Value::Null).unwrap();
        assert_eq!(record.cell_state("last_name"), CellState::Null);
        assert_eq!(record.cell_state("first_name"), CellState::Unset);
        assert_eq!(record.get("first_name"), Value::Null);
    }

    #[test]
    fn test_clear_resets_to_unset() {
        let mut record = OrdinalRecord::new(student());
        record.put("first_name", Value::from("Ada")).unwrap();
        record.clear();
        assert_eq!(record.cell_state("first_name"), CellState::Unset);
    }

    #[test]
    fn test_unknown_column_is_validation_error() {
        let mut record = OrdinalRecord::new(student());
        assert!(record.put("nickname", Value::from("A")).is_err());
    }
}
