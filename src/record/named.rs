//! Name-Keyed Record
//!
//! Cells live in a plain `HashMap` whose keys are lower-cased at every
//! insert and lookup boundary; no specialized container type. Insertion
//! order is irrelevant, ordinal reads resolve through the table
//! definition.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DataError, DataResult};
use crate::metadata::TableDef;
use crate::value::{CellState, Value};

use super::Record;

/// Record backed by a case-insensitive name-to-cell map.
///
/// An entry holding `Value::Null` is an explicit null; an absent entry is
/// an unset cell.
#[derive(Debug, Clone)]
pub struct NamedRecord {
    table: Arc<TableDef>,
    cells: HashMap<String, Value>,
}

impl NamedRecord {
    /// Create an empty record for the given table.
    #[must_use]
    pub fn new(table: Arc<TableDef>) -> Self {
        Self {
            table,
            cells: HashMap::new(),
        }
    }

    /// Create a record pre-populated from (name, value) pairs.
    pub fn from_values(
        table: Arc<TableDef>,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> DataResult<Self> {
        let mut record = Self::new(table);
        for (name, value) in values {
            record.put(&name, value)?;
        }
        Ok(record)
    }

    /// Number of cells currently written (set or explicitly null).
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.cells.len()
    }
}

impl Record for NamedRecord {
    fn table_def(&self) -> &Arc<TableDef> {
        &self.table
    }

    fn get(&self, name: &str) -> Value {
        self.cells
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn get_at(&self, ordinal: usize) -> DataResult<Value> {
        let column = self.table.column_at(ordinal).ok_or_else(|| {
            DataError::validation(format!(
                "ordinal {ordinal} out of range for table {}",
                self.table.name()
            ))
        })?;
        Ok(self.get(&column.name))
    }

    fn put(&mut self, name: &str, value: Value) -> DataResult<()> {
        if self.table.column(name).is_none() {
            return Err(DataError::validation(format!(
                "unknown column {name} in table {}",
                self.table.name()
            )));
        }
        self.cells.insert(name.to_ascii_lowercase(), value);
        Ok(())
    }

    fn cell_state(&self, name: &str) -> CellState {
        match self.cells.get(&name.to_ascii_lowercase()) {
            None => CellState::Unset,
            Some(Value::Null) => CellState::Null,
            Some(_) => CellState::Set,
        }
    }

    fn clear(&mut self) {
        self.cells.clear();
    }
}
