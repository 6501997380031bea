//! Record Abstraction
//!
//! A record is the in-memory representation of one entity instance,
//! addressed by column name (case-insensitive) and by ordinal position in
//! its table definition's column order. Three interchangeable storage
//! strategies implement one capability set:
//!
//! - [`NamedRecord`]: case-insensitive name-to-cell map
//! - [`OrdinalRecord`]: fixed-size cell vector aligned to the column order
//! - [`MappedRecord`]: field-backed struct with a static field table
//!
//! All three behave identically from the caller's perspective: `get` on a
//! column never written returns the null marker, never an error, and
//! `cell_state` distinguishes never-set from explicitly-null from set.
//! A record carries its `TableDef` but never a live connection.

mod mapped;
mod named;
mod ordinal;

use std::sync::Arc;

pub use mapped::{FieldAccess, FieldDef, MappedRecord};
pub use named::NamedRecord;
pub use ordinal::OrdinalRecord;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{DataError, DataResult};
use crate::metadata::TableDef;
use crate::value::{CellState, Value};

/// One entity instance, addressed by column.
///
/// Exclusively owned by calling code; carries no server-side identity
/// beyond its primary key value.
pub trait Record: Send {
    /// The table definition this record represents.
    fn table_def(&self) -> &Arc<TableDef>;

    /// Read a column by name, case-insensitive.
    ///
    /// Returns the null marker for a column that was never written.
    fn get(&self, name: &str) -> Value;

    /// Read a column by 0-based ordinal in declaration order.
    fn get_at(&self, ordinal: usize) -> DataResult<Value>;

    /// Write a column by name, case-insensitive.
    ///
    /// Writing an unknown column is a validation error.
    fn put(&mut self, name: &str, value: Value) -> DataResult<()>;

    /// Presence of the named column's cell.
    fn cell_state(&self, name: &str) -> CellState;

    /// Reset every cell to unset.
    fn clear(&mut self);

    /// Whether the column holds no value (never set, or explicitly null).
    fn is_null(&self, name: &str) -> bool {
        !matches!(self.cell_state(name), CellState::Set)
    }

    /// Typed read as `i32`; longs narrow when they fit, text parses.
    fn get_int(&self, name: &str) -> DataResult<Option<i32>> {
        self.get(name).as_int()
    }

    /// Typed read as `i64`; ints widen, text parses.
    fn get_long(&self, name: &str) -> DataResult<Option<i64>> {
        self.get(name).as_long()
    }

    /// Typed read as `Decimal`; integers widen, text parses.
    fn get_decimal(&self, name: &str) -> DataResult<Option<Decimal>> {
        self.get(name).as_decimal()
    }

    /// Typed read as text; numbers and temporal values render.
    fn get_string(&self, name: &str) -> DataResult<Option<String>> {
        self.get(name).as_text()
    }

    /// Typed read as raw bytes; only the bytes family qualifies.
    fn get_bytes(&self, name: &str) -> DataResult<Option<Vec<u8>>> {
        self.get(name).as_bytes()
    }

    /// Typed read as a timestamp; dates widen to midnight UTC.
    fn get_timestamp(&self, name: &str) -> DataResult<Option<DateTime<Utc>>> {
        self.get(name).as_timestamp()
    }

    /// Ordered primary key values.
    ///
    /// A primary key cell without a value is a validation error; auto
    /// generation happens in the table, before this is consulted.
    fn primary_key(&self) -> DataResult<Vec<Value>> {
        let def = self.table_def();
        let mut key = Vec::with_capacity(def.primary_key().len());
        for column in def.primary_key() {
            match self.cell_state(column) {
                CellState::Set => key.push(self.get(column)),
                CellState::Null | CellState::Unset => {
                    return Err(DataError::validation(format!(
                        "primary key column {} of table {} has no value",
                        column,
                        def.name()
                    )));
                }
            }
        }
        Ok(key)
    }

    /// Check declared constraints before the record reaches a backend:
    /// not-null columns must be set (auto-generated ones excepted) and
    /// every set value must belong to its declared type family.
    fn validate(&self) -> DataResult<()> {
        let def = self.table_def();
        for column in def.columns() {
            match self.cell_state(&column.name) {
                CellState::Set => {
                    let value = self.get(&column.name);
                    if !column.data_type.accepts(&value) {
                        return Err(DataError::validation(format!(
                            "column {} of table {} expects {} but holds {}",
                            column.name,
                            def.name(),
                            column.data_type,
                            value.kind()
                        )));
                    }
                }
                CellState::Null | CellState::Unset => {
                    if !column.nullable && !column.auto_generate {
                        return Err(DataError::validation(format!(
                            "column {} of table {} is not nullable",
                            column.name,
                            def.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
