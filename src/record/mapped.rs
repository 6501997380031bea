//! Field-Backed Record
//!
//! The "reflected field" strategy: a plain struct carries the data, and a
//! static field table maps column names to getter/setter functions. The
//! table is declared once per record type and dispatches statically; there
//! is no runtime lookup of helpers by name.

use std::sync::Arc;

use crate::error::{DataError, DataResult};
use crate::metadata::TableDef;
use crate::value::{CellState, Value};

use super::Record;

/// One entry of a record type's static field table.
pub struct FieldDef<T> {
    /// Column name this field answers to (case-insensitive).
    pub name: &'static str,
    /// Read the field as a cell value.
    pub get: fn(&T) -> Value,
    /// Write a cell value into the field; coercion failures surface here.
    pub set: fn(&mut T, Value) -> DataResult<()>,
}

/// A struct whose fields are addressable as record columns.
///
/// Implementations declare their field table once; its order is the
/// struct's own, independent of the table definition's column order.
pub trait FieldAccess: Send + 'static {
    /// The static field table for this type.
    fn fields() -> &'static [FieldDef<Self>]
    where
        Self: Sized;
}

/// Record wrapping a field-accessible struct.
///
/// Cell presence is tracked beside the struct so that unset, explicit
/// null, and set are distinguishable even though the struct's own fields
/// cannot express "never written".
pub struct MappedRecord<T: FieldAccess> {
    table: Arc<TableDef>,
    inner: T,
    states: Vec<CellState>,
}

impl<T: FieldAccess> MappedRecord<T> {
    /// Wrap a struct with every cell starting unset.
    #[must_use]
    pub fn new(table: Arc<TableDef>, inner: T) -> Self {
        let states = vec![CellState::Unset; T::fields().len()];
        Self {
            table,
            inner,
            states,
        }
    }

    /// Wrap a struct whose current field values all count as written.
    #[must_use]
    pub fn with_populated(table: Arc<TableDef>, inner: T) -> Self {
        let states = T::fields()
            .iter()
            .map(|f| {
                if (f.get)(&inner).is_null() {
                    CellState::Null
                } else {
                    CellState::Set
                }
            })
            .collect();
        Self {
            table,
            inner,
            states,
        }
    }

    /// Borrow the backing struct.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Take the backing struct out of the record.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn field_index(name: &str) -> Option<usize> {
        T::fields()
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }
}

impl<T: FieldAccess> Record for MappedRecord<T> {
    fn table_def(&self) -> &Arc<TableDef> {
        &self.table
    }

    fn get(&self, name: &str) -> Value {
        match Self::field_index(name) {
            Some(i) if self.states[i] == CellState::Set => (T::fields()[i].get)(&self.inner),
            _ => Value::Null,
        }
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
        let index = Self::field_index(name).ok_or_else(|| {
            DataError::validation(format!(
                "unknown column {name} in table {}",
                self.table.name()
            ))
        })?;
        let state = if value.is_null() {
            CellState::Null
        } else {
            CellState::Set
        };
        (T::fields()[index].set)(&mut self.inner, value)?;
        self.states[index] = state;
        Ok(())
    }

    fn cell_state(&self, name: &str) -> CellState {
        Self::field_index(name)
            .map(|i| self.states[i])
            .unwrap_or(CellState::Unset)
    }

    fn clear(&mut self) {
        for (index, field) in T::fields().iter().enumerate() {
            let _ = (field.set)(&mut self.inner, Value::Null);
            self.states[index] = CellState::Unset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ColumnDef, DataType};

    #[derive(Default)]
    struct Student {
        id_student: Option<i32>,
        first_name: Option<String>,
    }

    impl FieldAccess for Student {
        fn fields() -> &'static [FieldDef<Self>] {
            &[
                FieldDef {
                    name: "id_student",
                    get: |s| s.id_student.map_or(Value::Null, Value::Int),
                    set: |s, v| {
                        s.id_student = v.as_int()?;
                        Ok(())
                    },
                },
                FieldDef {
                    name: "first_name",
                    get: |s| s.first_name.clone().map_or(Value::Null, Value::Text),
                    set: |s, v| {
                        s.first_name = v.as_text()?;
                        Ok(())
                    },
                },
            ]
        }
    }

    fn table() -> Arc<TableDef> {
        Arc::new(
            TableDef::builder("student")
                .add_primary_key_column(ColumnDef::new("id_student", DataType::Integer))
                .add_column(ColumnDef::new("first_name", DataType::varchar()))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_put_flows_into_struct_field() {
        let mut record = MappedRecord::new(table(), Student::default());
        record.put("FIRST_NAME", Value::from("Ada")).unwrap();
        assert_eq!(record.inner().first_name.as_deref(), Some("Ada"));
        assert_eq!(record.get("first_name"), Value::from("Ada"));
    }

    #[test]
    fn test_unset_reads_null_even_with_field_data() {
        let record = MappedRecord::new(
            table(),
            Student {
                id_student: Some(9),
                first_name: None,
            },
        );
        // Never written through the record, so invisible to it.
        assert_eq!(record.get("id_student"), Value::Null);
        assert_eq!(record.cell_state("id_student"), CellState::Unset);
    }

    #[test]
    fn test_with_populated_marks_fields_written() {
        let record = MappedRecord::with_populated(
            table(),
            Student {
                id_student: Some(9),
                first_name: None,
            },
        );
        assert_eq!(record.get("id_student"), Value::Int(9));
        assert_eq!(record.cell_state("first_name"), CellState::Null);
    }

    #[test]
    fn test_setter_coercion_failure_surfaces() {
        let mut record = MappedRecord::new(table(), Student::default());
        let err = record.put("id_student", Value::Bytes(vec![1])).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
    }

    #[test]
    fn test_ordinal_access_through_table_def() {
        let mut record = MappedRecord::new(table(), Student::default());
        record.put("first_name", Value::from("Ada")).unwrap();
        assert_eq!(record.get_at(1).unwrap(), Value::from("Ada"));
    }

    #[test]
    fn test_usable_as_record_trait_object() {
        let mut record: Box<dyn Record> = Box::new(MappedRecord::new(table(), Student::default()));
        record.put("first_name", Value::from("Ada")).unwrap();
        assert_eq!(record.get("first_name"), Value::from("Ada"));
        record.clear();
        assert_eq!(record.cell_state("first_name"), CellState::Unset);
    }

    #[test]
    fn test_into_inner_returns_struct() {
        let mut record = MappedRecord::new(table(), Student::default());
        record.put("first_name", Value::from("Ada")).unwrap();
        let student = record.into_inner();
        assert_eq!(student.first_name.as_deref(), Some("Ada"));
    }
}
