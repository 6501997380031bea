//! Table Definitions
//!
//! A `TableDef` is the engine-neutral description of one table: ordered
//! columns (order defines ordinal addressing), a non-empty primary key
//! subset, foreign keys, and indexes. Built through `TableDefBuilder`;
//! intra-table invariants are checked at `build`, cross-table invariants
//! (foreign key targets) when the enclosing schema is sealed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{IDENTIFIER_BYTES_MAX, TABLE_COLUMNS_COUNT_MAX};
use crate::error::{DataError, DataResult};

use super::column::ColumnDef;

// =============================================================================
// Foreign Keys and Indexes
// =============================================================================

/// Foreign key from an owning table to a referenced table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Constraint name.
    pub name: String,
    /// Table that owns the constraint.
    pub owning_table: String,
    /// Table the constraint points at.
    pub referenced_table: String,
    /// Ordered (local column, target column) pairs.
    pub column_pairs: Vec<(String, String)>,
}

impl ForeignKeyDef {
    /// Create a foreign key over one or more column pairs.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        owning_table: impl Into<String>,
        referenced_table: impl Into<String>,
        column_pairs: Vec<(String, String)>,
    ) -> Self {
        Self {
            name: name.into(),
            owning_table: owning_table.into(),
            referenced_table: referenced_table.into(),
            column_pairs,
        }
    }
}

/// Cardinality kind of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// At most one row per key.
    Unique,
    /// Any number of rows per key.
    NonUnique,
    /// One-to-one relationship index.
    OneToOne,
    /// One-to-many relationship index.
    OneToMany,
}

/// Secondary index over one or more columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns, in index order.
    pub columns: Vec<String>,
    /// Cardinality kind.
    pub kind: IndexKind,
}

impl IndexDef {
    /// Create an index over the given columns.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            columns,
            kind,
        }
    }
}

// =============================================================================
// Table Definition
// =============================================================================

/// Immutable description of one table.
///
/// Column order defines 0-based ordinal addressing; name lookup is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyDef>,
    indexes: Vec<IndexDef>,
    /// Lower-cased name to ordinal, rebuilt on deserialize.
    #[serde(skip)]
    ordinals: HashMap<String, usize>,
}

impl TableDef {
    /// Start building a table definition.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableDefBuilder {
        TableDefBuilder::new(name)
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Number of declared columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Look up a column by name, case-insensitive.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.ordinal_of(name).map(|i| &self.columns[i])
    }

    /// Resolve a column name to its 0-based ordinal, case-insensitive.
    #[must_use]
    pub fn ordinal_of(&self, name: &str) -> Option<usize> {
        if self.ordinals.is_empty() && !self.columns.is_empty() {
            // Deserialized instance: the skip-serialized map is empty,
            // fall back to a scan.
            return self.columns.iter().position(|c| c.matches_name(name));
        }
        self.ordinals.get(&name.to_ascii_lowercase()).copied()
    }

    /// Look up a column by ordinal.
    #[must_use]
    pub fn column_at(&self, ordinal: usize) -> Option<&ColumnDef> {
        self.columns.get(ordinal)
    }

    /// Primary key column names, in key order.
    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Check membership in the primary key, case-insensitive.
    #[must_use]
    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k.eq_ignore_ascii_case(name))
    }

    /// Declared foreign keys.
    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKeyDef] {
        &self.foreign_keys
    }

    /// Declared indexes.
    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Pure data builder for `TableDef`.
///
/// Intra-table invariants (duplicate column, primary key / index over an
/// unknown column, empty primary key) are validation errors at `build`.
#[derive(Debug)]
pub struct TableDefBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyDef>,
    indexes: Vec<IndexDef>,
}

impl TableDefBuilder {
    /// Create a builder for the named table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Append a column. Declaration order defines ordinals.
    #[must_use]
    pub fn add_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a column and include it in the primary key.
    #[must_use]
    pub fn add_primary_key_column(mut self, column: ColumnDef) -> Self {
        self.primary_key.push(column.name.clone());
        self.columns.push(column.not_null());
        self
    }

    /// Add a foreign key constraint.
    #[must_use]
    pub fn add_foreign_key(mut self, foreign_key: ForeignKeyDef) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Add a secondary index.
    #[must_use]
    pub fn add_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Validate intra-table invariants and produce the immutable definition.
    pub fn build(self) -> DataResult<TableDef> {
        if self.name.is_empty() || self.name.len() > IDENTIFIER_BYTES_MAX {
            return Err(DataError::validation(format!(
                "table name must be 1..={IDENTIFIER_BYTES_MAX} bytes"
            )));
        }
        if self.columns.is_empty() {
            return Err(DataError::validation(format!(
                "table {} declares no columns",
                self.name
            )));
        }
        if self.columns.len() > TABLE_COLUMNS_COUNT_MAX {
            return Err(DataError::validation(format!(
                "table {} exceeds {TABLE_COLUMNS_COUNT_MAX} columns",
                self.name
            )));
        }
        if self.primary_key.is_empty() {
            return Err(DataError::validation(format!(
                "table {} declares no primary key",
                self.name
            )));
        }

        let mut ordinals = HashMap::with_capacity(self.columns.len());
        for (ordinal, column) in self.columns.iter().enumerate() {
            if column.name.is_empty() || column.name.len() > IDENTIFIER_BYTES_MAX {
                return Err(DataError::validation(format!(
                    "column name must be 1..={IDENTIFIER_BYTES_MAX} bytes in table {}",
                    self.name
                )));
            }
            let lowered = column.name.to_ascii_lowercase();
            if ordinals.insert(lowered, ordinal).is_some() {
                return Err(DataError::validation(format!(
                    "duplicate column {} in table {}",
                    column.name, self.name
                )));
            }
        }

        for key_column in &self.primary_key {
            if !ordinals.contains_key(&key_column.to_ascii_lowercase()) {
                return Err(DataError::validation(format!(
                    "primary key column {} unknown in table {}",
                    key_column, self.name
                )));
            }
        }

        for index in &self.indexes {
            for indexed in &index.columns {
                if !ordinals.contains_key(&indexed.to_ascii_lowercase()) {
                    return Err(DataError::validation(format!(
                        "index {} references unknown column {} in table {}",
                        index.name, indexed, self.name
                    )));
                }
            }
        }

        for foreign_key in &self.foreign_keys {
            for (local, _) in &foreign_key.column_pairs {
                if !ordinals.contains_key(&local.to_ascii_lowercase()) {
                    return Err(DataError::validation(format!(
                        "foreign key {} references unknown local column {} in table {}",
                        foreign_key.name, local, self.name
                    )));
                }
            }
        }

        Ok(TableDef {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            foreign_keys: self.foreign_keys,
            indexes: self.indexes,
            ordinals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::column::DataType;

    fn student() -> TableDef {
        TableDef::builder("student")
            .add_primary_key_column(ColumnDef::new("id_student", DataType::Integer))
            .add_column(ColumnDef::new("first_name", DataType::varchar_with_length(64)))
            .add_column(ColumnDef::new("last_name", DataType::varchar_with_length(64)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_ordinal_order_is_declaration_order() {
        let def = student();
        assert_eq!(def.ordinal_of("id_student"), Some(0));
        assert_eq!(def.ordinal_of("first_name"), Some(1));
        assert_eq!(def.ordinal_of("last_name"), Some(2));
        assert_eq!(def.column_at(1).unwrap().name, "first_name");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let def = student();
        assert!(def.column("FIRST_NAME").is_some());
        assert_eq!(def.ordinal_of("First_Name"), Some(1));
        assert!(def.is_primary_key("ID_STUDENT"));
    }

    #[test]
    fn test_duplicate_column_is_validation_error() {
        let err = TableDef::builder("t")
            .add_primary_key_column(ColumnDef::new("id", DataType::Integer))
            .add_column(ColumnDef::new("Name", DataType::varchar()))
            .add_column(ColumnDef::new("name", DataType::varchar()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_empty_primary_key_is_validation_error() {
        let err = TableDef::builder("t")
            .add_column(ColumnDef::new("name", DataType::varchar()))
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_index_over_unknown_column_is_validation_error() {
        let err = TableDef::builder("t")
            .add_primary_key_column(ColumnDef::new("id", DataType::Integer))
            .add_index(IndexDef::new(
                "ix_missing",
                vec!["nope".to_string()],
                IndexKind::NonUnique,
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_foreign_key_unknown_local_column_is_validation_error() {
        let err = TableDef::builder("t")
            .add_primary_key_column(ColumnDef::new("id", DataType::Integer))
            .add_foreign_key(ForeignKeyDef::new(
                "fk_bad",
                "t",
                "other",
                vec![("missing".to_string(), "id".to_string())],
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_primary_key_columns_become_not_null() {
        let def = student();
        assert!(!def.column("id_student").unwrap().nullable);
    }
}
