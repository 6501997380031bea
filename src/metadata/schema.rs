//! Schema Metadata
//!
//! A `SchemaMetaData` is the named, read-only graph of packages and tables
//! shared by every operation against the schema. It is built once at
//! startup through `SchemaBuilder` and sealed; sealing performs the
//! cross-table validation that single-table builders cannot (foreign key
//! targets must exist).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

use super::table::TableDef;

// =============================================================================
// Package
// =============================================================================

/// Named group of tables within a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    name: String,
    /// Lower-cased table name to definition.
    tables: BTreeMap<String, Arc<TableDef>>,
}

impl Package {
    /// Package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a table by name, case-insensitive.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Arc<TableDef>> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    /// Tables in this package, in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableDef>> {
        self.tables.values()
    }

    /// Number of tables in this package.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

// =============================================================================
// Schema
// =============================================================================

/// Sealed, immutable schema: name, packages, tables.
///
/// Shared via `Arc` by all operations; never mutated after `seal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaMetaData {
    name: String,
    packages: BTreeMap<String, Package>,
}

impl SchemaMetaData {
    /// Start building a schema.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.get(&name.to_ascii_lowercase())
    }

    /// Packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Look up a table in a specific package.
    #[must_use]
    pub fn table(&self, package: &str, name: &str) -> Option<&Arc<TableDef>> {
        self.package(package).and_then(|p| p.table(name))
    }

    /// Find a table by name across all packages.
    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<&Arc<TableDef>> {
        self.packages.values().find_map(|p| p.table(name))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for `SchemaMetaData`.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    packages: BTreeMap<String, Package>,
}

impl SchemaBuilder {
    /// Create a builder for the named schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Register a table into a package.
    ///
    /// Fails with a validation error if the package already holds a table
    /// with the same name (case-insensitive).
    pub fn add_table(mut self, package: impl Into<String>, table: TableDef) -> DataResult<Self> {
        let package_name = package.into();
        let entry = self
            .packages
            .entry(package_name.to_ascii_lowercase())
            .or_insert_with(|| Package {
                name: package_name,
                tables: BTreeMap::new(),
            });
        let key = table.name().to_ascii_lowercase();
        if entry.tables.contains_key(&key) {
            return Err(DataError::validation(format!(
                "table {} already exists in package {}",
                table.name(),
                entry.name
            )));
        }
        entry.tables.insert(key, Arc::new(table));
        Ok(self)
    }

    /// Validate cross-table invariants and produce the sealed schema.
    ///
    /// Every foreign key's referenced table must exist somewhere in the
    /// schema, and each referenced column must exist in that table.
    pub fn seal(self) -> DataResult<SchemaMetaData> {
        let schema = SchemaMetaData {
            name: self.name,
            packages: self.packages,
        };

        for package in schema.packages.values() {
            for table in package.tables.values() {
                for foreign_key in table.foreign_keys() {
                    let Some(target) = schema.find_table(&foreign_key.referenced_table) else {
                        return Err(DataError::validation(format!(
                            "foreign key {} on table {} references unknown table {}",
                            foreign_key.name,
                            table.name(),
                            foreign_key.referenced_table
                        )));
                    };
                    for (_, target_column) in &foreign_key.column_pairs {
                        if target.column(target_column).is_none() {
                            return Err(DataError::validation(format!(
                                "foreign key {} on table {} references unknown column {}.{}",
                                foreign_key.name,
                                table.name(),
                                target.name(),
                                target_column
                            )));
                        }
                    }
                }
            }
        }

        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::column::{ColumnDef, DataType};
    use crate::metadata::table::ForeignKeyDef;

    fn student() -> TableDef {
        TableDef::builder("student")
            .add_primary_key_column(ColumnDef::new("id_student", DataType::Integer))
            .add_column(ColumnDef::new("first_name", DataType::varchar()))
            .build()
            .unwrap()
    }

    fn enrollment(referenced_table: &str) -> TableDef {
        TableDef::builder("student_x_course")
            .add_primary_key_column(ColumnDef::new("id_student", DataType::Integer))
            .add_primary_key_column(ColumnDef::new("id_course", DataType::Integer))
            .add_foreign_key(ForeignKeyDef::new(
                "fk_enrollment_student",
                "student_x_course",
                referenced_table,
                vec![("id_student".to_string(), "id_student".to_string())],
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_seal_resolves_foreign_keys() {
        let schema = SchemaMetaData::builder("campus")
            .add_table("core", student())
            .unwrap()
            .add_table("core", enrollment("student"))
            .unwrap()
            .seal()
            .unwrap();

        assert_eq!(schema.name(), "campus");
        assert!(schema.table("core", "student").is_some());
        assert!(schema.find_table("STUDENT_X_COURSE").is_some());
    }

    #[test]
    fn test_seal_fails_on_unknown_referenced_table() {
        let err = SchemaMetaData::builder("campus")
            .add_table("core", enrollment("no_such_table"))
            .unwrap()
            .seal()
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_seal_fails_on_unknown_referenced_column() {
        let bad = TableDef::builder("student_x_course")
            .add_primary_key_column(ColumnDef::new("id_student", DataType::Integer))
            .add_foreign_key(ForeignKeyDef::new(
                "fk_bad",
                "student_x_course",
                "student",
                vec![("id_student".to_string(), "no_such_column".to_string())],
            ))
            .build()
            .unwrap();

        let err = SchemaMetaData::builder("campus")
            .add_table("core", student())
            .unwrap()
            .add_table("core", bad)
            .unwrap()
            .seal()
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_duplicate_table_in_package_rejected() {
        let err = SchemaMetaData::builder("campus")
            .add_table("core", student())
            .unwrap()
            .add_table("core", student())
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[test]
    fn test_sealed_schema_survives_json_round_trip() {
        let schema = SchemaMetaData::builder("campus")
            .add_table("core", student())
            .unwrap()
            .add_table("core", enrollment("student"))
            .unwrap()
            .seal()
            .unwrap();

        let json = serde_json::to_string(&schema).unwrap();
        let restored: SchemaMetaData = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.name(), "campus");
        let table = restored.table("core", "student").unwrap();
        assert_eq!(table.primary_key(), &["id_student".to_string()]);
        assert!(restored.find_table("student_x_course").is_some());
    }

    #[test]
    fn test_same_table_name_allowed_across_packages() {
        let schema = SchemaMetaData::builder("campus")
            .add_table("core", student())
            .unwrap()
            .add_table("archive", student())
            .unwrap()
            .seal()
            .unwrap();
        assert_eq!(schema.package("core").unwrap().table_count(), 1);
        assert_eq!(schema.package("archive").unwrap().table_count(), 1);
    }
}
