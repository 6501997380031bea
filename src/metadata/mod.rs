//! Metadata Model
//!
//! Engine-independent description of storage structures: tables, columns,
//! primary and foreign keys, indexes, sequences, and procedures, grouped
//! into packages under a named schema. Built once at startup, validated at
//! seal time, read-only and `Arc`-shared afterwards. Backend adapters
//! consume these definitions to create and validate physical structures.

mod column;
mod schema;
mod script;
mod table;

pub use column::{ColumnDef, DataType};
pub use schema::{Package, SchemaBuilder, SchemaMetaData};
pub use script::{ProcedureDef, ProcedureParam, ScriptDialect, Scriptable, SequenceDef};
pub use table::{ForeignKeyDef, IndexDef, IndexKind, TableDef, TableDefBuilder};
