//! # Polystore
//!
//! An engine-neutral persistence layer: describe your entities once, then
//! store, load, query, and aggregate them against any registered backend
//! through one contract.
//!
//! ## Features
//!
//! - **Engine-neutral metadata**: tables, columns, keys, indexes, and
//!   sequences described independently of any backend
//! - **Three record strategies**: name-addressed maps, ordinal vectors,
//!   and field-backed structs with identical behavior
//! - **Typed byte codec**: a stable wire encoding for every declared type,
//!   null included
//! - **Composable queries**: predicate trees, ordering, windowing, and
//!   aggregates evaluated by the engine
//! - **Key-value buckets**: the same open/act/close discipline for opaque
//!   payloads
//! - **Engine registry**: configuration selects the backend by name at
//!   runtime
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use polystore::metadata::{ColumnDef, DataType, TableDef};
//! use polystore::operation::TableOperation;
//! use polystore::record::{NamedRecord, Record};
//! use polystore::registry::EngineRegistry;
//! use polystore::source::{SourceConfig, KEY_ENGINE};
//! use polystore::value::Value;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let def = Arc::new(
//!     TableDef::builder("student")
//!         .add_primary_key_column(
//!             ColumnDef::new("id_student", DataType::Integer).auto_generated(),
//!         )
//!         .add_column(ColumnDef::new("first_name", DataType::varchar_with_length(64)))
//!         .build()?,
//! );
//!
//! let registry = EngineRegistry::with_defaults();
//! let source = registry.create(&SourceConfig::new().with(KEY_ENGINE, "memory"))?;
//!
//! let mut op = TableOperation::open(source.as_ref(), NamedRecord::new(def)).await?;
//! op.record_mut().put("first_name", Value::from("Ada"))?;
//! op.store().await?;
//!
//! let id = op.record().get_int("id_student")?.unwrap();
//! assert!(op.exists().await?);
//! # let _ = id;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  TableOperation / BucketOperation (lifecycle wrappers)  │
//! ├─────────────────────────────────────────────────────────┤
//! │  Record          │ Query / Predicate  │ SchemaMetaData  │
//! ├─────────────────────────────────────────────────────────┤
//! │  DataSource contract: Table, View, Bucket, Sequence     │
//! ├─────────────────────────────────────────────────────────┤
//! │  EngineRegistry  │  memory engine  │  codec             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-memory engine implements the full contract and doubles as the
//! behavioral reference for adapter authors.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod constants;
pub mod error;
pub mod metadata;
pub mod operation;
pub mod query;
pub mod record;
pub mod registry;
pub mod source;
pub mod telemetry;
pub mod value;

// Re-export common types
pub use constants::*;
pub use error::{DataError, DataResult};
pub use metadata::{
    ColumnDef, DataType, ForeignKeyDef, IndexDef, IndexKind, Package, ProcedureDef,
    ProcedureParam, SchemaBuilder, SchemaMetaData, ScriptDialect, Scriptable, SequenceDef,
    TableDef, TableDefBuilder,
};
pub use operation::{BucketOperation, TableOperation};
pub use query::{
    AggregateFunc, CompareOp, FetchSpec, JoinKind, JoinSpec, Operand, Predicate, Query,
    SelectExpr, SortDirection, SortKey,
};
pub use record::{FieldAccess, FieldDef, MappedRecord, NamedRecord, OrdinalRecord, Record};
pub use registry::{EngineFactory, EngineRegistry, SourceContext};
pub use source::{
    Bucket, DataSource, HandleState, MemoryDataSource, RecordCursor, RelationalDataSource,
    RelationalTable, Sequence, SourceConfig, Stored, Table, TransactionManager, View,
};
pub use value::{CellState, Value};
