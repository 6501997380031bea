//! DataSource / Table / View / Bucket Contract
//!
//! The operation surface every backend adapter satisfies: open a handle
//! bound to one entity type or bucket name, perform CRUD and aggregates,
//! iterate. A `DataSource` is the long-lived, shared, thread-safe object;
//! handles are per-unit-of-work and never shared across tasks.
//!
//! # Handle lifecycle
//!
//! ```text
//! Unopened ──open──▶ Open ──close──▶ Closed
//! ```
//!
//! Close is idempotent: closing an already-closed or never-opened handle
//! is a no-op, never an error. A closed handle never reopens; operations
//! against one fail with `HandleClosed`.

mod config;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::{
    SourceConfig, KEY_BUCKET, KEY_ENGINE, KEY_PASSWORD, KEY_POOL_SIZE, KEY_URI, KEY_USERNAME,
};
pub use memory::{MemoryDataSource, MemoryEngineFactory, MEMORY_ENGINE};

use crate::codec;
use crate::constants::{BUCKET_KEY_BYTES_MAX, BUCKET_VALUE_BYTES_MAX};
use crate::error::{DataError, DataResult};
use crate::metadata::{DataType, TableDef};
use crate::query::{AggregateFunc, FetchSpec, JoinSpec, Predicate};
use crate::record::{NamedRecord, Record};
use crate::value::Value;

// =============================================================================
// Handle State
// =============================================================================

/// Lifecycle state of a table, view, or bucket handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Created but not yet bound to an engine resource.
    Unopened,
    /// Bound and usable.
    Open,
    /// Released; terminal.
    Closed,
}

// =============================================================================
// Stored (key-value record)
// =============================================================================

/// Key-value analogue of a record: one opaque key, one byte payload, and
/// the owning bucket's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    /// Owning bucket name.
    pub bucket: String,
    /// Entry key.
    pub key: String,
    /// Opaque payload.
    pub value: Vec<u8>,
}

impl Stored {
    /// Create an entry with an explicit key and empty payload.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> DataResult<Self> {
        let key = key.into();
        if key.is_empty() || key.len() > BUCKET_KEY_BYTES_MAX {
            return Err(DataError::validation(format!(
                "bucket key must be 1..={BUCKET_KEY_BYTES_MAX} bytes"
            )));
        }
        Ok(Self {
            bucket: bucket.into(),
            key,
            value: Vec::new(),
        })
    }

    /// Create an entry with a freshly generated key.
    #[must_use]
    pub fn with_generated_key(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: uuid::Uuid::new_v4().to_string(),
            value: Vec::new(),
        }
    }

    /// Set the payload from raw bytes.
    pub fn put_bytes(&mut self, value: Vec<u8>) -> DataResult<()> {
        if value.len() > BUCKET_VALUE_BYTES_MAX {
            return Err(DataError::validation(format!(
                "bucket payload of {} bytes exceeds {BUCKET_VALUE_BYTES_MAX}",
                value.len()
            )));
        }
        self.value = value;
        Ok(())
    }

    /// Encode a typed value into the payload through the codec.
    pub fn put_typed(&mut self, value: &Value, tag: &DataType) -> DataResult<()> {
        self.put_bytes(codec::encode(value, tag)?)
    }

    /// Decode the payload as a typed value through the codec.
    pub fn get_typed(&self, tag: &DataType) -> DataResult<Value> {
        codec::decode(&self.value, tag)
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Restartable forward iterator over fetched records.
#[derive(Debug, Clone)]
pub struct RecordCursor {
    records: Vec<NamedRecord>,
    position: usize,
}

impl RecordCursor {
    /// Wrap an ordered batch of records.
    #[must_use]
    pub fn new(records: Vec<NamedRecord>) -> Self {
        Self {
            records,
            position: 0,
        }
    }

    /// Restart iteration from the first record.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Total number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Iterator for RecordCursor {
    type Item = NamedRecord;

    fn next(&mut self) -> Option<NamedRecord> {
        let record = self.records.get(self.position).cloned()?;
        self.position += 1;
        Some(record)
    }
}

// =============================================================================
// Sequences and Transactions
// =============================================================================

/// Named generator of strictly increasing values.
///
/// Allocation is atomic under concurrent callers; no value is ever issued
/// twice.
#[async_trait]
pub trait Sequence: Send + Sync {
    /// Sequence name.
    fn name(&self) -> &str;

    /// Allocate the next value.
    async fn next_value(&self) -> DataResult<i64>;
}

/// Transaction boundary control for backends that support it.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> DataResult<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> DataResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&self) -> DataResult<()>;
}

// =============================================================================
// View / Table
// =============================================================================

/// Read surface of an opened table or view handle.
#[async_trait]
pub trait View: Send + Sync {
    /// Definition of the entity this handle is bound to.
    fn table_def(&self) -> &Arc<TableDef>;

    /// Current lifecycle state.
    fn state(&self) -> HandleState;

    /// Release the handle. Idempotent; never an error.
    fn close(&mut self);

    /// Check whether a row with the given primary key exists.
    async fn exists(&self, key: &[Value]) -> DataResult<bool>;

    /// Load the row with the given primary key into `target`.
    ///
    /// Returns `false` and leaves `target` untouched when no row matches;
    /// returns `true` with `target` fully repopulated on a hit. Never
    /// partially populates.
    async fn load(&self, key: &[Value], target: &mut dyn Record) -> DataResult<bool>;

    /// Fetch records matching a specification.
    async fn fetch(&self, spec: &FetchSpec) -> DataResult<RecordCursor>;

    /// Apply an aggregate function over matching rows.
    ///
    /// Returns `Value::Null` when no row matches (except count, which
    /// returns zero).
    async fn aggregate(
        &self,
        func: AggregateFunc,
        column: &str,
        predicate: Option<&Predicate>,
    ) -> DataResult<Value>;

    /// Count matching rows.
    async fn count(&self, predicate: Option<&Predicate>) -> DataResult<u64> {
        let value = self
            .aggregate(AggregateFunc::Count, "*", predicate)
            .await?;
        let count = value.as_long()?.unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Sum a column over matching rows.
    async fn sum(&self, column: &str, predicate: Option<&Predicate>) -> DataResult<Value> {
        self.aggregate(AggregateFunc::Sum, column, predicate).await
    }

    /// Average a column over matching rows.
    async fn avg(&self, column: &str, predicate: Option<&Predicate>) -> DataResult<Value> {
        self.aggregate(AggregateFunc::Avg, column, predicate).await
    }

    /// Minimum of a column over matching rows.
    async fn min(&self, column: &str, predicate: Option<&Predicate>) -> DataResult<Value> {
        self.aggregate(AggregateFunc::Min, column, predicate).await
    }

    /// Maximum of a column over matching rows.
    async fn max(&self, column: &str, predicate: Option<&Predicate>) -> DataResult<Value> {
        self.aggregate(AggregateFunc::Max, column, predicate).await
    }
}

/// Write surface of an opened table handle.
#[async_trait]
pub trait Table: View {
    /// Insert or update by primary key.
    ///
    /// When the record's metadata declares an auto-generated primary key
    /// and the cell is unset, the table allocates one from its sequence
    /// and writes it back into the record before storing.
    async fn store(&self, record: &mut dyn Record) -> DataResult<()>;

    /// Insert only; an existing primary key is a `DuplicateKey` error.
    async fn insert(&self, record: &mut dyn Record) -> DataResult<()>;

    /// Delete by primary key. Returns whether a row existed.
    async fn delete(&self, key: &[Value]) -> DataResult<bool>;
}

/// Relational extension: bulk operations over arbitrary predicates.
#[async_trait]
pub trait RelationalTable: Table {
    /// Update matching rows with the given column values; returns the
    /// affected row count. Primary key columns cannot be bulk-updated.
    async fn update_where(
        &self,
        values: &[(String, Value)],
        predicate: &Predicate,
    ) -> DataResult<u64>;

    /// Delete matching rows; returns the affected row count.
    async fn delete_where(&self, predicate: &Predicate) -> DataResult<u64>;
}

// =============================================================================
// Bucket
// =============================================================================

/// Key-value handle bound to one named collection of entries.
#[async_trait]
pub trait Bucket: Send {
    /// Bucket name.
    fn name(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> HandleState;

    /// Release the handle. Idempotent; never an error.
    fn close(&mut self);

    /// Check whether an entry exists.
    async fn exists(&self, key: &str) -> DataResult<bool>;

    /// Load an entry into `target`.
    ///
    /// Returns `false` and leaves `target` untouched on a miss.
    async fn load(&self, key: &str, target: &mut Stored) -> DataResult<bool>;

    /// Insert or replace an entry.
    async fn store(&self, stored: &Stored) -> DataResult<()>;

    /// Delete an entry. Returns whether it existed.
    async fn delete(&self, key: &str) -> DataResult<bool>;

    /// All entry keys, in key order.
    async fn keys(&self) -> DataResult<Vec<String>>;
}

// =============================================================================
// DataSource
// =============================================================================

/// Factory for handles against one configured engine instance.
///
/// The long-lived, shared object: thread-safe, owns pooled connections
/// (when the backend has any), and hands out per-unit-of-work handles.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Engine identifier (for example `memory`, `jdbc`, `s3`).
    fn engine(&self) -> &str;

    /// Check whether a named table or bucket exists in the engine.
    async fn object_exists(&self, name: &str) -> DataResult<bool>;

    /// Transaction control, or `Unsupported` for engines without
    /// transactions.
    fn transactions(&self) -> DataResult<Arc<dyn TransactionManager>>;

    /// Named sequence generator.
    fn sequence(&self, name: &str) -> DataResult<Arc<dyn Sequence>>;

    /// Open a table handle bound to an entity type.
    async fn open_table(&self, def: Arc<TableDef>) -> DataResult<Box<dyn Table>>;

    /// Open a read-only view handle bound to an entity type.
    async fn open_view(&self, def: Arc<TableDef>) -> DataResult<Box<dyn View>>;

    /// Open a bucket handle by name; an empty name selects the
    /// configured default bucket.
    async fn open_bucket(&self, name: &str) -> DataResult<Box<dyn Bucket>>;
}

/// Relational extension of a data source: bulk-capable tables and join
/// views.
#[async_trait]
pub trait RelationalDataSource: DataSource {
    /// Open a table handle with the bulk update/delete surface.
    async fn open_relational_table(
        &self,
        def: Arc<TableDef>,
    ) -> DataResult<Box<dyn RelationalTable>>;

    /// Construct a read-only join view from two registered tables.
    async fn open_join_view(&self, spec: &JoinSpec) -> DataResult<Box<dyn View>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_traits_are_shareable() {
        // Boxed handles cross task boundaries in callers.
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn View>();
        assert_send_sync::<dyn Table>();
        assert_send_sync::<dyn RelationalTable>();
    }

    #[test]
    fn test_stored_key_limits() {
        assert!(Stored::new("files", "").is_err());
        assert!(Stored::new("files", "k".repeat(BUCKET_KEY_BYTES_MAX + 1)).is_err());
        assert!(Stored::new("files", "report.pdf").is_ok());
    }

    #[test]
    fn test_stored_typed_payload_round_trip() {
        let mut stored = Stored::new("counters", "visits").unwrap();
        stored.put_typed(&Value::Long(113), &DataType::Long).unwrap();
        assert_eq!(stored.get_typed(&DataType::Long).unwrap(), Value::Long(113));
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let a = Stored::with_generated_key("files");
        let b = Stored::with_generated_key("files");
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_cursor_rewind_restarts() {
        use crate::metadata::ColumnDef;

        let def = Arc::new(
            TableDef::builder("t")
                .add_primary_key_column(ColumnDef::new("id", DataType::Integer))
                .build()
                .unwrap(),
        );
        let mut a = NamedRecord::new(def.clone());
        a.put("id", Value::Int(1)).unwrap();
        let mut b = NamedRecord::new(def);
        b.put("id", Value::Int(2)).unwrap();

        let mut cursor = RecordCursor::new(vec![a, b]);
        assert_eq!(cursor.len(), 2);
        assert_eq!(cursor.by_ref().count(), 2);
        assert!(cursor.next().is_none());

        cursor.rewind();
        assert_eq!(cursor.next().unwrap().get("id"), Value::Int(1));
    }
}
