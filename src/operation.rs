//! Operation Wrappers
//!
//! A `TableOperation` binds one record to one table handle for the span
//! of a unit of work: open, act through the record, close. The wrapper
//! owns the handle and closes it on drop, so an early return never leaks
//! one. `BucketOperation` is the key-value counterpart over a `Stored`
//! entry.

use crate::error::DataResult;
use crate::query::{FetchSpec, Predicate};
use crate::record::Record;
use crate::registry::SourceContext;
use crate::source::{Bucket, DataSource, HandleState, RecordCursor, Stored, Table};
use crate::value::Value;

// =============================================================================
// Table Operation
// =============================================================================

/// One record bound to one open table handle.
pub struct TableOperation<R: Record> {
    record: R,
    table: Box<dyn Table>,
}

impl<R: Record> TableOperation<R> {
    /// Open a table handle for the record's entity type on the given
    /// source.
    pub async fn open(source: &dyn DataSource, record: R) -> DataResult<Self> {
        let table = source.open_table(record.table_def().clone()).await?;
        Ok(Self { record, table })
    }

    /// Open against the source bound to a context.
    pub async fn open_default(context: &SourceContext, record: R) -> DataResult<Self> {
        let source = context.current()?;
        Self::open(source.as_ref(), record).await
    }

    /// The bound record.
    pub fn record(&self) -> &R {
        &self.record
    }

    /// The bound record, mutable.
    pub fn record_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Lifecycle state of the underlying handle.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.table.state()
    }

    /// Check existence by the record's current primary key.
    pub async fn exists(&self) -> DataResult<bool> {
        let key = self.record.primary_key()?;
        self.table.exists(&key).await
    }

    /// Load the row with the given key into the bound record.
    ///
    /// The record is untouched on a miss.
    pub async fn load(&mut self, key: &[Value]) -> DataResult<bool> {
        self.table.load(key, &mut self.record).await
    }

    /// Insert or update the bound record.
    ///
    /// An auto-generated key allocated by the table is written back into
    /// the record.
    pub async fn store(&mut self) -> DataResult<()> {
        self.table.store(&mut self.record).await
    }

    /// Insert the bound record; an existing key is a duplicate-key error.
    pub async fn insert(&mut self) -> DataResult<()> {
        self.table.insert(&mut self.record).await
    }

    /// Delete by the record's current primary key.
    pub async fn delete(&mut self) -> DataResult<bool> {
        let key = self.record.primary_key()?;
        self.table.delete(&key).await
    }

    /// Fetch records matching a specification.
    pub async fn fetch(&self, spec: &FetchSpec) -> DataResult<RecordCursor> {
        self.table.fetch(spec).await
    }

    /// Fetch records where one column equals a value.
    pub async fn fetch_by(
        &self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> DataResult<RecordCursor> {
        let spec = FetchSpec::all().with_predicate(Predicate::eq(column, value));
        self.table.fetch(&spec).await
    }

    /// Count matching rows.
    pub async fn count(&self, predicate: Option<&Predicate>) -> DataResult<u64> {
        self.table.count(predicate).await
    }

    /// Release the handle. Idempotent; drop calls this as a backstop.
    pub fn close(&mut self) {
        self.table.close();
    }
}

impl<R: Record> Drop for TableOperation<R> {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Bucket Operation
// =============================================================================

/// One stored entry bound to one open bucket handle.
pub struct BucketOperation {
    stored: Stored,
    bucket: Box<dyn Bucket>,
}

impl BucketOperation {
    /// Open the bucket named by the entry on the given source.
    pub async fn open(source: &dyn DataSource, stored: Stored) -> DataResult<Self> {
        let bucket = source.open_bucket(&stored.bucket).await?;
        Ok(Self { stored, bucket })
    }

    /// Open against the source bound to a context.
    pub async fn open_default(context: &SourceContext, stored: Stored) -> DataResult<Self> {
        let source = context.current()?;
        Self::open(source.as_ref(), stored).await
    }

    /// The bound entry.
    #[must_use]
    pub fn stored(&self) -> &Stored {
        &self.stored
    }

    /// The bound entry, mutable.
    pub fn stored_mut(&mut self) -> &mut Stored {
        &mut self.stored
    }

    /// Lifecycle state of the underlying handle.
    #[must_use]
    pub fn state(&self) -> HandleState {
        self.bucket.state()
    }

    /// Check existence of the entry's current key.
    pub async fn exists(&self) -> DataResult<bool> {
        self.bucket.exists(&self.stored.key).await
    }

    /// Load the entry with the given key into the bound entry.
    pub async fn load(&mut self, key: &str) -> DataResult<bool> {
        self.bucket.load(key, &mut self.stored).await
    }

    /// Insert or replace the bound entry.
    pub async fn store(&self) -> DataResult<()> {
        self.bucket.store(&self.stored).await
    }

    /// Delete the entry's current key.
    pub async fn delete(&self) -> DataResult<bool> {
        self.bucket.delete(&self.stored.key).await
    }

    /// All keys in the bucket.
    pub async fn keys(&self) -> DataResult<Vec<String>> {
        self.bucket.keys().await
    }

    /// Release the handle. Idempotent; drop calls this as a backstop.
    pub fn close(&mut self) {
        self.bucket.close();
    }
}

impl Drop for BucketOperation {
    fn drop(&mut self) {
        self.close();
    }
}
