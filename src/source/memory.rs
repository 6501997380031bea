//! In-Memory Engine
//!
//! Reference implementation of the full source contract, backed by
//! process-local maps. Rows live in per-table ordered maps keyed by the
//! encoded primary key, buckets in ordered string maps, sequences in
//! atomics. Deterministic and dependency-free, which makes it the engine
//! of choice for tests and for simulating backend behavior.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::BufMut;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::codec;
use crate::constants::{
    BUCKET_KEY_BYTES_MAX, BUCKET_VALUE_BYTES_MAX, SEQUENCE_INCREMENT_DEFAULT,
    SEQUENCE_START_DEFAULT,
};
use crate::error::{DataError, DataResult};
use crate::metadata::{ColumnDef, DataType, TableDef};
use crate::query::{
    AggregateFunc, CompareOp, FetchSpec, JoinKind, JoinSpec, Operand, Predicate, Query,
    SelectExpr, SortDirection,
};
use crate::record::{NamedRecord, Record};
use crate::registry::EngineFactory;
use crate::value::{CellState, Value};

use super::config::SourceConfig;
use super::{
    Bucket, DataSource, HandleState, RecordCursor, RelationalDataSource, RelationalTable,
    Sequence, Stored, Table, TransactionManager, View,
};

/// Engine identifier of the in-memory source.
pub const MEMORY_ENGINE: &str = "memory";

/// Bucket used when a caller opens a bucket with an empty name and the
/// configuration declares none.
const BUCKET_NAME_DEFAULT: &str = "default";

// =============================================================================
// Shared State
// =============================================================================

/// One registered table: its definition and its rows keyed by the
/// codec-encoded primary key.
struct TableStore {
    def: Arc<TableDef>,
    rows: BTreeMap<Vec<u8>, HashMap<String, Value>>,
}

struct MemoryShared {
    tables: RwLock<HashMap<String, TableStore>>,
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    sequences: RwLock<HashMap<String, Arc<MemorySequence>>>,
}

/// Atomic in-process sequence.
struct MemorySequence {
    name: String,
    next: AtomicI64,
    increment: i64,
}

#[async_trait]
impl Sequence for MemorySequence {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_value(&self) -> DataResult<i64> {
        Ok(self.next.fetch_add(self.increment, AtomicOrdering::SeqCst))
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

/// Widen a value to its column's declared family so that equal logical
/// keys encode to equal bytes.
fn normalize(value: &Value, tag: &DataType) -> Value {
    match (tag, value) {
        (DataType::Long, Value::Int(v)) => Value::Long(i64::from(*v)),
        (DataType::Decimal { .. }, Value::Int(v)) => Value::Decimal(Decimal::from(*v)),
        (DataType::Decimal { .. }, Value::Long(v)) => Value::Decimal(Decimal::from(*v)),
        _ => value.clone(),
    }
}

/// Encode ordered primary key values into one comparable byte key.
fn encode_key(def: &TableDef, key: &[Value]) -> DataResult<Vec<u8>> {
    let pk = def.primary_key();
    if key.len() != pk.len() {
        return Err(DataError::validation(format!(
            "table {} expects a {}-column key, got {} values",
            def.name(),
            pk.len(),
            key.len()
        )));
    }
    let mut bytes = Vec::new();
    for (value, column_name) in key.iter().zip(pk) {
        let column = def.column(column_name).ok_or_else(|| {
            DataError::validation(format!(
                "primary key column {} unknown in table {}",
                column_name,
                def.name()
            ))
        })?;
        let encoded = codec::encode(&normalize(value, &column.data_type), &column.data_type)?;
        bytes.put_u32(u32::try_from(encoded.len()).unwrap_or(u32::MAX));
        bytes.extend_from_slice(&encoded);
    }
    Ok(bytes)
}

fn display_key(key: &[Value]) -> String {
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the stored row map from a record's written cells.
fn row_from_record(def: &TableDef, record: &dyn Record) -> HashMap<String, Value> {
    let mut row = HashMap::new();
    for column in def.columns() {
        let lowered = column.name.to_ascii_lowercase();
        match record.cell_state(&column.name) {
            CellState::Set => {
                let value = normalize(&record.get(&column.name), &column.data_type);
                row.insert(lowered, value);
            }
            CellState::Null => {
                row.insert(lowered, Value::Null);
            }
            CellState::Unset => {}
        }
    }
    row
}

/// Materialize a stored row as a named record over its definition.
fn materialize(def: &Arc<TableDef>, row: &HashMap<String, Value>) -> DataResult<NamedRecord> {
    let mut record = NamedRecord::new(def.clone());
    for column in def.columns() {
        if let Some(value) = row.get(&column.name.to_ascii_lowercase()) {
            record.put(&column.name, value.clone())?;
        }
    }
    Ok(record)
}

/// Copy a materialized record into a caller-supplied target.
fn populate(target: &mut dyn Record, source: &NamedRecord) -> DataResult<()> {
    target.clear();
    for column in source.table_def().columns() {
        match source.cell_state(&column.name) {
            CellState::Set => target.put(&column.name, source.get(&column.name))?,
            CellState::Null => target.put(&column.name, Value::Null)?,
            CellState::Unset => {}
        }
    }
    Ok(())
}

// =============================================================================
// Predicate Evaluation
// =============================================================================

/// Translate a `LIKE` pattern into an anchored regular expression.
/// `%` matches any run of characters, `_` exactly one.
fn like_to_regex(pattern: &str) -> DataResult<regex::Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    regex::Regex::new(&expr)
        .map_err(|e| DataError::format(format!("invalid like pattern {pattern}: {e}")))
}

/// Evaluate a predicate tree against one record.
///
/// Null never satisfies a comparison; `IsNull` is the only test a null
/// or unset cell passes.
fn eval(predicate: &Predicate, record: &NamedRecord) -> DataResult<bool> {
    match predicate {
        Predicate::Compare {
            column,
            op,
            operand,
        } => {
            let left = record.get(column);
            if left.is_null() {
                return Ok(false);
            }
            let right = match operand {
                Operand::Literal(value) => value.clone(),
                Operand::Column(other) => record.get(other),
            };
            if right.is_null() {
                return Ok(false);
            }
            let ordering = left.compare(&right)?;
            Ok(match op {
                CompareOp::Eq => ordering.is_eq(),
                CompareOp::Ne => ordering.is_ne(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Ge => ordering.is_ge(),
            })
        }
        Predicate::In { column, values } => {
            let left = record.get(column);
            if left.is_null() {
                return Ok(false);
            }
            for candidate in values {
                if !candidate.is_null() && left.compare(candidate)?.is_eq() {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Like { column, pattern } => {
            let Some(text) = record.get(column).as_text()? else {
                return Ok(false);
            };
            Ok(like_to_regex(pattern)?.is_match(&text))
        }
        Predicate::IsNull { column } => Ok(record.is_null(column)),
        Predicate::And(parts) => {
            for part in parts {
                if !eval(part, record)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if eval(part, record)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!eval(inner, record)?),
    }
}

// =============================================================================
// Fetch and Aggregate over Materialized Rows
// =============================================================================

fn compare_for_sort(a: &NamedRecord, b: &NamedRecord, column: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let (left, right) = (a.get(column), b.get(column));
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        // Nulls sort first.
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => left.compare(&right).unwrap_or(Ordering::Equal),
    }
}

/// Apply predicate, ordering, projection, and windowing to a materialized
/// batch.
fn apply_spec(mut records: Vec<NamedRecord>, spec: &FetchSpec) -> DataResult<RecordCursor> {
    if let Some(predicate) = &spec.predicate {
        let mut filtered = Vec::with_capacity(records.len());
        for record in records {
            if eval(predicate, &record)? {
                filtered.push(record);
            }
        }
        records = filtered;
    }

    if !spec.order_by.is_empty() {
        records.sort_by(|a, b| {
            for key in &spec.order_by {
                let ordering = match key.direction {
                    SortDirection::Ascending => compare_for_sort(a, b, &key.column),
                    SortDirection::Descending => compare_for_sort(b, a, &key.column),
                };
                if !ordering.is_eq() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
    }

    let offset = usize::try_from(spec.offset).unwrap_or(usize::MAX);
    let max_rows = usize::try_from(spec.max_rows).unwrap_or(usize::MAX);
    let mut windowed: Vec<NamedRecord> =
        records.into_iter().skip(offset).take(max_rows).collect();

    if !spec.columns.is_empty() {
        let mut projected = Vec::with_capacity(windowed.len());
        for record in &windowed {
            let mut narrow = NamedRecord::new(record.table_def().clone());
            for expr in &spec.columns {
                match expr {
                    SelectExpr::Column(name) => match record.cell_state(name) {
                        CellState::Set => narrow.put(name, record.get(name))?,
                        CellState::Null => narrow.put(name, Value::Null)?,
                        CellState::Unset => {}
                    },
                    SelectExpr::Aggregate { .. } => {
                        return Err(DataError::validation(
                            "aggregate expressions go through aggregate(), not fetch()",
                        ));
                    }
                }
            }
            projected.push(narrow);
        }
        windowed = projected;
    }

    Ok(RecordCursor::new(windowed))
}

fn aggregate_over(
    def: &Arc<TableDef>,
    records: &[NamedRecord],
    func: AggregateFunc,
    column: &str,
    predicate: Option<&Predicate>,
) -> DataResult<Value> {
    if !matches!(func, AggregateFunc::Count) && def.column(column).is_none() {
        return Err(DataError::validation(format!(
            "aggregate column {} unknown in table {}",
            column,
            def.name()
        )));
    }

    let mut matched = 0_i64;
    let mut sum = Decimal::ZERO;
    let mut non_null = 0_i64;
    let mut extreme: Option<Value> = None;

    for record in records {
        if let Some(predicate) = predicate {
            if !eval(predicate, record)? {
                continue;
            }
        }
        matched += 1;
        if matches!(func, AggregateFunc::Count) {
            continue;
        }
        let value = record.get(column);
        if value.is_null() {
            continue;
        }
        non_null += 1;
        match func {
            AggregateFunc::Sum | AggregateFunc::Avg => {
                if let Some(d) = value.as_decimal()? {
                    sum += d;
                }
            }
            AggregateFunc::Min => {
                let replace = match &extreme {
                    Some(current) => value.compare(current)?.is_lt(),
                    None => true,
                };
                if replace {
                    extreme = Some(value);
                }
            }
            AggregateFunc::Max => {
                let replace = match &extreme {
                    Some(current) => value.compare(current)?.is_gt(),
                    None => true,
                };
                if replace {
                    extreme = Some(value);
                }
            }
            AggregateFunc::Count => {}
        }
    }

    Ok(match func {
        AggregateFunc::Count => Value::Long(matched),
        AggregateFunc::Sum if non_null > 0 => Value::Decimal(sum),
        AggregateFunc::Avg if non_null > 0 => Value::Decimal(sum / Decimal::from(non_null)),
        AggregateFunc::Min | AggregateFunc::Max => extreme.unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

// =============================================================================
// Table Handle
// =============================================================================

/// Table handle bound to one registered definition.
pub struct MemoryTable {
    shared: Arc<MemoryShared>,
    def: Arc<TableDef>,
    state: HandleState,
}

impl MemoryTable {
    fn ensure_open(&self, operation: &str) -> DataResult<()> {
        if self.state == HandleState::Open {
            Ok(())
        } else {
            Err(DataError::handle_closed(operation))
        }
    }

    fn snapshot(&self) -> DataResult<Vec<NamedRecord>> {
        let tables = self.shared.tables.read().unwrap();
        let store = self.store_in(&tables)?;
        store
            .rows
            .values()
            .map(|row| materialize(&self.def, row))
            .collect()
    }

    fn store_in<'a>(
        &self,
        tables: &'a HashMap<String, TableStore>,
    ) -> DataResult<&'a TableStore> {
        tables
            .get(&self.def.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(
                    MEMORY_ENGINE,
                    "lookup",
                    self.def.name(),
                    "table no longer registered",
                )
            })
    }

    /// Allocate values for auto-generated key columns left unset.
    async fn generate_keys(&self, record: &mut dyn Record) -> DataResult<()> {
        let generated: Vec<ColumnDef> = self
            .def
            .columns()
            .iter()
            .filter(|c| {
                c.auto_generate
                    && self.def.is_primary_key(&c.name)
                    && record.cell_state(&c.name) == CellState::Unset
            })
            .cloned()
            .collect();

        for column in generated {
            let sequence_name = format!(
                "{}.{}",
                self.def.name().to_ascii_lowercase(),
                column.name.to_ascii_lowercase()
            );
            let sequence = lookup_sequence(&self.shared, &sequence_name);
            let next = sequence.next_value().await?;
            let value = match column.data_type {
                DataType::Integer => {
                    let narrow = i32::try_from(next).map_err(|_| {
                        DataError::validation(format!(
                            "sequence {sequence_name} exceeded the integer range"
                        ))
                    })?;
                    Value::Int(narrow)
                }
                DataType::Long => Value::Long(next),
                ref other => {
                    return Err(DataError::validation(format!(
                        "column {} of table {} declares type {} which cannot be auto-generated",
                        column.name,
                        self.def.name(),
                        other
                    )));
                }
            };
            record.put(&column.name, value)?;
        }
        Ok(())
    }

    async fn write(&self, record: &mut dyn Record, insert_only: bool) -> DataResult<()> {
        self.ensure_open(if insert_only { "insert" } else { "store" })?;
        self.generate_keys(record).await?;
        record.validate()?;
        let key_values = record.primary_key()?;
        let key = encode_key(&self.def, &key_values)?;
        let row = row_from_record(&self.def, record);

        let mut tables = self.shared.tables.write().unwrap();
        let store = tables
            .get_mut(&self.def.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(
                    MEMORY_ENGINE,
                    "write",
                    self.def.name(),
                    "table no longer registered",
                )
            })?;
        if insert_only && store.rows.contains_key(&key) {
            return Err(DataError::duplicate_key(
                self.def.name(),
                display_key(&key_values),
            ));
        }
        store.rows.insert(key, row);
        Ok(())
    }
}

#[async_trait]
impl View for MemoryTable {
    fn table_def(&self) -> &Arc<TableDef> {
        &self.def
    }

    fn state(&self) -> HandleState {
        self.state
    }

    fn close(&mut self) {
        self.state = HandleState::Closed;
    }

    async fn exists(&self, key: &[Value]) -> DataResult<bool> {
        self.ensure_open("exists")?;
        let encoded = encode_key(&self.def, key)?;
        let tables = self.shared.tables.read().unwrap();
        Ok(self.store_in(&tables)?.rows.contains_key(&encoded))
    }

    async fn load(&self, key: &[Value], target: &mut dyn Record) -> DataResult<bool> {
        self.ensure_open("load")?;
        let encoded = encode_key(&self.def, key)?;
        let materialized = {
            let tables = self.shared.tables.read().unwrap();
            match self.store_in(&tables)?.rows.get(&encoded) {
                Some(row) => materialize(&self.def, row)?,
                None => return Ok(false),
            }
        };
        populate(target, &materialized)?;
        Ok(true)
    }

    #[instrument(skip_all, fields(table = %self.def.name()))]
    async fn fetch(&self, spec: &FetchSpec) -> DataResult<RecordCursor> {
        self.ensure_open("fetch")?;
        apply_spec(self.snapshot()?, spec)
    }

    async fn aggregate(
        &self,
        func: AggregateFunc,
        column: &str,
        predicate: Option<&Predicate>,
    ) -> DataResult<Value> {
        self.ensure_open("aggregate")?;
        aggregate_over(&self.def, &self.snapshot()?, func, column, predicate)
    }
}

#[async_trait]
impl Table for MemoryTable {
    #[instrument(skip_all, fields(table = %self.def.name()))]
    async fn store(&self, record: &mut dyn Record) -> DataResult<()> {
        self.write(record, false).await
    }

    #[instrument(skip_all, fields(table = %self.def.name()))]
    async fn insert(&self, record: &mut dyn Record) -> DataResult<()> {
        self.write(record, true).await
    }

    async fn delete(&self, key: &[Value]) -> DataResult<bool> {
        self.ensure_open("delete")?;
        let encoded = encode_key(&self.def, key)?;
        let mut tables = self.shared.tables.write().unwrap();
        let store = tables
            .get_mut(&self.def.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(
                    MEMORY_ENGINE,
                    "delete",
                    self.def.name(),
                    "table no longer registered",
                )
            })?;
        Ok(store.rows.remove(&encoded).is_some())
    }
}

#[async_trait]
impl RelationalTable for MemoryTable {
    async fn update_where(
        &self,
        values: &[(String, Value)],
        predicate: &Predicate,
    ) -> DataResult<u64> {
        self.ensure_open("update_where")?;
        for (name, value) in values {
            let column = self.def.column(name).ok_or_else(|| {
                DataError::validation(format!(
                    "update column {} unknown in table {}",
                    name,
                    self.def.name()
                ))
            })?;
            if self.def.is_primary_key(name) {
                return Err(DataError::validation(format!(
                    "primary key column {} of table {} cannot be bulk-updated",
                    name,
                    self.def.name()
                )));
            }
            if !column.data_type.accepts(value) {
                return Err(DataError::validation(format!(
                    "column {} of table {} expects {} but update holds {}",
                    name,
                    self.def.name(),
                    column.data_type,
                    value.kind()
                )));
            }
            if value.is_null() && !column.nullable {
                return Err(DataError::validation(format!(
                    "column {} of table {} is not nullable",
                    name,
                    self.def.name()
                )));
            }
        }

        let mut tables = self.shared.tables.write().unwrap();
        let store = tables
            .get_mut(&self.def.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(
                    MEMORY_ENGINE,
                    "update_where",
                    self.def.name(),
                    "table no longer registered",
                )
            })?;

        let mut affected = 0_u64;
        for row in store.rows.values_mut() {
            let record = materialize(&self.def, row)?;
            if !eval(predicate, &record)? {
                continue;
            }
            for (name, value) in values {
                let column = self.def.column(name).ok_or_else(|| {
                    DataError::validation(format!("update column {name} vanished"))
                })?;
                row.insert(
                    column.name.to_ascii_lowercase(),
                    normalize(value, &column.data_type),
                );
            }
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_where(&self, predicate: &Predicate) -> DataResult<u64> {
        self.ensure_open("delete_where")?;
        let mut tables = self.shared.tables.write().unwrap();
        let store = tables
            .get_mut(&self.def.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(
                    MEMORY_ENGINE,
                    "delete_where",
                    self.def.name(),
                    "table no longer registered",
                )
            })?;

        let mut doomed = Vec::new();
        for (key, row) in &store.rows {
            if eval(predicate, &materialize(&self.def, row)?)? {
                doomed.push(key.clone());
            }
        }
        for key in &doomed {
            store.rows.remove(key);
        }
        Ok(doomed.len() as u64)
    }
}

// =============================================================================
// Join View
// =============================================================================

/// Read-only view over the join of two registered tables, computed at
/// fetch time.
pub struct MemoryJoinView {
    shared: Arc<MemoryShared>,
    def: Arc<TableDef>,
    left: Arc<TableDef>,
    right: Arc<TableDef>,
    spec: JoinSpec,
    state: HandleState,
}

/// Synthesize the joined definition: every left column (the left primary
/// key remains the key), then every right column, renamed with the right
/// table's name as prefix on a clash. A left outer join relaxes right
/// columns to nullable.
fn join_def(left: &TableDef, right: &TableDef, kind: JoinKind) -> DataResult<Arc<TableDef>> {
    let mut builder = TableDef::builder(format!("{}_{}", left.name(), right.name()));
    for column in left.columns() {
        if left.is_primary_key(&column.name) {
            builder = builder.add_primary_key_column(column.clone());
        } else {
            builder = builder.add_column(column.clone());
        }
    }
    for column in right.columns() {
        let mut joined = column.clone();
        if left.column(&column.name).is_some() {
            joined.name = format!("{}_{}", right.name(), column.name);
        }
        joined.auto_generate = false;
        if kind == JoinKind::LeftOuter {
            joined.nullable = true;
        }
        builder = builder.add_column(joined);
    }
    Ok(Arc::new(builder.build()?))
}

impl MemoryJoinView {
    fn ensure_open(&self, operation: &str) -> DataResult<()> {
        if self.state == HandleState::Open {
            Ok(())
        } else {
            Err(DataError::handle_closed(operation))
        }
    }

    /// The right column's name in the joined definition.
    fn joined_name(&self, right_column: &str) -> String {
        if self.left.column(right_column).is_some() {
            format!("{}_{}", self.right.name(), right_column)
        } else {
            right_column.to_string()
        }
    }

    fn snapshot(&self) -> DataResult<Vec<NamedRecord>> {
        let tables = self.shared.tables.read().unwrap();
        let left_store = tables
            .get(&self.left.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(MEMORY_ENGINE, "join", self.left.name(), "table not registered")
            })?;
        let right_store = tables
            .get(&self.right.name().to_ascii_lowercase())
            .ok_or_else(|| {
                DataError::backend(
                    MEMORY_ENGINE,
                    "join",
                    self.right.name(),
                    "table not registered",
                )
            })?;

        let right_rows: Vec<NamedRecord> = right_store
            .rows
            .values()
            .map(|row| materialize(&self.right, row))
            .collect::<DataResult<_>>()?;

        let mut joined = Vec::new();
        for left_row in left_store.rows.values() {
            let left_record = materialize(&self.left, left_row)?;
            let mut matched = false;
            for right_record in &right_rows {
                if self.rows_match(&left_record, right_record)? {
                    matched = true;
                    joined.push(self.combine(&left_record, Some(right_record))?);
                }
            }
            if !matched && self.spec.kind == JoinKind::LeftOuter {
                joined.push(self.combine(&left_record, None)?);
            }
        }
        Ok(joined)
    }

    fn rows_match(&self, left: &NamedRecord, right: &NamedRecord) -> DataResult<bool> {
        for (left_column, right_column) in &self.spec.on {
            let a = left.get(left_column);
            let b = right.get(right_column);
            if a.is_null() || b.is_null() || !a.compare(&b)?.is_eq() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn combine(
        &self,
        left: &NamedRecord,
        right: Option<&NamedRecord>,
    ) -> DataResult<NamedRecord> {
        let mut record = NamedRecord::new(self.def.clone());
        for column in self.left.columns() {
            match left.cell_state(&column.name) {
                CellState::Set => record.put(&column.name, left.get(&column.name))?,
                CellState::Null => record.put(&column.name, Value::Null)?,
                CellState::Unset => {}
            }
        }
        if let Some(right_record) = right {
            for column in self.right.columns() {
                let target = self.joined_name(&column.name);
                match right_record.cell_state(&column.name) {
                    CellState::Set => record.put(&target, right_record.get(&column.name))?,
                    CellState::Null => record.put(&target, Value::Null)?,
                    CellState::Unset => {}
                }
            }
        }
        Ok(record)
    }
}

#[async_trait]
impl View for MemoryJoinView {
    fn table_def(&self) -> &Arc<TableDef> {
        &self.def
    }

    fn state(&self) -> HandleState {
        self.state
    }

    fn close(&mut self) {
        self.state = HandleState::Closed;
    }

    async fn exists(&self, key: &[Value]) -> DataResult<bool> {
        self.ensure_open("exists")?;
        Ok(self.find_by_key(key)?.is_some())
    }

    async fn load(&self, key: &[Value], target: &mut dyn Record) -> DataResult<bool> {
        self.ensure_open("load")?;
        match self.find_by_key(key)? {
            Some(record) => {
                populate(target, &record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip_all, fields(view = %self.def.name()))]
    async fn fetch(&self, spec: &FetchSpec) -> DataResult<RecordCursor> {
        self.ensure_open("fetch")?;
        apply_spec(self.snapshot()?, spec)
    }

    async fn aggregate(
        &self,
        func: AggregateFunc,
        column: &str,
        predicate: Option<&Predicate>,
    ) -> DataResult<Value> {
        self.ensure_open("aggregate")?;
        aggregate_over(&self.def, &self.snapshot()?, func, column, predicate)
    }
}

impl MemoryJoinView {
    fn find_by_key(&self, key: &[Value]) -> DataResult<Option<NamedRecord>> {
        let pk = self.def.primary_key();
        if key.len() != pk.len() {
            return Err(DataError::validation(format!(
                "join view {} expects a {}-column key, got {} values",
                self.def.name(),
                pk.len(),
                key.len()
            )));
        }
        for record in self.snapshot()? {
            let mut hit = true;
            for (value, column) in key.iter().zip(pk) {
                let cell = record.get(column);
                if cell.is_null() || !cell.compare(value)?.is_eq() {
                    hit = false;
                    break;
                }
            }
            if hit {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Bucket Handle
// =============================================================================

/// Key-value handle bound to one named bucket.
pub struct MemoryBucket {
    shared: Arc<MemoryShared>,
    name: String,
    state: HandleState,
}

impl MemoryBucket {
    fn ensure_open(&self, operation: &str) -> DataResult<()> {
        if self.state == HandleState::Open {
            Ok(())
        } else {
            Err(DataError::handle_closed(operation))
        }
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> HandleState {
        self.state
    }

    fn close(&mut self) {
        self.state = HandleState::Closed;
    }

    async fn exists(&self, key: &str) -> DataResult<bool> {
        self.ensure_open("exists")?;
        let buckets = self.shared.buckets.read().unwrap();
        Ok(buckets
            .get(&self.name)
            .is_some_and(|entries| entries.contains_key(key)))
    }

    async fn load(&self, key: &str, target: &mut Stored) -> DataResult<bool> {
        self.ensure_open("load")?;
        let buckets = self.shared.buckets.read().unwrap();
        match buckets.get(&self.name).and_then(|entries| entries.get(key)) {
            Some(bytes) => {
                target.bucket = self.name.clone();
                target.key = key.to_string();
                target.value = bytes.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip_all, fields(bucket = %self.name))]
    async fn store(&self, stored: &Stored) -> DataResult<()> {
        self.ensure_open("store")?;
        if stored.key.is_empty() || stored.key.len() > BUCKET_KEY_BYTES_MAX {
            return Err(DataError::validation(format!(
                "bucket key must be 1..={BUCKET_KEY_BYTES_MAX} bytes"
            )));
        }
        if stored.value.len() > BUCKET_VALUE_BYTES_MAX {
            return Err(DataError::validation(format!(
                "bucket payload of {} bytes exceeds {BUCKET_VALUE_BYTES_MAX}",
                stored.value.len()
            )));
        }
        let mut buckets = self.shared.buckets.write().unwrap();
        buckets
            .entry(self.name.clone())
            .or_default()
            .insert(stored.key.clone(), stored.value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> DataResult<bool> {
        self.ensure_open("delete")?;
        let mut buckets = self.shared.buckets.write().unwrap();
        Ok(buckets
            .get_mut(&self.name)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn keys(&self) -> DataResult<Vec<String>> {
        self.ensure_open("keys")?;
        let buckets = self.shared.buckets.read().unwrap();
        Ok(buckets
            .get(&self.name)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// Data Source
// =============================================================================

fn lookup_sequence(shared: &Arc<MemoryShared>, name: &str) -> Arc<MemorySequence> {
    let mut sequences = shared.sequences.write().unwrap();
    sequences
        .entry(name.to_string())
        .or_insert_with(|| {
            Arc::new(MemorySequence {
                name: name.to_string(),
                next: AtomicI64::new(SEQUENCE_START_DEFAULT),
                increment: SEQUENCE_INCREMENT_DEFAULT,
            })
        })
        .clone()
}

/// Process-local engine instance. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryDataSource {
    shared: Arc<MemoryShared>,
    default_bucket: String,
}

impl MemoryDataSource {
    /// Create an empty instance with the default bucket name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_bucket(BUCKET_NAME_DEFAULT)
    }

    /// Create an empty instance with an explicit default bucket name.
    #[must_use]
    pub fn with_default_bucket(bucket: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(MemoryShared {
                tables: RwLock::new(HashMap::new()),
                buckets: RwLock::new(HashMap::new()),
                sequences: RwLock::new(HashMap::new()),
            }),
            default_bucket: bucket.into(),
        }
    }

    /// Build from a source configuration.
    pub fn from_config(config: &SourceConfig) -> DataResult<Self> {
        Ok(match config.default_bucket() {
            Some(bucket) => Self::with_default_bucket(bucket),
            None => Self::new(),
        })
    }

    /// Execute a query against a registered table, resolved by name.
    pub async fn query(&self, query: &Query) -> DataResult<RecordCursor> {
        let def = {
            let tables = self.shared.tables.read().unwrap();
            tables
                .get(&query.target.to_ascii_lowercase())
                .ok_or_else(|| {
                    DataError::backend(
                        MEMORY_ENGINE,
                        "query",
                        &query.target,
                        "table not registered",
                    )
                })?
                .def
                .clone()
        };
        let view = self.open_view(def).await?;
        view.fetch(&query.spec).await
    }

    /// Register a definition, creating an empty table on first sight.
    ///
    /// Re-registering the same name with a different definition is a
    /// validation error.
    fn register(&self, def: &Arc<TableDef>) -> DataResult<()> {
        let mut tables = self.shared.tables.write().unwrap();
        match tables.get(&def.name().to_ascii_lowercase()) {
            Some(existing) if existing.def.as_ref() != def.as_ref() => {
                Err(DataError::validation(format!(
                    "table {} is already registered with a different definition",
                    def.name()
                )))
            }
            Some(_) => Ok(()),
            None => {
                tables.insert(
                    def.name().to_ascii_lowercase(),
                    TableStore {
                        def: def.clone(),
                        rows: BTreeMap::new(),
                    },
                );
                Ok(())
            }
        }
    }
}

impl Default for MemoryDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    fn engine(&self) -> &str {
        MEMORY_ENGINE
    }

    async fn object_exists(&self, name: &str) -> DataResult<bool> {
        let lowered = name.to_ascii_lowercase();
        if self.shared.tables.read().unwrap().contains_key(&lowered) {
            return Ok(true);
        }
        Ok(self.shared.buckets.read().unwrap().contains_key(name))
    }

    fn transactions(&self) -> DataResult<Arc<dyn TransactionManager>> {
        Err(DataError::unsupported(MEMORY_ENGINE, "transactions"))
    }

    fn sequence(&self, name: &str) -> DataResult<Arc<dyn Sequence>> {
        Ok(lookup_sequence(&self.shared, name))
    }

    async fn open_table(&self, def: Arc<TableDef>) -> DataResult<Box<dyn Table>> {
        self.register(&def)?;
        Ok(Box::new(MemoryTable {
            shared: self.shared.clone(),
            def,
            state: HandleState::Open,
        }))
    }

    async fn open_view(&self, def: Arc<TableDef>) -> DataResult<Box<dyn View>> {
        self.register(&def)?;
        Ok(Box::new(MemoryTable {
            shared: self.shared.clone(),
            def,
            state: HandleState::Open,
        }))
    }

    async fn open_bucket(&self, name: &str) -> DataResult<Box<dyn Bucket>> {
        let name = if name.is_empty() {
            self.default_bucket.clone()
        } else {
            name.to_string()
        };
        self.shared
            .buckets
            .write()
            .unwrap()
            .entry(name.clone())
            .or_default();
        Ok(Box::new(MemoryBucket {
            shared: self.shared.clone(),
            name,
            state: HandleState::Open,
        }))
    }
}

#[async_trait]
impl RelationalDataSource for MemoryDataSource {
    async fn open_relational_table(
        &self,
        def: Arc<TableDef>,
    ) -> DataResult<Box<dyn RelationalTable>> {
        self.register(&def)?;
        Ok(Box::new(MemoryTable {
            shared: self.shared.clone(),
            def,
            state: HandleState::Open,
        }))
    }

    async fn open_join_view(&self, spec: &JoinSpec) -> DataResult<Box<dyn View>> {
        let (left, right) = {
            let tables = self.shared.tables.read().unwrap();
            let left = tables
                .get(&spec.left.to_ascii_lowercase())
                .ok_or_else(|| {
                    DataError::backend(MEMORY_ENGINE, "join", &spec.left, "table not registered")
                })?
                .def
                .clone();
            let right = tables
                .get(&spec.right.to_ascii_lowercase())
                .ok_or_else(|| {
                    DataError::backend(MEMORY_ENGINE, "join", &spec.right, "table not registered")
                })?
                .def
                .clone();
            (left, right)
        };
        for (left_column, right_column) in &spec.on {
            if left.column(left_column).is_none() {
                return Err(DataError::validation(format!(
                    "join column {} unknown in table {}",
                    left_column,
                    left.name()
                )));
            }
            if right.column(right_column).is_none() {
                return Err(DataError::validation(format!(
                    "join column {} unknown in table {}",
                    right_column,
                    right.name()
                )));
            }
        }
        let def = join_def(&left, &right, spec.kind)?;
        Ok(Box::new(MemoryJoinView {
            shared: self.shared.clone(),
            def,
            left,
            right,
            spec: spec.clone(),
            state: HandleState::Open,
        }))
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Registry factory for the in-memory engine.
pub struct MemoryEngineFactory;

impl EngineFactory for MemoryEngineFactory {
    fn engine(&self) -> &str {
        MEMORY_ENGINE
    }

    fn create(&self, config: &SourceConfig) -> DataResult<Arc<dyn DataSource>> {
        Ok(Arc::new(MemoryDataSource::from_config(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortKey;

    fn student_def() -> Arc<TableDef> {
        Arc::new(
            TableDef::builder("student")
                .add_primary_key_column(
                    ColumnDef::new("id_student", DataType::Integer).auto_generated(),
                )
                .add_column(ColumnDef::new("first_name", DataType::varchar_with_length(64)))
                .add_column(ColumnDef::new("last_name", DataType::varchar_with_length(64)))
                .add_column(ColumnDef::new("credits", DataType::Integer))
                .build()
                .unwrap(),
        )
    }

    async fn seeded() -> (MemoryDataSource, Arc<TableDef>, Box<dyn Table>) {
        let source = MemoryDataSource::new();
        let def = student_def();
        let table = source.open_table(def.clone()).await.unwrap();
        for (first, last, credits) in [
            ("Ada", "Lovelace", 30),
            ("Alan", "Turing", 24),
            ("Grace", "Hopper", 36),
        ] {
            let mut record = NamedRecord::new(def.clone());
            record.put("first_name", Value::from(first)).unwrap();
            record.put("last_name", Value::from(last)).unwrap();
            record.put("credits", Value::Int(credits)).unwrap();
            table.store(&mut record).await.unwrap();
        }
        (source, def, table)
    }

    #[tokio::test]
    async fn test_store_generates_primary_key() {
        let (_source, def, table) = seeded().await;
        let mut record = NamedRecord::new(def);
        record.put("first_name", Value::from("Edsger")).unwrap();
        table.store(&mut record).await.unwrap();
        // Three seeded rows consumed 1..=3.
        assert_eq!(record.get_int("id_student").unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_store_respects_caller_supplied_key() {
        let (_source, def, table) = seeded().await;
        let mut record = NamedRecord::new(def);
        record.put("id_student", Value::Int(500)).unwrap();
        record.put("first_name", Value::from("Barbara")).unwrap();
        table.store(&mut record).await.unwrap();
        assert!(table.exists(&[Value::Int(500)]).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_duplicate_key_is_error() {
        let (_source, def, table) = seeded().await;
        let mut record = NamedRecord::new(def);
        record.put("id_student", Value::Int(1)).unwrap();
        record.put("first_name", Value::from("Clone")).unwrap();
        let err = table.insert(&mut record).await.unwrap_err();
        assert!(matches!(err, DataError::DuplicateKey { .. }));
    }

    #[tokio::test]
    async fn test_load_miss_leaves_target_untouched() {
        let (_source, def, table) = seeded().await;
        let mut target = NamedRecord::new(def);
        target.put("first_name", Value::from("sentinel")).unwrap();
        let hit = table.load(&[Value::Int(9000)], &mut target).await.unwrap();
        assert!(!hit);
        assert_eq!(target.get("first_name"), Value::from("sentinel"));
    }

    #[tokio::test]
    async fn test_load_hit_repopulates_target() {
        let (_source, def, table) = seeded().await;
        let mut target = NamedRecord::new(def);
        target.put("credits", Value::Int(-1)).unwrap();
        let hit = table.load(&[Value::Int(1)], &mut target).await.unwrap();
        assert!(hit);
        assert_eq!(target.get("first_name"), Value::from("Ada"));
        assert_eq!(target.get_int("credits").unwrap(), Some(30));
    }

    #[tokio::test]
    async fn test_fetch_predicate_sort_and_window() {
        let (_source, _def, table) = seeded().await;
        let spec = FetchSpec::all()
            .with_predicate(Predicate::ge("credits", Value::Int(24)))
            .with_order(SortKey::desc("credits"))
            .with_window(1, 1);
        let mut cursor = table.fetch(&spec).await.unwrap();
        assert_eq!(cursor.len(), 1);
        let row = cursor.next().unwrap();
        assert_eq!(row.get("first_name"), Value::from("Ada"));
    }

    #[tokio::test]
    async fn test_fetch_like_pattern() {
        let (_source, _def, table) = seeded().await;
        let spec = FetchSpec::all().with_predicate(Predicate::like("last_name", "%ing"));
        let cursor = table.fetch(&spec).await.unwrap();
        assert_eq!(cursor.len(), 1);
    }

    #[tokio::test]
    async fn test_null_never_satisfies_comparison() {
        let (_source, def, table) = seeded().await;
        let mut record = NamedRecord::new(def);
        record.put("first_name", Value::from("Nobody")).unwrap();
        record.put("credits", Value::Null).unwrap();
        table.store(&mut record).await.unwrap();

        let matching = table
            .fetch(&FetchSpec::all().with_predicate(Predicate::lt("credits", Value::Int(1000))))
            .await
            .unwrap();
        assert_eq!(matching.len(), 3);
        let nulls = table
            .fetch(&FetchSpec::all().with_predicate(Predicate::is_null("credits")))
            .await
            .unwrap();
        assert_eq!(nulls.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregates() {
        let (_source, _def, table) = seeded().await;
        assert_eq!(table.count(None).await.unwrap(), 3);
        assert_eq!(
            table.sum("credits", None).await.unwrap(),
            Value::Decimal(Decimal::from(90))
        );
        assert_eq!(
            table.avg("credits", None).await.unwrap(),
            Value::Decimal(Decimal::from(30))
        );
        assert_eq!(table.min("credits", None).await.unwrap(), Value::Int(24));
        assert_eq!(table.max("credits", None).await.unwrap(), Value::Int(36));
    }

    #[tokio::test]
    async fn test_aggregate_over_empty_match_is_null() {
        let (_source, _def, table) = seeded().await;
        let none = Predicate::gt("credits", Value::Int(1000));
        assert_eq!(table.count(Some(&none)).await.unwrap(), 0);
        assert_eq!(
            table.sum("credits", Some(&none)).await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_update_where_and_delete_where() {
        let source = MemoryDataSource::new();
        let def = student_def();
        {
            let table = source.open_table(def.clone()).await.unwrap();
            for credits in [10, 20, 30] {
                let mut record = NamedRecord::new(def.clone());
                record.put("first_name", Value::from("x")).unwrap();
                record.put("credits", Value::Int(credits)).unwrap();
                table.store(&mut record).await.unwrap();
            }
        }
        let table = source.open_relational_table(def).await.unwrap();
        let updated = table
            .update_where(
                &[("credits".to_string(), Value::Int(0))],
                &Predicate::lt("credits", Value::Int(25)),
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let deleted = table
            .delete_where(&Predicate::eq("credits", Value::Int(0)))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(table.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_where_rejects_primary_key() {
        let (_source, def, _table) = seeded().await;
        let source = MemoryDataSource::new();
        let table = source.open_relational_table(def).await.unwrap();
        let err = table
            .update_where(
                &[("id_student".to_string(), Value::Int(1))],
                &Predicate::eq("credits", Value::Int(0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_operations() {
        let (_source, _def, mut table) = seeded().await;
        table.close();
        table.close();
        assert_eq!(table.state(), HandleState::Closed);
        let err = table.exists(&[Value::Int(1)]).await.unwrap_err();
        assert!(matches!(err, DataError::HandleClosed { .. }));
    }

    #[tokio::test]
    async fn test_join_view_inner_and_left_outer() {
        let source = MemoryDataSource::new();
        let student = student_def();
        let enrollment = Arc::new(
            TableDef::builder("enrollment")
                .add_primary_key_column(ColumnDef::new("id_enrollment", DataType::Integer))
                .add_column(ColumnDef::new("id_student", DataType::Integer).not_null())
                .add_column(ColumnDef::new("course", DataType::varchar()))
                .build()
                .unwrap(),
        );
        {
            let students = source.open_table(student.clone()).await.unwrap();
            for (id, name) in [(1, "Ada"), (2, "Alan")] {
                let mut record = NamedRecord::new(student.clone());
                record.put("id_student", Value::Int(id)).unwrap();
                record.put("first_name", Value::from(name)).unwrap();
                students.store(&mut record).await.unwrap();
            }
            let enrollments = source.open_table(enrollment.clone()).await.unwrap();
            let mut record = NamedRecord::new(enrollment.clone());
            record.put("id_enrollment", Value::Int(1)).unwrap();
            record.put("id_student", Value::Int(1)).unwrap();
            record.put("course", Value::from("Analysis")).unwrap();
            enrollments.store(&mut record).await.unwrap();
        }

        let inner = source
            .open_join_view(&JoinSpec::new(
                "student",
                "enrollment",
                vec![("id_student".to_string(), "id_student".to_string())],
                JoinKind::Inner,
            ))
            .await
            .unwrap();
        let rows = inner.fetch(&FetchSpec::all()).await.unwrap();
        assert_eq!(rows.len(), 1);

        let outer = source
            .open_join_view(&JoinSpec::new(
                "student",
                "enrollment",
                vec![("id_student".to_string(), "id_student".to_string())],
                JoinKind::LeftOuter,
            ))
            .await
            .unwrap();
        let mut rows = outer.fetch(&FetchSpec::all()).await.unwrap();
        assert_eq!(rows.len(), 2);
        // Clashing right column carries the right table's prefix.
        let first = rows.next().unwrap();
        assert!(first.table_def().column("enrollment_id_student").is_some());
    }

    #[tokio::test]
    async fn test_bucket_round_trip_and_keys() {
        let source = MemoryDataSource::new();
        let bucket = source.open_bucket("files").await.unwrap();
        let mut entry = Stored::new("files", "b-key").unwrap();
        entry.put_bytes(vec![1, 2, 3]).unwrap();
        bucket.store(&entry).await.unwrap();
        let mut other = Stored::new("files", "a-key").unwrap();
        bucket.store(&other).await.unwrap();

        assert!(bucket.exists("b-key").await.unwrap());
        let mut loaded = Stored::with_generated_key("files");
        assert!(bucket.load("b-key", &mut loaded).await.unwrap());
        assert_eq!(loaded.value, vec![1, 2, 3]);
        assert_eq!(loaded.key, "b-key");

        // Keys come back in order.
        assert_eq!(bucket.keys().await.unwrap(), vec!["a-key", "b-key"]);
        assert!(bucket.delete("a-key").await.unwrap());
        assert!(!bucket.delete("a-key").await.unwrap());

        // Same data is visible through a second handle.
        other.put_bytes(vec![9]).unwrap();
        let second = source.open_bucket("files").await.unwrap();
        assert!(second.exists("b-key").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_bucket_name_uses_default() {
        let source = MemoryDataSource::with_default_bucket("main");
        let bucket = source.open_bucket("").await.unwrap();
        assert_eq!(bucket.name(), "main");
    }

    #[tokio::test]
    async fn test_query_by_target_name() {
        let (source, _def, _table) = seeded().await;
        let query = Query::new(
            "STUDENT",
            FetchSpec::all().with_predicate(Predicate::gt("credits", Value::Int(25))),
        );
        let cursor = source.query(&query).await.unwrap();
        assert_eq!(cursor.len(), 2);

        let missing = Query::new("nope", FetchSpec::all());
        assert!(matches!(
            source.query(&missing).await.unwrap_err(),
            DataError::Backend { .. }
        ));
    }

    #[tokio::test]
    async fn test_transactions_unsupported() {
        let source = MemoryDataSource::new();
        assert!(matches!(
            source.transactions(),
            Err(DataError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_sequence_is_monotonic() {
        let source = MemoryDataSource::new();
        let sequence = source.sequence("order_id").unwrap();
        let a = sequence.next_value().await.unwrap();
        let b = sequence.next_value().await.unwrap();
        assert_eq!(a, SEQUENCE_START_DEFAULT);
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_register_conflicting_definition_is_error() {
        let source = MemoryDataSource::new();
        source.open_table(student_def()).await.unwrap();
        let other = Arc::new(
            TableDef::builder("student")
                .add_primary_key_column(ColumnDef::new("id", DataType::Long))
                .build()
                .unwrap(),
        );
        assert!(source.open_table(other).await.is_err());
    }
}
