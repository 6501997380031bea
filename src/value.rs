//! Engine-Neutral Cell Values
//!
//! `Value` is the single currency that flows between records, predicates,
//! the codec, and backends. Coercion rules are documented per accessor:
//! numeric-to-numeric widening is allowed, text parses to numbers (with a
//! `Format` error on garbage), and cross-family coercion is a `TypeMismatch`.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

// =============================================================================
// Cell State
// =============================================================================

/// Presence of a cell inside a record.
///
/// Distinguishes "never written" from "explicitly set to null" from
/// "has a value".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// The column was never written.
    Unset,
    /// The column was explicitly set to null.
    Null,
    /// The column holds a value.
    Set,
}

// =============================================================================
// Value
// =============================================================================

/// A single engine-neutral cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absent value marker.
    Null,
    /// Signed 32-bit integer.
    Int(i32),
    /// Signed 64-bit integer.
    Long(i64),
    /// Exact decimal number.
    Decimal(Decimal),
    /// UTF-8 text.
    Text(String),
    /// Opaque byte payload.
    Bytes(Vec<u8>),
    /// Point in time, UTC.
    Timestamp(DateTime<Utc>),
    /// Calendar date without time component.
    Date(NaiveDate),
    /// Homogeneous array of values.
    Array(Vec<Value>),
    /// Generic structured object (map, list, scalar) that round-trips as-is.
    Object(serde_json::Value),
}

impl Value {
    /// Check if this is the null marker.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short family name, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Coerce to `i32`.
    ///
    /// Longs and integral decimals narrow when they fit, text parses.
    /// Returns `None` for null.
    pub fn as_int(&self) -> DataResult<Option<i32>> {
        match self {
            Self::Null => Ok(None),
            Self::Int(v) => Ok(Some(*v)),
            Self::Long(v) => i32::try_from(*v)
                .map(Some)
                .map_err(|_| DataError::format(format!("long {v} out of i32 range"))),
            Self::Decimal(d) => {
                if d.fract().is_zero() {
                    d.to_i32()
                        .map(Some)
                        .ok_or_else(|| DataError::format(format!("decimal {d} out of i32 range")))
                } else {
                    Err(DataError::format(format!("decimal {d} is not integral")))
                }
            }
            Self::Text(s) => s
                .trim()
                .parse::<i32>()
                .map(Some)
                .map_err(|_| DataError::format(format!("not an integer: {s:?}"))),
            other => Err(DataError::type_mismatch("int", other.kind())),
        }
    }

    /// Coerce to `i64`. Ints widen, integral decimals convert, text parses.
    pub fn as_long(&self) -> DataResult<Option<i64>> {
        match self {
            Self::Null => Ok(None),
            Self::Int(v) => Ok(Some(i64::from(*v))),
            Self::Long(v) => Ok(Some(*v)),
            Self::Decimal(d) => {
                if d.fract().is_zero() {
                    d.to_i64()
                        .map(Some)
                        .ok_or_else(|| DataError::format(format!("decimal {d} out of i64 range")))
                } else {
                    Err(DataError::format(format!("decimal {d} is not integral")))
                }
            }
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| DataError::format(format!("not an integer: {s:?}"))),
            other => Err(DataError::type_mismatch("long", other.kind())),
        }
    }

    /// Coerce to `Decimal`. Integers widen, text parses.
    pub fn as_decimal(&self) -> DataResult<Option<Decimal>> {
        match self {
            Self::Null => Ok(None),
            Self::Int(v) => Ok(Some(Decimal::from(*v))),
            Self::Long(v) => Ok(Some(Decimal::from(*v))),
            Self::Decimal(d) => Ok(Some(*d)),
            Self::Text(s) => Decimal::from_str(s.trim())
                .map(Some)
                .map_err(|_| DataError::format(format!("not a decimal: {s:?}"))),
            other => Err(DataError::type_mismatch("decimal", other.kind())),
        }
    }

    /// Coerce to text. Numbers, timestamps, and dates render via `Display`;
    /// bytes and structured values do not cross into the text family.
    pub fn as_text(&self) -> DataResult<Option<String>> {
        match self {
            Self::Null => Ok(None),
            Self::Text(s) => Ok(Some(s.clone())),
            Self::Int(v) => Ok(Some(v.to_string())),
            Self::Long(v) => Ok(Some(v.to_string())),
            Self::Decimal(d) => Ok(Some(d.to_string())),
            Self::Timestamp(t) => Ok(Some(t.to_rfc3339())),
            Self::Date(d) => Ok(Some(d.to_string())),
            other => Err(DataError::type_mismatch("text", other.kind())),
        }
    }

    /// Coerce to raw bytes. Only the bytes family qualifies.
    pub fn as_bytes(&self) -> DataResult<Option<Vec<u8>>> {
        match self {
            Self::Null => Ok(None),
            Self::Bytes(b) => Ok(Some(b.clone())),
            other => Err(DataError::type_mismatch("bytes", other.kind())),
        }
    }

    /// Coerce to a timestamp. Dates widen to midnight UTC.
    pub fn as_timestamp(&self) -> DataResult<Option<DateTime<Utc>>> {
        match self {
            Self::Null => Ok(None),
            Self::Timestamp(t) => Ok(Some(*t)),
            Self::Date(d) => {
                let midnight = d
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| DataError::format(format!("invalid date {d}")))?;
                Ok(Some(midnight.and_utc()))
            }
            other => Err(DataError::type_mismatch("timestamp", other.kind())),
        }
    }

    /// Compare two values for ordering.
    ///
    /// Numeric values compare across widths through `Decimal`. Comparing
    /// across families, or against null, is a `TypeMismatch`; predicate
    /// evaluation filters nulls out before calling this.
    pub fn compare(&self, other: &Value) -> DataResult<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Ok(a.cmp(b)),
            (Self::Bytes(a), Self::Bytes(b)) => Ok(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Ok(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Ok(a.cmp(b)),
            (
                a @ (Self::Int(_) | Self::Long(_) | Self::Decimal(_)),
                b @ (Self::Int(_) | Self::Long(_) | Self::Decimal(_)),
            ) => {
                let da = a.as_decimal()?.unwrap_or_default();
                let db = b.as_decimal()?.unwrap_or_default();
                Ok(da.cmp(&db))
            }
            (a, b) => Err(DataError::type_mismatch(a.kind(), b.kind())),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Date(d) => write!(f, "{d}"),
            Self::Array(items) => write!(f, "<array of {}>", items.len()),
            Self::Object(_) => write!(f, "<object>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Value::Int(7).as_long().unwrap(), Some(7));
        assert_eq!(
            Value::Int(7).as_decimal().unwrap(),
            Some(Decimal::from(7i32))
        );
        assert_eq!(Value::Long(7).as_int().unwrap(), Some(7));
    }

    #[test]
    fn test_narrowing_out_of_range_is_format_error() {
        let err = Value::Long(i64::MAX).as_int().unwrap_err();
        assert!(matches!(err, DataError::Format { .. }));
    }

    #[test]
    fn test_text_parses_to_numbers() {
        assert_eq!(Value::from("42").as_int().unwrap(), Some(42));
        assert_eq!(Value::from(" 42 ").as_long().unwrap(), Some(42));
        assert_eq!(
            Value::from("3.14").as_decimal().unwrap(),
            Some(Decimal::from_str("3.14").unwrap())
        );
    }

    #[test]
    fn test_non_numeric_text_is_format_error() {
        let err = Value::from("forty-two").as_int().unwrap_err();
        assert!(matches!(err, DataError::Format { .. }));
    }

    #[test]
    fn test_cross_family_is_type_mismatch() {
        let err = Value::Bytes(vec![1, 2, 3]).as_int().unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));

        let err = Value::Int(1).as_bytes().unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
    }

    #[test]
    fn test_null_coerces_to_none() {
        assert_eq!(Value::Null.as_int().unwrap(), None);
        assert_eq!(Value::Null.as_text().unwrap(), None);
        assert_eq!(Value::Null.as_bytes().unwrap(), None);
    }

    #[test]
    fn test_compare_across_numeric_widths() {
        assert_eq!(
            Value::Int(2).compare(&Value::Long(10)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::Decimal(Decimal::from(5i32))
                .compare(&Value::Int(5))
                .unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_cross_family_fails() {
        let err = Value::from("abc").compare(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
    }

    #[test]
    fn test_date_widens_to_timestamp() {
        let d = NaiveDate::from_ymd_opt(2020, 5, 17).unwrap();
        let ts = Value::Date(d).as_timestamp().unwrap().unwrap();
        assert_eq!(ts.date_naive(), d);
    }
}
