//! Column Definitions and the Declared Type System

use serde::{Deserialize, Serialize};

use crate::value::Value;

// =============================================================================
// Data Type
// =============================================================================

/// Engine-neutral declared type of a column, and the codec's type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Signed 32-bit integer.
    Integer,
    /// Signed 64-bit integer.
    Long,
    /// Exact decimal with optional declared precision and scale.
    Decimal {
        /// Total number of significant digits, if declared.
        precision: Option<u8>,
        /// Digits to the right of the decimal point, if declared.
        scale: Option<u8>,
    },
    /// Variable-length UTF-8 text with optional declared length.
    Varchar {
        /// Maximum character count, if declared.
        length: Option<u32>,
    },
    /// Large UTF-8 text without a declared length.
    Clob,
    /// Point in time, UTC, microsecond precision.
    Timestamp,
    /// Calendar date.
    Date,
    /// Opaque byte payload.
    Blob,
    /// Homogeneous array of another declared type.
    Array(Box<DataType>),
    /// Generic self-describing object.
    Object,
}

impl DataType {
    /// Plain varchar without a declared length.
    #[must_use]
    pub fn varchar() -> Self {
        Self::Varchar { length: None }
    }

    /// Varchar with a declared maximum length.
    #[must_use]
    pub fn varchar_with_length(length: u32) -> Self {
        Self::Varchar {
            length: Some(length),
        }
    }

    /// Plain decimal without declared precision.
    #[must_use]
    pub fn decimal() -> Self {
        Self::Decimal {
            precision: None,
            scale: None,
        }
    }

    /// Decimal with declared precision and scale.
    #[must_use]
    pub fn decimal_with_precision(precision: u8, scale: u8) -> Self {
        Self::Decimal {
            precision: Some(precision),
            scale: Some(scale),
        }
    }

    /// Array of the given element type.
    #[must_use]
    pub fn array_of(element: DataType) -> Self {
        Self::Array(Box::new(element))
    }

    /// Check whether a value belongs to this declared type's family.
    ///
    /// Null is accepted by every type; nullability is checked separately.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Int(_)) => true,
            (Self::Long, Value::Long(_) | Value::Int(_)) => true,
            (Self::Decimal { .. }, Value::Decimal(_) | Value::Int(_) | Value::Long(_)) => true,
            (Self::Varchar { .. } | Self::Clob, Value::Text(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Blob, Value::Bytes(_)) => true,
            (Self::Array(elem), Value::Array(items)) => items.iter().all(|v| elem.accepts(v)),
            (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::Long => write!(f, "long"),
            Self::Decimal {
                precision: Some(p),
                scale: Some(s),
            } => write!(f, "decimal({p},{s})"),
            Self::Decimal { .. } => write!(f, "decimal"),
            Self::Varchar { length: Some(n) } => write!(f, "varchar({n})"),
            Self::Varchar { length: None } => write!(f, "varchar"),
            Self::Clob => write!(f, "clob"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Date => write!(f, "date"),
            Self::Blob => write!(f, "blob"),
            Self::Array(elem) => write!(f, "array<{elem}>"),
            Self::Object => write!(f, "object"),
        }
    }
}

// =============================================================================
// Column Definition
// =============================================================================

/// One column of a table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, unique within its table (case-insensitive).
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Whether null is a legal stored value.
    pub nullable: bool,
    /// Whether the owning table generates this column's value from a
    /// sequence when a record leaves it unset. Meaningful for primary
    /// key columns only.
    pub auto_generate: bool,
}

impl ColumnDef {
    /// Create a nullable column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            auto_generate: false,
        }
    }

    /// Mark the column as not-null.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Mark the column as auto-generated.
    #[must_use]
    pub fn auto_generated(mut self) -> Self {
        self.auto_generate = true;
        self
    }

    /// Case-insensitive name match.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
