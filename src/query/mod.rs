//! Query and Predicate Abstraction
//!
//! Engine-neutral filter trees and fetch specifications. Each backend
//! translates the tree to its native query mechanism; an operator a
//! backend cannot translate must be reported as an unsupported-operation
//! error, never silently dropped.

use serde::{Deserialize, Serialize};

use crate::constants::{FETCH_ROWS_COUNT_DEFAULT, FETCH_ROWS_COUNT_MAX};
use crate::value::Value;

// =============================================================================
// Predicates
// =============================================================================

/// Comparison operator between a column and an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

/// Right-hand side of a comparison: a literal or another column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Literal value.
    Literal(Value),
    /// Reference to another column of the same row.
    Column(String),
}

/// Composable boolean filter expression over columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Column compared against an operand.
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        operand: Operand,
    },
    /// Column value is a member of the literal set.
    In {
        /// Column name.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
    },
    /// SQL-style pattern match (`%` any run, `_` one character).
    Like {
        /// Column name.
        column: String,
        /// Match pattern.
        pattern: String,
    },
    /// Column holds no value.
    IsNull {
        /// Column name.
        column: String,
    },
    /// All sub-predicates hold.
    And(Vec<Predicate>),
    /// At least one sub-predicate holds.
    Or(Vec<Predicate>),
    /// Sub-predicate does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `column = value`.
    #[must_use]
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// `column <> value`.
    #[must_use]
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    /// `column < value`.
    #[must_use]
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    /// `column <= value`.
    #[must_use]
    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    /// `column > value`.
    #[must_use]
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    /// `column >= value`.
    #[must_use]
    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    /// Comparison against a literal with an explicit operator.
    #[must_use]
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            operand: Operand::Literal(value.into()),
        }
    }

    /// Comparison against another column of the same row.
    #[must_use]
    pub fn compare_columns(
        column: impl Into<String>,
        op: CompareOp,
        other_column: impl Into<String>,
    ) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            operand: Operand::Column(other_column.into()),
        }
    }

    /// `column IN (values...)`.
    #[must_use]
    pub fn in_list(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            column: column.into(),
            values,
        }
    }

    /// `column LIKE pattern`.
    #[must_use]
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    /// `column IS NULL`.
    #[must_use]
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
        }
    }

    /// Conjunction with another predicate.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction with another predicate.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

// =============================================================================
// Ordering and Selection
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One ordering term of a fetch specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Column to order by.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending sort on a column.
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending sort on a column.
    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Aggregate function over a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunc {
    /// Row count.
    Count,
    /// Numeric sum.
    Sum,
    /// Numeric average.
    Avg,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
}

/// One selected column or synthesized aggregate expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectExpr {
    /// Plain column.
    Column(String),
    /// Aggregate expression with a result alias.
    Aggregate {
        /// Function to apply.
        func: AggregateFunc,
        /// Column the function applies to (`*` for count).
        column: String,
        /// Name of the synthesized result column.
        alias: String,
    },
}

// =============================================================================
// Fetch Specification
// =============================================================================

/// Bounded description of what to fetch: column group, filter, ordering,
/// and row window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSpec {
    /// Selected columns; empty means all columns.
    pub columns: Vec<SelectExpr>,
    /// Row filter; `None` matches everything.
    pub predicate: Option<Predicate>,
    /// Ordering terms, applied in sequence.
    pub order_by: Vec<SortKey>,
    /// Rows to skip before the first returned row.
    pub offset: u64,
    /// Maximum rows returned, capped at `FETCH_ROWS_COUNT_MAX`.
    pub max_rows: u64,
}

impl Default for FetchSpec {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            predicate: None,
            order_by: Vec::new(),
            offset: 0,
            max_rows: FETCH_ROWS_COUNT_DEFAULT,
        }
    }
}

impl FetchSpec {
    /// Fetch everything, unbounded.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given columns.
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<SelectExpr>) -> Self {
        self.columns = columns;
        self
    }

    /// Filter rows with a predicate.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Append an ordering term.
    #[must_use]
    pub fn with_order(mut self, key: SortKey) -> Self {
        self.order_by.push(key);
        self
    }

    /// Set the row window. `max_rows` is clamped to the platform cap.
    #[must_use]
    pub fn with_window(mut self, offset: u64, max_rows: u64) -> Self {
        self.offset = offset;
        self.max_rows = max_rows.min(FETCH_ROWS_COUNT_MAX);
        self
    }
}

/// A fetch specification bound to a named target table or view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Target table or view name.
    pub target: String,
    /// What to fetch from it.
    pub spec: FetchSpec,
}

impl Query {
    /// Create a query against the named target.
    #[must_use]
    pub fn new(target: impl Into<String>, spec: FetchSpec) -> Self {
        Self {
            target: target.into(),
            spec,
        }
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Rows with a match on both sides.
    Inner,
    /// All left rows; right columns null when unmatched.
    LeftOuter,
}

/// Construction recipe for a join view over two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Left (driving) table name.
    pub left: String,
    /// Right (joined) table name.
    pub right: String,
    /// Column-equality pairs (left column, right column).
    pub on: Vec<(String, String)>,
    /// Join flavor.
    pub kind: JoinKind,
}

impl JoinSpec {
    /// Create a join over one or more column-equality pairs.
    #[must_use]
    pub fn new(
        left: impl Into<String>,
        right: impl Into<String>,
        on: Vec<(String, String)>,
        kind: JoinKind,
    ) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            on,
            kind,
        }
    }
}
