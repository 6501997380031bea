//! Crate-Wide Constants
//!
//! Limits use category-first naming with units in the name:
//! `_BYTES_MAX` for size limits, `_COUNT_MAX` for quantities,
//! `_DEFAULT` for defaults.

// =============================================================================
// Identifier Limits
// =============================================================================

/// Maximum byte length of a table, column, index, or sequence name.
pub const IDENTIFIER_BYTES_MAX: usize = 128;

/// Maximum number of columns a table definition may declare.
pub const TABLE_COLUMNS_COUNT_MAX: usize = 1024;

// =============================================================================
// Fetch Window Limits
// =============================================================================

/// Cap for a fetch window's maximum row count.
///
/// Matches the largest positive value a signed 64-bit backend can express.
pub const FETCH_ROWS_COUNT_MAX: u64 = i64::MAX as u64;

/// Default fetch window when no explicit maximum is requested.
pub const FETCH_ROWS_COUNT_DEFAULT: u64 = FETCH_ROWS_COUNT_MAX;

// =============================================================================
// Sequence Defaults
// =============================================================================

/// First value issued by a fresh sequence.
pub const SEQUENCE_START_DEFAULT: i64 = 1;

/// Default sequence increment.
pub const SEQUENCE_INCREMENT_DEFAULT: i64 = 1;

// =============================================================================
// Codec Wire Sizes
// =============================================================================

/// Encoded width of a 32-bit integer payload.
pub const CODEC_INT_BYTES: usize = 4;

/// Encoded width of a 64-bit integer payload.
pub const CODEC_LONG_BYTES: usize = 8;

/// Encoded width of a timestamp payload (microseconds since epoch).
pub const CODEC_TIMESTAMP_BYTES: usize = 8;

/// Encoded width of a date payload (days from the common era).
pub const CODEC_DATE_BYTES: usize = 4;

/// Maximum element count accepted when decoding an array payload.
pub const CODEC_ARRAY_ELEMENTS_COUNT_MAX: u32 = 1_048_576;

// =============================================================================
// Bucket Limits
// =============================================================================

/// Maximum byte length of a bucket entry key.
pub const BUCKET_KEY_BYTES_MAX: usize = 4096;

/// Maximum byte length of a bucket entry payload.
pub const BUCKET_VALUE_BYTES_MAX: usize = 16 * 1024 * 1024;
