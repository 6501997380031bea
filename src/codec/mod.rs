//! Type Codec
//!
//! Deterministic byte-array encoding for every supported value family,
//! keyed by the declared type tag. Any backend that stores opaque payloads
//! (key-value buckets, document stores) relies on this codec to carry
//! typed values losslessly.
//!
//! # Wire format
//!
//! Every encoded value starts with a one-byte envelope: `0x00` is the null
//! sentinel, `0x01` marks a present payload. A present empty payload (a
//! zero-length string) is therefore distinct from null. Payloads:
//!
//! - integers, timestamps, dates: fixed-width two's-complement big-endian,
//!   so raw bytes compare in value order
//! - text: UTF-8, no length prefix (length is the envelope's job)
//! - decimal: canonical UTF-8 digits
//! - blob: raw bytes
//! - arrays: big-endian element count, then a big-endian length prefix and
//!   a recursively encoded element (envelope included, so null elements
//!   round-trip)
//! - generic objects: self-describing JSON container, so maps, lists, and
//!   scalars round-trip value-for-value
//!
//! The round-trip law `decode(encode(v, t), t) == v` holds for every value
//! representable by tag `t`. Timestamps carry microsecond precision.

use bytes::{Buf, BufMut};
use chrono::{DateTime, Datelike, NaiveDate};

use crate::constants::{
    CODEC_ARRAY_ELEMENTS_COUNT_MAX, CODEC_DATE_BYTES, CODEC_INT_BYTES, CODEC_LONG_BYTES,
    CODEC_TIMESTAMP_BYTES,
};
use crate::error::{DataError, DataResult};
use crate::metadata::DataType;
use crate::value::Value;

const ENVELOPE_NULL: u8 = 0x00;
const ENVELOPE_PRESENT: u8 = 0x01;

/// Encode a value under the given type tag.
///
/// The value must belong to the tag's exact family; the codec does not
/// coerce. Null encodes as the one-byte sentinel for every tag.
pub fn encode(value: &Value, tag: &DataType) -> DataResult<Vec<u8>> {
    if value.is_null() {
        return Ok(vec![ENVELOPE_NULL]);
    }
    let mut out = vec![ENVELOPE_PRESENT];
    encode_payload(value, tag, &mut out)?;
    Ok(out)
}

/// Decode a byte payload under the given type tag.
///
/// Fails with `TypeMismatch` when the layout is shorter than the tag's
/// minimum length, and `Format` when the payload itself is undecodable.
pub fn decode(bytes: &[u8], tag: &DataType) -> DataResult<Value> {
    let Some((&envelope, payload)) = bytes.split_first() else {
        return Err(DataError::type_mismatch("envelope byte", "empty payload"));
    };
    match envelope {
        ENVELOPE_NULL => Ok(Value::Null),
        ENVELOPE_PRESENT => decode_payload(payload, tag),
        other => Err(DataError::format(format!(
            "unknown envelope byte 0x{other:02x}"
        ))),
    }
}

fn encode_payload(value: &Value, tag: &DataType, out: &mut Vec<u8>) -> DataResult<()> {
    match (tag, value) {
        (DataType::Integer, Value::Int(v)) => out.put_i32(*v),
        (DataType::Long, Value::Long(v)) => out.put_i64(*v),
        (DataType::Decimal { .. }, Value::Decimal(d)) => {
            out.extend_from_slice(d.to_string().as_bytes());
        }
        (DataType::Varchar { .. } | DataType::Clob, Value::Text(s)) => {
            out.extend_from_slice(s.as_bytes());
        }
        (DataType::Timestamp, Value::Timestamp(t)) => out.put_i64(t.timestamp_micros()),
        (DataType::Date, Value::Date(d)) => out.put_i32(d.num_days_from_ce()),
        (DataType::Blob, Value::Bytes(b)) => out.extend_from_slice(b),
        (DataType::Array(elem), Value::Array(items)) => {
            let count = u32::try_from(items.len())
                .map_err(|_| DataError::format("array too long to encode"))?;
            if count > CODEC_ARRAY_ELEMENTS_COUNT_MAX {
                return Err(DataError::format(format!(
                    "array of {count} elements exceeds {CODEC_ARRAY_ELEMENTS_COUNT_MAX}"
                )));
            }
            out.put_u32(count);
            for item in items {
                let encoded = encode(item, elem)?;
                let len = u32::try_from(encoded.len())
                    .map_err(|_| DataError::format("array element too long to encode"))?;
                out.put_u32(len);
                out.extend_from_slice(&encoded);
            }
        }
        (DataType::Object, Value::Object(obj)) => {
            let encoded = serde_json::to_vec(obj)
                .map_err(|e| DataError::format(format!("object encode: {e}")))?;
            out.extend_from_slice(&encoded);
        }
        (tag, value) => {
            return Err(DataError::type_mismatch(tag.to_string(), value.kind()));
        }
    }
    Ok(())
}

fn decode_payload(mut payload: &[u8], tag: &DataType) -> DataResult<Value> {
    match tag {
        DataType::Integer => {
            require_width(payload, CODEC_INT_BYTES, "integer")?;
            Ok(Value::Int(payload.get_i32()))
        }
        DataType::Long => {
            require_width(payload, CODEC_LONG_BYTES, "long")?;
            Ok(Value::Long(payload.get_i64()))
        }
        DataType::Decimal { .. } => {
            let text = std::str::from_utf8(payload)
                .map_err(|_| DataError::format("decimal payload is not UTF-8"))?;
            text.parse()
                .map(Value::Decimal)
                .map_err(|_| DataError::format(format!("not a decimal: {text:?}")))
        }
        DataType::Varchar { .. } | DataType::Clob => std::str::from_utf8(payload)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|_| DataError::format("text payload is not UTF-8")),
        DataType::Timestamp => {
            require_width(payload, CODEC_TIMESTAMP_BYTES, "timestamp")?;
            let micros = payload.get_i64();
            DateTime::from_timestamp_micros(micros)
                .map(Value::Timestamp)
                .ok_or_else(|| DataError::format(format!("timestamp {micros}us out of range")))
        }
        DataType::Date => {
            require_width(payload, CODEC_DATE_BYTES, "date")?;
            let days = payload.get_i32();
            NaiveDate::from_num_days_from_ce_opt(days)
                .map(Value::Date)
                .ok_or_else(|| DataError::format(format!("date {days} days out of range")))
        }
        DataType::Blob => Ok(Value::Bytes(payload.to_vec())),
        DataType::Array(elem) => {
            if payload.remaining() < 4 {
                return Err(DataError::type_mismatch(
                    "4-byte array count",
                    format!("{} bytes", payload.remaining()),
                ));
            }
            let count = payload.get_u32();
            if count > CODEC_ARRAY_ELEMENTS_COUNT_MAX {
                return Err(DataError::format(format!(
                    "array count {count} exceeds {CODEC_ARRAY_ELEMENTS_COUNT_MAX}"
                )));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                if payload.remaining() < 4 {
                    return Err(DataError::format("truncated array element length"));
                }
                let len = payload.get_u32() as usize;
                if payload.remaining() < len {
                    return Err(DataError::format("truncated array element"));
                }
                let (element_bytes, rest) = payload.split_at(len);
                items.push(decode(element_bytes, elem)?);
                payload = rest;
            }
            if !payload.is_empty() {
                return Err(DataError::format("trailing bytes after array payload"));
            }
            Ok(Value::Array(items))
        }
        DataType::Object => serde_json::from_slice(payload)
            .map(Value::Object)
            .map_err(|e| DataError::format(format!("object decode: {e}"))),
    }
}

fn require_width(payload: &[u8], width: usize, what: &str) -> DataResult<()> {
    if payload.len() == width {
        Ok(())
    } else {
        Err(DataError::type_mismatch(
            format!("{width}-byte {what}"),
            format!("{} bytes", payload.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    fn round_trip(value: Value, tag: DataType) {
        let encoded = encode(&value, &tag).unwrap();
        let decoded = decode(&encoded, &tag).unwrap();
        assert_eq!(decoded, value, "round trip under tag {tag}");
    }

    #[test]
    fn test_integer_round_trip() {
        round_trip(Value::Int(113), DataType::Integer);
        round_trip(Value::Int(i32::MIN), DataType::Integer);
        round_trip(Value::Int(-1), DataType::Integer);
        round_trip(Value::Long(i64::MAX), DataType::Long);
    }

    #[test]
    fn test_integer_bytes_are_big_endian() {
        let encoded = encode(&Value::Int(113), &DataType::Integer).unwrap();
        assert_eq!(encoded, vec![0x01, 0x00, 0x00, 0x00, 113]);
    }

    #[test]
    fn test_integer_bytes_compare_in_value_order_for_positives() {
        let a = encode(&Value::Int(5), &DataType::Integer).unwrap();
        let b = encode(&Value::Int(1000), &DataType::Integer).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_text_round_trip() {
        round_trip(Value::from("Üñicode String"), DataType::varchar());
        round_trip(Value::from(""), DataType::Clob);
    }

    #[test]
    fn test_null_is_distinct_from_empty_string() {
        let null = encode(&Value::Null, &DataType::varchar()).unwrap();
        let empty = encode(&Value::from(""), &DataType::varchar()).unwrap();
        assert_ne!(null, empty);
        assert_eq!(decode(&null, &DataType::varchar()).unwrap(), Value::Null);
        assert_eq!(
            decode(&empty, &DataType::varchar()).unwrap(),
            Value::from("")
        );
    }

    #[test]
    fn test_decimal_round_trip() {
        round_trip(
            Value::Decimal(Decimal::from_str("-1234.5678").unwrap()),
            DataType::decimal(),
        );
    }

    #[test]
    fn test_timestamp_round_trip_at_microsecond_precision() {
        let now = DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).unwrap();
        round_trip(Value::Timestamp(now), DataType::Timestamp);
    }

    #[test]
    fn test_date_round_trip() {
        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        round_trip(Value::Date(d), DataType::Date);
    }

    #[test]
    fn test_blob_round_trip() {
        round_trip(Value::Bytes(vec![0, 1, 2, 255]), DataType::Blob);
        round_trip(Value::Bytes(vec![]), DataType::Blob);
    }

    #[test]
    fn test_array_round_trip_with_null_element() {
        round_trip(
            Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)]),
            DataType::array_of(DataType::Integer),
        );
    }

    #[test]
    fn test_nested_array_round_trip() {
        round_trip(
            Value::Array(vec![
                Value::Array(vec![Value::from("a")]),
                Value::Array(vec![]),
            ]),
            DataType::array_of(DataType::array_of(DataType::varchar())),
        );
    }

    #[test]
    fn test_object_round_trip_preserves_structure() {
        round_trip(
            Value::Object(json!({"name": "Ada", "tags": ["x", "y"], "depth": 3})),
            DataType::Object,
        );
        round_trip(Value::Object(json!([1, 2, 3])), DataType::Object);
    }

    #[test]
    fn test_short_payload_is_type_mismatch() {
        let err = decode(&[0x01, 0x00, 0x01], &DataType::Integer).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
    }

    #[test]
    fn test_empty_input_is_type_mismatch() {
        let err = decode(&[], &DataType::Integer).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
    }

    #[test]
    fn test_wrong_family_encode_is_type_mismatch() {
        let err = encode(&Value::from("nope"), &DataType::Integer).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { .. }));
    }

    #[test]
    fn test_bad_utf8_is_format_error() {
        let err = decode(&[0x01, 0xff, 0xfe], &DataType::varchar()).unwrap_err();
        assert!(matches!(err, DataError::Format { .. }));
    }

    #[test]
    fn test_null_round_trip_under_every_tag() {
        for tag in [
            DataType::Integer,
            DataType::Long,
            DataType::decimal(),
            DataType::varchar(),
            DataType::Timestamp,
            DataType::Date,
            DataType::Blob,
            DataType::array_of(DataType::Long),
            DataType::Object,
        ] {
            round_trip(Value::Null, tag);
        }
    }
}
