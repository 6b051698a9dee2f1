use chrono::{DateTime, NaiveDateTime, Timelike};
use serde_json::Value;

/// Scale of fixed-point coordinates in archives (and some API fields)
pub(crate) const COORDINATE_SCALE: f64 = 100_000.0;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a source timestamp, truncated to the second.
///
/// Accepts `2024-03-01 08:00:00`, the `T`-separated archive variant, and
/// RFC 3339 with an offset (the offset is dropped, wall-clock time is kept).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return truncate(dt.naive_local());
    }

    let normalized = raw.replacen('T', " ", 1);
    NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .and_then(truncate)
}

fn truncate(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    dt.with_nanosecond(0)
}

/// A number from a JSON number or a numeric string (comma decimals allowed)
pub(crate) fn json_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub(crate) fn parse_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A trimmed, non-empty string from a JSON string or number
pub(crate) fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn field_string(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(json_string)
}

pub(crate) fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Coordinate in degrees, accepting the fixed-point encoding.
///
/// Values outside `limit` degrees are read as fixed-point and scaled down;
/// anything still out of range is dropped.
pub(crate) fn normalize_coordinate(value: f64, limit: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let degrees = if value.abs() > limit {
        value / COORDINATE_SCALE
    } else {
        value
    };
    (degrees.abs() <= limit).then_some(degrees)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_variants() {
        let expected =
            NaiveDateTime::parse_from_str("2024-03-01 08:00:00", TIMESTAMP_FORMAT).unwrap();

        assert_eq!(parse_timestamp("2024-03-01 08:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:00:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 08:00:00.123"), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-01 08:00:00"), None);
        assert_eq!(parse_timestamp("2024-03-01"), None);
    }

    #[test]
    fn test_json_f64() {
        assert_eq!(json_f64(&json!(1.799)), Some(1.799));
        assert_eq!(json_f64(&json!("1.799")), Some(1.799));
        assert_eq!(json_f64(&json!("1,799")), Some(1.799));
        assert_eq!(json_f64(&json!("abc")), None);
        assert_eq!(json_f64(&json!(null)), None);
    }

    #[test]
    fn test_normalize_coordinate() {
        assert_eq!(normalize_coordinate(48.1, 90.0), Some(48.1));
        assert_eq!(normalize_coordinate(4810000.0, 90.0), Some(48.1));
        assert_eq!(normalize_coordinate(-160000.0, 180.0), Some(-1.6));
        assert_eq!(normalize_coordinate(f64::NAN, 90.0), None);
        assert_eq!(normalize_coordinate(99_999_999.0, 90.0), None);
    }
}
