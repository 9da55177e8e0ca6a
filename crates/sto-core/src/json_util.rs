//! Shared JSON parsing helpers.
//!
//! The terminal backend forwards exchange payloads mostly verbatim, so numeric
//! fields may arrive as JSON strings (`"30000.5"`) or native numbers
//! (`30000.5`). The `de_*` functions plug these helpers into serde derives via
//! `#[serde(deserialize_with = "...")]`.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s.trim()).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Serde adapter: string-or-number into `f64`. `null` reads as `0.0`.
pub fn de_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    if v.is_null() {
        return Ok(0.0);
    }
    parse_str_f64(Some(&v)).ok_or_else(|| D::Error::custom(format!("expected number, got {v}")))
}

/// Serde adapter: string-or-number into `u64`. `null` reads as `0`.
pub fn de_u64<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    if v.is_null() {
        return Ok(0);
    }
    parse_str_u64(Some(&v))
        .ok_or_else(|| D::Error::custom(format!("expected unsigned integer, got {v}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn string_and_number_forms() {
        assert_eq!(parse_str_f64(Some(&json!("30000.5"))), Some(30000.5));
        assert_eq!(parse_str_f64(Some(&json!(30000.5))), Some(30000.5));
        assert_eq!(parse_str_f64(Some(&json!("abc"))), None);
        assert_eq!(parse_str_f64(None), None);
        assert_eq!(parse_str_u64(Some(&json!("42"))), Some(42));
    }

    #[test]
    fn serde_adapters() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "de_f64")]
            price: f64,
            #[serde(deserialize_with = "de_u64")]
            id: u64,
        }

        let row: Row = serde_json::from_value(json!({"price": "101.5", "id": 7})).unwrap();
        assert_eq!(row.price, 101.5);
        assert_eq!(row.id, 7);

        let row: Row = serde_json::from_value(json!({"price": null, "id": "9"})).unwrap();
        assert_eq!(row.price, 0.0);
        assert_eq!(row.id, 9);

        assert!(serde_json::from_value::<Row>(json!({"price": "x", "id": 1})).is_err());
    }
}
