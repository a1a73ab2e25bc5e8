//! Bridge between [`WireValue`] and `serde_json::Value`.
//!
//! Numbers go through their decimal string form so that "3.14" arrives
//! as the decimal 3.14, not the nearest f64. JSON map keys are strings
//! by construction, so the forward path cannot produce a malformed map.

use crate::value::WireValue;
use indexmap::IndexMap;
use rust_decimal::prelude::*;

/// Errors raised by the wire format bridge.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    /// A JSON number has no exact decimal representation (exponent or
    /// magnitude outside the supported range).
    #[error("number '{0}' is not representable on the wire")]
    MalformedNumber(String),
}

impl WireValue {
    /// Parse a `serde_json::Value` into a wire value.
    pub fn from_json(v: &serde_json::Value) -> Result<WireValue, WireError> {
        match v {
            serde_json::Value::Null => Ok(WireValue::Null),
            serde_json::Value::Bool(b) => Ok(WireValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                let d = n
                    .to_string()
                    .parse::<Decimal>()
                    .map_err(|_| WireError::MalformedNumber(n.to_string()))?;
                Ok(WireValue::Number(d))
            }
            serde_json::Value::String(s) => Ok(WireValue::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let converted: Result<Vec<WireValue>, WireError> =
                    items.iter().map(WireValue::from_json).collect();
                Ok(WireValue::List(converted?))
            }
            serde_json::Value::Object(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (k, item) in entries {
                    map.insert(k.clone(), WireValue::from_json(item)?);
                }
                Ok(WireValue::Map(map))
            }
        }
    }

    /// Serialize a wire value back to `serde_json::Value`.
    ///
    /// Integral numbers that fit i64 become JSON integers; everything
    /// else falls back to the closest f64 representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            WireValue::Null => serde_json::Value::Null,
            WireValue::Bool(b) => serde_json::Value::Bool(*b),
            WireValue::Number(d) => {
                if d.fract().is_zero() {
                    if let Some(i) = d.to_i64() {
                        return serde_json::Value::Number(i.into());
                    }
                }
                match d.to_f64().and_then(serde_json::Number::from_f64) {
                    Some(n) => serde_json::Value::Number(n),
                    None => serde_json::Value::String(d.to_string()),
                }
            }
            WireValue::Str(s) => serde_json::Value::String(s.clone()),
            WireValue::List(items) => {
                serde_json::Value::Array(items.iter().map(WireValue::to_json).collect())
            }
            WireValue::Map(entries) => {
                let mut obj = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn scalars_from_json() {
        assert_eq!(
            WireValue::from_json(&serde_json::json!(null)).unwrap(),
            WireValue::Null
        );
        assert_eq!(
            WireValue::from_json(&serde_json::json!(true)).unwrap(),
            WireValue::Bool(true)
        );
        assert_eq!(
            WireValue::from_json(&serde_json::json!("hi")).unwrap(),
            WireValue::Str("hi".to_string())
        );
    }

    #[test]
    fn numbers_keep_decimal_precision() {
        let v = WireValue::from_json(&serde_json::json!(3.14)).unwrap();
        assert_eq!(v, WireValue::Number(dec("3.14")));
        let v = WireValue::from_json(&serde_json::json!(9007199254740993i64)).unwrap();
        assert_eq!(v, WireValue::Number(dec("9007199254740993")));
    }

    #[test]
    fn nested_round_trip() {
        let json = serde_json::json!({
            "name": "pool",
            "sizes": [1, 2, 3],
            "usage": { "committed": 4096, "ratio": 0.75 },
            "parent": null
        });
        let wire = WireValue::from_json(&json).unwrap();
        assert_eq!(wire.to_json(), json);
    }

    #[test]
    fn map_order_survives_round_trip() {
        let json = serde_json::json!({ "z": 1, "a": 2, "m": 3 });
        let wire = WireValue::from_json(&json).unwrap();
        let keys: Vec<&str> = wire.as_map().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        let v = WireValue::Number(dec("42"));
        assert_eq!(v.to_json(), serde_json::json!(42));
    }
}
