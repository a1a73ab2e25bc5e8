//! Typed target values produced by forward conversion.

use ferrule_wire::WireValue;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

/// A converted, statically shaped value graph.
///
/// `Raw` carries a wire value untouched -- it is produced only in
/// forgiving mode, at the leaf where a recoverable failure occurred,
/// and re-emitted verbatim by reverse conversion. `Map` represents
/// target-side map structures whose keys are not strings; it occurs in
/// object graphs handed to reverse conversion, never in forward output.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetValue {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    /// Arbitrary-precision integer (integral Decimal).
    BigInt(Decimal),
    Str(String),
    Instant(OffsetDateTime),
    Date(Date),
    EntityRef(String),
    Uri(String),
    Array(Vec<TargetValue>),
    Record {
        name: String,
        fields: IndexMap<String, TargetValue>,
    },
    Table {
        index_fields: Vec<String>,
        /// Rows are `Record` values.
        rows: Vec<TargetValue>,
    },
    /// Map-like structure with arbitrarily typed keys (reverse only).
    Map(Vec<(TargetValue, TargetValue)>),
    /// Forgiving-mode passthrough of an unconvertible sub-tree.
    Raw(WireValue),
}

impl TargetValue {
    /// Human-readable shape name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            TargetValue::Null => "null",
            TargetValue::Bool(_) => "boolean",
            TargetValue::Char(_) => "char",
            TargetValue::I8(_) => "int8",
            TargetValue::I16(_) => "int16",
            TargetValue::I32(_) => "int32",
            TargetValue::I64(_) => "int64",
            TargetValue::F32(_) => "float32",
            TargetValue::F64(_) => "float64",
            TargetValue::Decimal(_) => "decimal",
            TargetValue::BigInt(_) => "bigint",
            TargetValue::Str(_) => "string",
            TargetValue::Instant(_) => "instant",
            TargetValue::Date(_) => "date",
            TargetValue::EntityRef(_) => "entityref",
            TargetValue::Uri(_) => "uri",
            TargetValue::Array(_) => "array",
            TargetValue::Record { .. } => "record",
            TargetValue::Table { .. } => "table",
            TargetValue::Map(_) => "map",
            TargetValue::Raw(_) => "raw",
        }
    }

    pub fn as_array(&self) -> Option<&[TargetValue]> {
        match self {
            TargetValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record_fields(&self) -> Option<&IndexMap<String, TargetValue>> {
        match self {
            TargetValue::Record { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(TargetValue::I8(1).type_name(), "int8");
        assert_eq!(TargetValue::Str("x".to_string()).type_name(), "string");
        assert_eq!(TargetValue::Array(vec![]).type_name(), "array");
        assert_eq!(TargetValue::Raw(WireValue::Null).type_name(), "raw");
    }

    #[test]
    fn record_accessor() {
        let mut fields = IndexMap::new();
        fields.insert("a".to_string(), TargetValue::I32(1));
        let rec = TargetValue::Record {
            name: "X".to_string(),
            fields,
        };
        assert_eq!(
            rec.as_record_fields().unwrap().get("a"),
            Some(&TargetValue::I32(1))
        );
        assert!(TargetValue::Null.as_record_fields().is_none());
    }
}
