use indexmap::IndexMap;
use rust_decimal::Decimal;

/// A dynamic, self-describing wire value.
///
/// Numbers carry `rust_decimal::Decimal` -- never `f64` -- so that
/// precision decisions are made by the conversion engine, not by the
/// wire parser. Maps preserve insertion order; key order is significant
/// for reverse conversion of records.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Null,
    Bool(bool),
    Number(Decimal),
    Str(String),
    List(Vec<WireValue>),
    Map(IndexMap<String, WireValue>),
}

impl WireValue {
    /// Returns a human-readable shape name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Bool(_) => "bool",
            WireValue::Number(_) => "number",
            WireValue::Str(_) => "string",
            WireValue::List(_) => "list",
            WireValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WireValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            WireValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Decimal> {
        match self {
            WireValue::Number(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[WireValue]> {
        match self {
            WireValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, WireValue>> {
        match self {
            WireValue::Map(entries) => Some(entries),
            _ => None,
        }
    }
}
