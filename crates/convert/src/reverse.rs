//! Reverse conversion: target object graphs back to wire values.

use ferrule_wire::WireValue;
use indexmap::IndexMap;
use rust_decimal::prelude::*;

use crate::descriptor::{QualifiedKey, TypeDescriptor};
use crate::error::{ConversionError, ErrorKind};
use crate::scalar;
use crate::value::TargetValue;
use crate::ConversionContext;

/// Convert a target value graph to a wire value.
///
/// Scalars map to the matching wire leaf; temporals take their
/// ISO-8601 text form so reverse output is self-describing regardless
/// of the forward-parse epoch configuration. Records keep declared
/// field order. Map keys that are not strings go through the scalar
/// string-conversion allow-list; a key without a faithful string form
/// fails the whole conversion -- never a meaningless identity string.
pub fn to_wire(ctx: &ConversionContext, value: &TargetValue) -> Result<WireValue, ConversionError> {
    walk(ctx, &QualifiedKey::root(), value)
}

fn walk(
    ctx: &ConversionContext,
    path: &QualifiedKey,
    value: &TargetValue,
) -> Result<WireValue, ConversionError> {
    match value {
        TargetValue::Null => Ok(WireValue::Null),
        TargetValue::Bool(b) => Ok(WireValue::Bool(*b)),
        TargetValue::Char(c) => Ok(WireValue::Str(c.to_string())),
        TargetValue::I8(v) => Ok(WireValue::Number(Decimal::from(*v))),
        TargetValue::I16(v) => Ok(WireValue::Number(Decimal::from(*v))),
        TargetValue::I32(v) => Ok(WireValue::Number(Decimal::from(*v))),
        TargetValue::I64(v) => Ok(WireValue::Number(Decimal::from(*v))),
        TargetValue::F32(v) => float_to_number(path, f64::from(*v), "float32"),
        TargetValue::F64(v) => float_to_number(path, *v, "float64"),
        TargetValue::Decimal(d) => Ok(WireValue::Number(*d)),
        TargetValue::BigInt(d) => Ok(WireValue::Number(*d)),
        TargetValue::Str(s) => Ok(WireValue::Str(s.clone())),
        TargetValue::Instant(odt) => scalar::format_instant(odt)
            .map(WireValue::Str)
            .map_err(|k| k.at(path, &TypeDescriptor::Unknown)),
        TargetValue::Date(date) => scalar::format_date(date)
            .map(WireValue::Str)
            .map_err(|k| k.at(path, &TypeDescriptor::Unknown)),
        TargetValue::EntityRef(s) | TargetValue::Uri(s) => Ok(WireValue::Str(s.clone())),
        TargetValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(walk(ctx, path, item)?);
            }
            Ok(WireValue::List(out))
        }
        TargetValue::Record { fields, .. } => {
            let mut out = IndexMap::with_capacity(fields.len());
            for (field_name, field_value) in fields {
                out.insert(
                    field_name.clone(),
                    walk(ctx, &path.child(field_name), field_value)?,
                );
            }
            Ok(WireValue::Map(out))
        }
        TargetValue::Table { rows, .. } => {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                out.push(walk(ctx, path, row)?);
            }
            Ok(WireValue::List(out))
        }
        TargetValue::Map(entries) => {
            let mut out = IndexMap::with_capacity(entries.len());
            for (map_key, map_value) in entries {
                let key_str = match map_key {
                    TargetValue::Str(s) => s.clone(),
                    other => scalar::stringify(&ctx.stringifiers, other).map_err(|_| {
                        ErrorKind::MalformedWireValue(format!(
                            "map key of type {} has no faithful string form",
                            other.type_name()
                        ))
                        .at(path, &TypeDescriptor::Unknown)
                    })?,
                };
                out.insert(key_str.clone(), walk(ctx, &path.child(&key_str), map_value)?);
            }
            Ok(WireValue::Map(out))
        }
        TargetValue::Raw(wire) => Ok(wire.clone()),
    }
}

fn float_to_number(
    path: &QualifiedKey,
    v: f64,
    kind: &str,
) -> Result<WireValue, ConversionError> {
    Decimal::from_f64(v)
        .map(WireValue::Number)
        .ok_or_else(|| {
            ErrorKind::UnsupportedConversion(format!("non-finite {} has no wire form", kind))
                .at(path, &TypeDescriptor::Unknown)
        })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use time::macros::datetime;

    fn ctx() -> ConversionContext {
        ConversionContext::new()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn scalars_map_to_matching_leaves() {
        let c = ctx();
        assert_eq!(to_wire(&c, &TargetValue::Null).unwrap(), WireValue::Null);
        assert_eq!(
            to_wire(&c, &TargetValue::Bool(true)).unwrap(),
            WireValue::Bool(true)
        );
        assert_eq!(
            to_wire(&c, &TargetValue::I8(-5)).unwrap(),
            WireValue::Number(dec("-5"))
        );
        assert_eq!(
            to_wire(&c, &TargetValue::Decimal(dec("1.25"))).unwrap(),
            WireValue::Number(dec("1.25"))
        );
        assert_eq!(
            to_wire(&c, &TargetValue::Char('x')).unwrap(),
            WireValue::Str("x".to_string())
        );
        assert_eq!(
            to_wire(&c, &TargetValue::EntityRef("pool:name=x".to_string())).unwrap(),
            WireValue::Str("pool:name=x".to_string())
        );
    }

    #[test]
    fn instants_take_iso_text_form() {
        let v = TargetValue::Instant(datetime!(2024-01-02 03:04:05 UTC));
        assert_eq!(
            to_wire(&ctx(), &v).unwrap(),
            WireValue::Str("2024-01-02T03:04:05Z".to_string())
        );
    }

    #[test]
    fn records_keep_field_order() {
        let mut fields = IndexMap::new();
        fields.insert("z".to_string(), TargetValue::I32(1));
        fields.insert("a".to_string(), TargetValue::I32(2));
        let rec = TargetValue::Record {
            name: "X".to_string(),
            fields,
        };
        let wire = to_wire(&ctx(), &rec).unwrap();
        let keys: Vec<&str> = wire.as_map().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn tables_become_row_lists() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), TargetValue::Str("a".to_string()));
        let table = TargetValue::Table {
            index_fields: vec!["name".to_string()],
            rows: vec![TargetValue::Record {
                name: "Row".to_string(),
                fields,
            }],
        };
        let wire = to_wire(&ctx(), &table).unwrap();
        let rows = wire.as_list().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].as_map().unwrap()["name"],
            WireValue::Str("a".to_string())
        );
    }

    #[test]
    fn map_keys_stringify_through_the_allow_list() {
        let entries = vec![
            (TargetValue::I32(1), TargetValue::Str("one".to_string())),
            (TargetValue::Bool(true), TargetValue::Str("yes".to_string())),
        ];
        let wire = to_wire(&ctx(), &TargetValue::Map(entries)).unwrap();
        let map = wire.as_map().unwrap();
        assert_eq!(map["1"], WireValue::Str("one".to_string()));
        assert_eq!(map["true"], WireValue::Str("yes".to_string()));
    }

    #[test]
    fn unstringifiable_map_key_fails_the_whole_conversion() {
        let entries = vec![(
            TargetValue::Array(vec![]),
            TargetValue::Str("v".to_string()),
        )];
        let res = to_wire(&ctx(), &TargetValue::Map(entries));
        assert!(matches!(
            res.unwrap_err().kind,
            ErrorKind::MalformedWireValue(_)
        ));
    }

    #[test]
    fn registered_accessor_unlocks_record_map_keys() {
        let c = ctx();
        c.stringifiers.register("Point", |v: &TargetValue| {
            let fields = v.as_record_fields()?;
            match (fields.get("x")?, fields.get("y")?) {
                (TargetValue::I32(x), TargetValue::I32(y)) => Some(format!("{},{}", x, y)),
                _ => None,
            }
        });
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), TargetValue::I32(3));
        fields.insert("y".to_string(), TargetValue::I32(4));
        let point = TargetValue::Record {
            name: "Point".to_string(),
            fields,
        };
        let entries = vec![(point, TargetValue::Str("corner".to_string()))];
        let wire = to_wire(&c, &TargetValue::Map(entries)).unwrap();
        assert_eq!(
            wire.as_map().unwrap()["3,4"],
            WireValue::Str("corner".to_string())
        );
    }

    #[test]
    fn raw_passthrough_re_emits_the_captured_wire_value() {
        let captured = WireValue::List(vec![WireValue::Null, WireValue::Bool(true)]);
        assert_eq!(
            to_wire(&ctx(), &TargetValue::Raw(captured.clone())).unwrap(),
            captured
        );
    }

    #[test]
    fn non_finite_floats_have_no_wire_form() {
        let res = to_wire(&ctx(), &TargetValue::F64(f64::NAN));
        assert!(matches!(
            res.unwrap_err().kind,
            ErrorKind::UnsupportedConversion(_)
        ));
    }

    #[test]
    fn arrays_preserve_order() {
        let arr = TargetValue::Array(vec![
            TargetValue::I32(3),
            TargetValue::I32(1),
            TargetValue::I32(2),
        ]);
        let wire = to_wire(&ctx(), &arr).unwrap();
        assert_eq!(
            wire,
            WireValue::List(vec![
                WireValue::Number(dec("3")),
                WireValue::Number(dec("1")),
                WireValue::Number(dec("2")),
            ])
        );
    }
}
