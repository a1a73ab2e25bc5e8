//! Conversion between wire maps and named-field records, including
//! schema inference when no shape is declared.

use ferrule_wire::WireValue;
use indexmap::IndexMap;
use rust_decimal::prelude::*;
use tracing::trace;

use crate::cache::Quality;
use crate::descriptor::{PrimitiveKind, QualifiedKey, TypeDescriptor};
use crate::error::{ConversionError, ErrorKind};
use crate::value::TargetValue;
use crate::ConversionContext;

/// The neutral value substituted for a declared field absent from the
/// wire map. Structured inputs are frequently partial; missing fields
/// are not an error.
pub fn neutral_default(descriptor: &TypeDescriptor) -> TargetValue {
    match descriptor {
        TypeDescriptor::Primitive(kind) => match kind {
            PrimitiveKind::Boolean => TargetValue::Bool(false),
            PrimitiveKind::Char => TargetValue::Char('\0'),
            PrimitiveKind::Int8 => TargetValue::I8(0),
            PrimitiveKind::Int16 => TargetValue::I16(0),
            PrimitiveKind::Int32 => TargetValue::I32(0),
            PrimitiveKind::Int64 => TargetValue::I64(0),
            PrimitiveKind::Float32 => TargetValue::F32(0.0),
            PrimitiveKind::Float64 => TargetValue::F64(0.0),
            PrimitiveKind::Decimal => TargetValue::Decimal(Decimal::ZERO),
            PrimitiveKind::BigInt => TargetValue::BigInt(Decimal::ZERO),
            PrimitiveKind::Str => TargetValue::Str(String::new()),
            _ => TargetValue::Null,
        },
        _ => TargetValue::Null,
    }
}

/// Declared-schema mode: every wire key must name a declared field.
pub fn convert_record(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    name: &str,
    fields: &IndexMap<String, TypeDescriptor>,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    let attempted = TypeDescriptor::Record {
        name: name.to_string(),
        fields: fields.clone(),
    };
    let map = match wire {
        WireValue::Map(entries) => entries,
        other => {
            return Err(ErrorKind::TypeMismatch {
                expected: attempted.to_string(),
                got: other.type_name().to_string(),
            }
            .at(key, &attempted));
        }
    };

    // Unknown keys: rejected strict, ignored forgiving.
    if !ctx.forgiving {
        for wire_key in map.keys() {
            if !fields.contains_key(wire_key) {
                return Err(ErrorKind::UnknownField {
                    field: wire_key.clone(),
                    record: name.to_string(),
                }
                .at(key, &attempted));
            }
        }
    }

    let mut converted = IndexMap::with_capacity(fields.len());
    for (field_name, field_desc) in fields {
        let value = match map.get(field_name) {
            Some(v) => crate::convert_value(ctx, &key.child(field_name), field_desc, v)?,
            None => neutral_default(field_desc),
        };
        converted.insert(field_name.clone(), value);
    }
    Ok(TargetValue::Record {
        name: name.to_string(),
        fields: converted,
    })
}

/// Infer a descriptor from observed data. Null and empty-list leaves
/// fall back to a cached type for the same key; with no hit they are
/// unresolvable.
pub fn infer_descriptor(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    wire: &WireValue,
) -> Result<TypeDescriptor, ErrorKind> {
    match wire {
        WireValue::Bool(_) => Ok(TypeDescriptor::Primitive(PrimitiveKind::Boolean)),
        WireValue::Number(d) => Ok(TypeDescriptor::Primitive(infer_number_kind(d))),
        WireValue::Str(_) => Ok(TypeDescriptor::Primitive(PrimitiveKind::Str)),
        WireValue::Null => match ctx.cache.lookup(key) {
            Some(entry) => Ok((*entry.descriptor).clone()),
            None => Err(ErrorKind::AmbiguousSchema(format!(
                "null value with no cached type for '{}'",
                key
            ))),
        },
        WireValue::List(items) => match items.first() {
            Some(first) => {
                let element = infer_descriptor(ctx, key, first)?;
                Ok(lift_array(element))
            }
            None => match ctx.cache.lookup(key) {
                Some(entry) => Ok((*entry.descriptor).clone()),
                None => Err(ErrorKind::AmbiguousSchema(format!(
                    "empty list with no cached type for '{}'",
                    key
                ))),
            },
        },
        WireValue::Map(entries) => {
            if entries.is_empty() {
                return Err(ErrorKind::AmbiguousSchema(format!(
                    "empty map for '{}' carries no inferable shape",
                    key
                )));
            }
            let mut fields = IndexMap::with_capacity(entries.len());
            for (field_name, value) in entries {
                let child = key.child(field_name);
                fields.insert(field_name.clone(), infer_descriptor(ctx, &child, value)?);
            }
            Ok(TypeDescriptor::Record {
                name: synthesized_name(key),
                fields,
            })
        }
    }
}

fn infer_number_kind(d: &Decimal) -> PrimitiveKind {
    if !d.fract().is_zero() {
        return PrimitiveKind::Float64;
    }
    if d.to_i32().is_some() {
        PrimitiveKind::Int32
    } else if d.to_i64().is_some() {
        PrimitiveKind::Int64
    } else {
        PrimitiveKind::BigInt
    }
}

/// Wrap an element descriptor in one more array dimension.
fn lift_array(element: TypeDescriptor) -> TypeDescriptor {
    match element {
        TypeDescriptor::ArrayOf {
            dimension,
            element,
            packed,
        } => TypeDescriptor::ArrayOf {
            dimension: dimension + 1,
            element,
            packed,
        },
        other => {
            let packed = matches!(&other, TypeDescriptor::Primitive(k) if k.is_packable());
            TypeDescriptor::ArrayOf {
                dimension: 1,
                element: Box::new(other),
                packed,
            }
        }
    }
}

fn synthesized_name(key: &QualifiedKey) -> String {
    let leaf = key.leaf();
    if leaf.is_empty() {
        "inferred".to_string()
    } else {
        leaf.to_string()
    }
}

/// Inference mode: convert a wire map with no declared shape. The
/// descriptor is built from the data itself; a successful non-vacuous
/// inference is published to the cache.
pub fn convert_inferred(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    let map = match wire {
        WireValue::Map(entries) => entries,
        other => {
            return Err(ErrorKind::TypeMismatch {
                expected: "map".to_string(),
                got: other.type_name().to_string(),
            }
            .at(key, &TypeDescriptor::Unknown));
        }
    };

    // A zero-field record carries no information to act on downstream;
    // this fails independently of forgiving mode.
    if map.is_empty() {
        return Err(ErrorKind::AmbiguousSchema(format!(
            "empty map for '{}' carries no inferable shape",
            key
        ))
        .at(key, &TypeDescriptor::Unknown));
    }

    let mut converted = IndexMap::with_capacity(map.len());
    let mut inferred_fields: IndexMap<String, TypeDescriptor> = IndexMap::new();

    for (field_name, value) in map {
        let child = key.child(field_name);
        match infer_descriptor(ctx, &child, value) {
            Ok(field_desc) => {
                let field_value = crate::convert_value(ctx, &child, &field_desc, value);
                match field_value {
                    Ok(v) => {
                        converted.insert(field_name.clone(), v);
                        inferred_fields.insert(field_name.clone(), field_desc);
                    }
                    Err(e) if ctx.forgiving && e.kind.recoverable() => {
                        trace!(key = %child, "leaving unconvertible leaf raw");
                        converted.insert(field_name.clone(), TargetValue::Raw(value.clone()));
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(kind) if ctx.forgiving && kind.recoverable() => {
                trace!(key = %child, %kind, "leaving uninferable leaf raw");
                converted.insert(field_name.clone(), TargetValue::Raw(value.clone()));
            }
            Err(kind) => return Err(kind.at(&child, &TypeDescriptor::Unknown)),
        }
    }

    let name = synthesized_name(key);
    if !inferred_fields.is_empty() {
        // Non-vacuous sample: worth remembering for later calls.
        ctx.cache.publish(
            key,
            TypeDescriptor::Record {
                name: name.clone(),
                fields: inferred_fields,
            },
            Quality::Inferred,
        );
    }
    Ok(TargetValue::Record {
        name,
        fields: converted,
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn ctx() -> ConversionContext {
        ConversionContext::new()
    }

    fn forgiving_ctx() -> ConversionContext {
        ConversionContext {
            forgiving: true,
            ..ConversionContext::new()
        }
    }

    fn key() -> QualifiedKey {
        QualifiedKey::new("entity.Attr")
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn wire_map(entries: Vec<(&str, WireValue)>) -> WireValue {
        WireValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn sample_record_desc() -> (String, IndexMap<String, TypeDescriptor>) {
        let mut fields = IndexMap::new();
        fields.insert(
            "stringField".to_string(),
            TypeDescriptor::Primitive(PrimitiveKind::Str),
        );
        fields.insert(
            "intField".to_string(),
            TypeDescriptor::Primitive(PrimitiveKind::Int32),
        );
        ("X".to_string(), fields)
    }

    #[test]
    fn missing_fields_get_neutral_defaults() {
        let (name, fields) = sample_record_desc();
        let wire = wire_map(vec![("stringField", WireValue::Str("aString".to_string()))]);
        let v = convert_record(&ctx(), &key(), &name, &fields, &wire).unwrap();
        let out = v.as_record_fields().unwrap();
        assert_eq!(out["stringField"], TargetValue::Str("aString".to_string()));
        assert_eq!(out["intField"], TargetValue::I32(0));
    }

    #[test]
    fn unknown_field_rejected_in_strict_mode() {
        let (name, fields) = sample_record_desc();
        let wire = wire_map(vec![
            ("stringField", WireValue::Str("x".to_string())),
            ("bogus", WireValue::Str("y".to_string())),
        ]);
        let res = convert_record(&ctx(), &key(), &name, &fields, &wire);
        match res.unwrap_err().kind {
            ErrorKind::UnknownField { field, record } => {
                assert_eq!(field, "bogus");
                assert_eq!(record, "X");
            }
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn unknown_field_ignored_in_forgiving_mode() {
        let (name, fields) = sample_record_desc();
        let wire = wire_map(vec![
            ("stringField", WireValue::Str("x".to_string())),
            ("bogus", WireValue::Str("y".to_string())),
        ]);
        let v = convert_record(&forgiving_ctx(), &key(), &name, &fields, &wire).unwrap();
        let out = v.as_record_fields().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["stringField"], TargetValue::Str("x".to_string()));
        assert_eq!(out["intField"], TargetValue::I32(0));
        assert!(!out.contains_key("bogus"));
    }

    #[test]
    fn non_map_wire_value_is_a_mismatch() {
        let (name, fields) = sample_record_desc();
        let res = convert_record(&ctx(), &key(), &name, &fields, &WireValue::List(vec![]));
        assert!(matches!(
            res.unwrap_err().kind,
            ErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn inference_builds_descriptor_from_data() {
        let c = ctx();
        let wire = wire_map(vec![
            ("a", WireValue::Str("x".to_string())),
            ("n", WireValue::Number(dec("1"))),
            ("big", WireValue::Number(dec("5000000000"))),
            ("ratio", WireValue::Number(dec("0.5"))),
            ("flag", WireValue::Bool(true)),
        ]);
        let v = convert_inferred(&c, &key(), &wire).unwrap();
        let out = v.as_record_fields().unwrap();
        assert_eq!(out["a"], TargetValue::Str("x".to_string()));
        assert_eq!(out["n"], TargetValue::I32(1));
        assert_eq!(out["big"], TargetValue::I64(5_000_000_000));
        assert_eq!(out["ratio"], TargetValue::F64(0.5));
        assert_eq!(out["flag"], TargetValue::Bool(true));
    }

    #[test]
    fn inference_recurses_into_nested_maps_and_lists() {
        let c = ctx();
        let wire = wire_map(vec![
            (
                "usage",
                wire_map(vec![("committed", WireValue::Number(dec("4096")))]),
            ),
            (
                "sizes",
                WireValue::List(vec![
                    WireValue::Number(dec("1")),
                    WireValue::Number(dec("2")),
                ]),
            ),
        ]);
        let v = convert_inferred(&c, &key(), &wire).unwrap();
        let out = v.as_record_fields().unwrap();
        assert_eq!(
            out["usage"].as_record_fields().unwrap()["committed"],
            TargetValue::I32(4096)
        );
        assert_eq!(
            out["sizes"],
            TargetValue::Array(vec![TargetValue::I32(1), TargetValue::I32(2)])
        );
    }

    #[test]
    fn empty_map_is_ambiguous_in_both_modes() {
        for c in [ctx(), forgiving_ctx()] {
            let res = convert_inferred(&c, &key(), &wire_map(vec![]));
            assert!(matches!(
                res.unwrap_err().kind,
                ErrorKind::AmbiguousSchema(_)
            ));
        }
    }

    #[test]
    fn null_leaf_without_hint_fails_strict_passes_raw_forgiving() {
        let wire = wire_map(vec![
            ("a", WireValue::Str("x".to_string())),
            ("mystery", WireValue::Null),
        ]);
        let strict = convert_inferred(&ctx(), &key(), &wire);
        assert!(matches!(
            strict.unwrap_err().kind,
            ErrorKind::AmbiguousSchema(_)
        ));

        let v = convert_inferred(&forgiving_ctx(), &key(), &wire).unwrap();
        let out = v.as_record_fields().unwrap();
        assert_eq!(out["mystery"], TargetValue::Raw(WireValue::Null));
    }

    #[test]
    fn null_leaf_resolves_through_cache_hint() {
        let c = ctx();
        c.cache.publish(
            &key().child("mystery"),
            TypeDescriptor::Primitive(PrimitiveKind::Str),
            Quality::Inferred,
        );
        let wire = wire_map(vec![("mystery", WireValue::Null)]);
        let v = convert_inferred(&c, &key(), &wire).unwrap();
        assert_eq!(
            v.as_record_fields().unwrap()["mystery"],
            TargetValue::Null
        );
    }

    #[test]
    fn successful_inference_is_published_to_the_cache() {
        let c = ctx();
        let wire = wire_map(vec![("a", WireValue::Str("x".to_string()))]);
        convert_inferred(&c, &key(), &wire).unwrap();
        let entry = c.cache.lookup(&key()).expect("inference should be cached");
        assert_eq!(entry.quality, Quality::Inferred);
        match &*entry.descriptor {
            TypeDescriptor::Record { fields, .. } => {
                assert_eq!(
                    fields["a"],
                    TypeDescriptor::Primitive(PrimitiveKind::Str)
                );
            }
            other => panic!("expected Record, got {:?}", other),
        }
    }

    #[test]
    fn number_inference_widths() {
        assert_eq!(infer_number_kind(&dec("1")), PrimitiveKind::Int32);
        assert_eq!(infer_number_kind(&dec("2147483648")), PrimitiveKind::Int64);
        assert_eq!(
            infer_number_kind(&dec("9223372036854775808")),
            PrimitiveKind::BigInt
        );
        assert_eq!(infer_number_kind(&dec("0.5")), PrimitiveKind::Float64);
    }

    #[test]
    fn neutral_defaults_per_kind() {
        assert_eq!(
            neutral_default(&TypeDescriptor::Primitive(PrimitiveKind::Int64)),
            TargetValue::I64(0)
        );
        assert_eq!(
            neutral_default(&TypeDescriptor::Primitive(PrimitiveKind::Boolean)),
            TargetValue::Bool(false)
        );
        assert_eq!(
            neutral_default(&TypeDescriptor::Primitive(PrimitiveKind::Str)),
            TargetValue::Str(String::new())
        );
        assert_eq!(
            neutral_default(&TypeDescriptor::Primitive(PrimitiveKind::Instant)),
            TargetValue::Null
        );
        assert_eq!(neutral_default(&TypeDescriptor::Unknown), TargetValue::Null);
    }
}
