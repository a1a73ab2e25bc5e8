//! Conversion of indexed tables: collections of record rows uniquely
//! keyed by one or more index fields.

use std::collections::HashSet;

use ferrule_wire::WireValue;

use crate::descriptor::{QualifiedKey, TypeDescriptor};
use crate::error::{ConversionError, ErrorKind};
use crate::record;
use crate::scalar;
use crate::value::TargetValue;
use crate::ConversionContext;

/// Convert a wire value against a `Table` descriptor.
///
/// Two source forms are accepted: a map with one nesting level per
/// index field (innermost value = row map), or a list of row maps, each
/// row carrying its own index-field values. The row type comes from the
/// declared `row_type`; when it is `Unknown` the shape is inferred from
/// the first row and reused for every subsequent row in the same call,
/// keeping the table internally consistent even if individual rows vary.
pub fn convert_table(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    index_fields: &[String],
    row_type: &TypeDescriptor,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    let attempted = TypeDescriptor::Table {
        index_fields: index_fields.to_vec(),
        row_type: Box::new(row_type.clone()),
    };

    if index_fields.is_empty() {
        return Err(
            ErrorKind::MalformedWireValue("table with no index fields".to_string())
                .at(key, &attempted),
        );
    }

    let row_maps = collect_rows(key, &attempted, index_fields.len(), wire)?;

    // Establish the row shape once for the whole call.
    let (row_name, row_fields) = match row_type {
        TypeDescriptor::Record { name, fields } => (name.clone(), fields.clone()),
        TypeDescriptor::Unknown => match row_maps.first() {
            Some(first) => match record::infer_descriptor(ctx, key, first)
                .map_err(|k| k.at(key, &attempted))?
            {
                TypeDescriptor::Record { name, fields } => (name, fields),
                other => {
                    return Err(ErrorKind::TypeMismatch {
                        expected: "record row".to_string(),
                        got: other.to_string(),
                    }
                    .at(key, &attempted));
                }
            },
            None => {
                return Err(ErrorKind::AmbiguousSchema(format!(
                    "empty table for '{}' with no declared row type",
                    key
                ))
                .at(key, &attempted));
            }
        },
        other => {
            return Err(ErrorKind::TypeMismatch {
                expected: "record row type".to_string(),
                got: other.to_string(),
            }
            .at(key, &attempted));
        }
    };

    let mut rows = Vec::with_capacity(row_maps.len());
    let mut seen_index_combos: HashSet<String> = HashSet::with_capacity(row_maps.len());

    for row_wire in row_maps {
        let entries = row_wire.as_map().expect("collect_rows yields maps only");
        for index_field in index_fields {
            let present = entries.get(index_field).map(|v| !v.is_null());
            if present != Some(true) {
                return Err(ErrorKind::TypeMismatch {
                    expected: format!("row with index field '{}'", index_field),
                    got: "row without it".to_string(),
                }
                .at(key, &attempted));
            }
        }

        let converted = record::convert_record(ctx, key, &row_name, &row_fields, row_wire)
            .map_err(|e| {
                // A row that cannot take the established shape is a
                // structural incompatibility; caller-error kinds keep
                // their kind and surface unchanged.
                match e.kind {
                    ErrorKind::TypeMismatch { .. }
                    | ErrorKind::NumericOverflow { .. }
                    | ErrorKind::UnknownField { .. }
                    | ErrorKind::MalformedWireValue(_) => e,
                    other => ErrorKind::TypeMismatch {
                        expected: format!("row matching {}", row_name),
                        got: other.to_string(),
                    }
                    .at(key, &attempted),
                }
            })?;

        let combo = index_combo(ctx, index_fields, &converted)
            .map_err(|k| k.at(key, &attempted))?;
        if !seen_index_combos.insert(combo.clone()) {
            return Err(ErrorKind::MalformedWireValue(format!(
                "duplicate index key ({}) in table",
                combo
            ))
            .at(key, &attempted));
        }
        rows.push(converted);
    }

    Ok(TargetValue::Table {
        index_fields: index_fields.to_vec(),
        rows,
    })
}

/// Flatten either source form into the sequence of row maps.
fn collect_rows<'a>(
    key: &QualifiedKey,
    attempted: &TypeDescriptor,
    depth: usize,
    wire: &'a WireValue,
) -> Result<Vec<&'a WireValue>, ConversionError> {
    match wire {
        WireValue::List(items) => {
            for item in items {
                if item.as_map().is_none() {
                    return Err(ErrorKind::TypeMismatch {
                        expected: "row map".to_string(),
                        got: item.type_name().to_string(),
                    }
                    .at(key, attempted));
                }
            }
            Ok(items.iter().collect())
        }
        WireValue::Map(_) => {
            let mut rows = Vec::new();
            descend(key, attempted, depth, wire, &mut rows)?;
            Ok(rows)
        }
        other => Err(ErrorKind::TypeMismatch {
            expected: attempted.to_string(),
            got: other.type_name().to_string(),
        }
        .at(key, attempted)),
    }
}

/// Walk one map level per index field; the innermost values are rows.
fn descend<'a>(
    key: &QualifiedKey,
    attempted: &TypeDescriptor,
    levels_left: usize,
    wire: &'a WireValue,
    rows: &mut Vec<&'a WireValue>,
) -> Result<(), ConversionError> {
    let entries = match wire.as_map() {
        Some(entries) => entries,
        None => {
            return Err(ErrorKind::TypeMismatch {
                expected: "nested index map".to_string(),
                got: wire.type_name().to_string(),
            }
            .at(key, attempted));
        }
    };
    for value in entries.values() {
        if levels_left == 1 {
            if value.as_map().is_none() {
                return Err(ErrorKind::TypeMismatch {
                    expected: "row map".to_string(),
                    got: value.type_name().to_string(),
                }
                .at(key, attempted));
            }
            rows.push(value);
        } else {
            descend(key, attempted, levels_left - 1, value, rows)?;
        }
    }
    Ok(())
}

/// Canonical string form of a row's index key combination, used for
/// duplicate detection.
fn index_combo(
    ctx: &ConversionContext,
    index_fields: &[String],
    row: &TargetValue,
) -> Result<String, ErrorKind> {
    let fields = row
        .as_record_fields()
        .expect("table rows are records by construction");
    let mut parts = Vec::with_capacity(index_fields.len());
    for index_field in index_fields {
        let value = fields.get(index_field).unwrap_or(&TargetValue::Null);
        parts.push(scalar::stringify(&ctx.stringifiers, value)?);
    }
    Ok(parts.join("\u{1f}"))
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
