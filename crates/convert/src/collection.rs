//! Conversion between wire lists and fixed arrays.

use ferrule_wire::WireValue;

use crate::descriptor::{QualifiedKey, TypeDescriptor};
use crate::error::{ConversionError, ErrorKind};
use crate::value::TargetValue;
use crate::ConversionContext;

/// Convert a wire list against an `ArrayOf` descriptor.
///
/// Elements convert recursively against the element descriptor, one
/// dimension at a time; order and length are preserved (an empty list
/// is a valid zero-length array). A `Null` element is preserved unless
/// the array is packed, in which case it is a hard error. Elements
/// share the parent's qualified key: all elements of one array have one
/// type, so there is no per-index cache entry.
pub fn convert_list(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    dimension: u32,
    element: &TypeDescriptor,
    packed: bool,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    let attempted = TypeDescriptor::ArrayOf {
        dimension,
        element: Box::new(element.clone()),
        packed,
    };
    let items = match wire {
        WireValue::List(items) => items,
        other => {
            return Err(ErrorKind::TypeMismatch {
                expected: attempted.to_string(),
                got: other.type_name().to_string(),
            }
            .at(key, &attempted));
        }
    };

    // Peel one dimension per recursion level.
    let inner = if dimension > 1 {
        TypeDescriptor::ArrayOf {
            dimension: dimension - 1,
            element: Box::new(element.clone()),
            packed,
        }
    } else {
        element.clone()
    };

    let mut converted = Vec::with_capacity(items.len());
    for item in items {
        if item.is_null() {
            if dimension == 1 && packed {
                return Err(ErrorKind::TypeMismatch {
                    expected: element.to_string(),
                    got: "null element in packed array".to_string(),
                }
                .at(key, &attempted));
            }
            converted.push(TargetValue::Null);
            continue;
        }
        converted.push(crate::convert_value(ctx, key, &inner, item)?);
    }
    Ok(TargetValue::Array(converted))
}
