//! Bidirectional conversion between dynamic wire values and a
//! statically shaped target model.
//!
//! The forward path ([`convert_to_target`]) turns a [`WireValue`] tree
//! into a [`TargetValue`] graph under a [`TypeDescriptor`], resolving
//! shapes in precedence order: the caller's declared descriptor, then a
//! cached hint for the same qualified key, then inference from the data
//! itself. The reverse path ([`convert_to_wire`]) walks a target graph
//! back out to wire form.
//!
//! All conversion state lives in a [`ConversionContext`]; there are no
//! process-global registries. Numbers ride [`rust_decimal::Decimal`]
//! end to end so that width and overflow checks are exact.

pub mod cache;
pub mod collection;
pub mod descriptor;
pub mod error;
pub mod record;
pub mod reverse;
pub mod scalar;
pub mod table;
pub mod value;

use std::sync::Arc;

use ferrule_wire::WireValue;
use tracing::debug;

pub use cache::{CacheEntry, Quality, TypeCache};
pub use descriptor::{parse_type_name, PrimitiveKind, QualifiedKey, ShapeRegistry, TypeDescriptor};
pub use error::{ConversionError, ErrorKind};
pub use scalar::{DateTimeConfig, EpochUnit, StringifierRegistry};
pub use value::TargetValue;

/// Everything one conversion run needs. Cheap to clone; the cache and
/// registries are shared behind `Arc` so clones observe each other's
/// published types.
#[derive(Clone)]
pub struct ConversionContext {
    /// In forgiving mode, recoverable failures degrade to raw
    /// passthrough at the failing leaf instead of surfacing.
    pub forgiving: bool,
    pub datetime: DateTimeConfig,
    pub cache: Arc<TypeCache>,
    pub shapes: Arc<ShapeRegistry>,
    pub stringifiers: Arc<StringifierRegistry>,
}

impl ConversionContext {
    pub fn new() -> Self {
        ConversionContext {
            forgiving: false,
            datetime: DateTimeConfig::default(),
            cache: Arc::new(TypeCache::new()),
            shapes: Arc::new(ShapeRegistry::new()),
            stringifiers: Arc::new(StringifierRegistry::new()),
        }
    }

    pub fn forgiving(mut self) -> Self {
        self.forgiving = true;
        self
    }
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a wire value to a target value at the given qualified key.
///
/// Shape resolution precedence: a non-`Unknown` `declared` descriptor
/// wins and is published to the cache as declared knowledge; otherwise
/// a cached entry for the key is tried, falling back to inference if
/// the cached shape no longer fits the data; otherwise the shape is
/// inferred from the data alone.
pub fn convert_to_target(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    declared: &TypeDescriptor,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    if !matches!(declared, TypeDescriptor::Unknown) {
        ctx.cache.publish(key, declared.clone(), Quality::Declared);
        return convert_value(ctx, key, declared, wire);
    }
    if let Some(entry) = ctx.cache.lookup(key) {
        match convert_value(ctx, key, &entry.descriptor, wire) {
            Ok(v) => return Ok(v),
            Err(hint_err) => {
                debug!(key = %key, %hint_err, "cached type no longer fits, re-inferring");
                // The hint's error names the shape the caller last knew
                // about; it is the one surfaced if the retry fails too.
                return convert_unknown(ctx, key, wire).map_err(|retry_err| {
                    debug!(key = %key, %retry_err, "re-inference failed, surfacing the hint failure");
                    hint_err
                });
            }
        }
    }
    convert_unknown(ctx, key, wire)
}

/// Dispatch on the resolved descriptor. `declared` is never `Unknown`
/// here except by explicit request for inference.
pub fn convert_value(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    declared: &TypeDescriptor,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    if wire.is_null() && !matches!(declared, TypeDescriptor::Primitive(_)) {
        return Ok(TargetValue::Null);
    }
    match declared {
        TypeDescriptor::Primitive(kind) => scalar::convert_primitive(&ctx.datetime, key, *kind, wire),
        TypeDescriptor::ArrayOf {
            dimension,
            element,
            packed,
        } => collection::convert_list(ctx, key, *dimension, element, *packed, wire),
        TypeDescriptor::Record { name, fields } => record::convert_record(ctx, key, name, fields, wire),
        TypeDescriptor::Table {
            index_fields,
            row_type,
        } => table::convert_table(ctx, key, index_fields, row_type, wire),
        TypeDescriptor::Unknown => convert_unknown(ctx, key, wire),
    }
}

/// Convert with no usable shape information, inferring from the data.
fn convert_unknown(
    ctx: &ConversionContext,
    key: &QualifiedKey,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    match wire {
        WireValue::Null => Ok(TargetValue::Null),
        WireValue::Map(_) => record::convert_inferred(ctx, key, wire),
        _ => {
            let inferred = match record::infer_descriptor(ctx, key, wire) {
                Ok(d) => d,
                Err(kind) => {
                    if kind.recoverable() && ctx.forgiving {
                        debug!(key = %key, "no inferable shape, passing wire value through raw");
                        return Ok(TargetValue::Raw(wire.clone()));
                    }
                    return Err(kind.at(key, &TypeDescriptor::Unknown));
                }
            };
            match convert_value(ctx, key, &inferred, wire) {
                Ok(v) => {
                    ctx.cache.publish(key, inferred, Quality::Inferred);
                    Ok(v)
                }
                Err(err) if err.kind.recoverable() && ctx.forgiving => {
                    debug!(key = %key, %err, "inferred conversion failed, passing through raw");
                    Ok(TargetValue::Raw(wire.clone()))
                }
                Err(err) => Err(err),
            }
        }
    }
}

/// Convert a target value graph back to a wire value.
pub fn convert_to_wire(
    ctx: &ConversionContext,
    value: &TargetValue,
) -> Result<WireValue, ConversionError> {
    reverse::to_wire(ctx, value)
}
