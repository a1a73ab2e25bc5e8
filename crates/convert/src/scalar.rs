//! Leaf-level bidirectional converters for primitive kinds.
//!
//! Numeric policy: integer kinds accept a wire number iff it is
//! integral and lies within the signed width's range -- out-of-range
//! values raise NumericOverflow, never silent truncation. float32
//! accepts magnitudes up to and including f32::MAX (the bound is
//! inclusive); narrowing from a wider textual value is range-checked.
//! String conversion (used for reverse map keys) is an allow-list, not
//! a universal fallback.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ferrule_wire::WireValue;
use rust_decimal::prelude::*;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::descriptor::{PrimitiveKind, QualifiedKey, TypeDescriptor};
use crate::error::{ConversionError, ErrorKind};
use crate::value::TargetValue;

// ──────────────────────────────────────────────
// Date/time configuration
// ──────────────────────────────────────────────

/// Unit of numeric epoch timestamps on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl EpochUnit {
    fn nanos_per_unit(&self) -> i128 {
        match self {
            EpochUnit::Seconds => 1_000_000_000,
            EpochUnit::Millis => 1_000_000,
            EpochUnit::Micros => 1_000,
            EpochUnit::Nanos => 1,
        }
    }
}

/// Per-call date/time format configuration.
#[derive(Debug, Clone)]
pub struct DateTimeConfig {
    pub epoch_unit: EpochUnit,
    /// Textual pattern in `time` format-description syntax,
    /// e.g. `"[year]-[month]-[day] [hour]:[minute]:[second]"`.
    pub pattern: Option<String>,
}

impl Default for DateTimeConfig {
    fn default() -> Self {
        DateTimeConfig {
            epoch_unit: EpochUnit::Millis,
            pattern: None,
        }
    }
}

// ──────────────────────────────────────────────
// Forward conversion
// ──────────────────────────────────────────────

/// Convert a wire leaf against a primitive kind.
pub fn convert_primitive(
    datetime: &DateTimeConfig,
    key: &QualifiedKey,
    kind: PrimitiveKind,
    wire: &WireValue,
) -> Result<TargetValue, ConversionError> {
    let attempted = TypeDescriptor::Primitive(kind);
    let result = match wire {
        WireValue::Null => Ok(TargetValue::Null),
        WireValue::Bool(b) => {
            if kind == PrimitiveKind::Boolean {
                Ok(TargetValue::Bool(*b))
            } else {
                Err(mismatch(kind, "bool"))
            }
        }
        WireValue::Number(d) => from_direct(datetime, kind, d),
        WireValue::Str(s) => from_string(datetime, kind, s),
        other => Err(mismatch(kind, other.type_name())),
    };
    result.map_err(|k| k.at(key, &attempted))
}

fn mismatch(kind: PrimitiveKind, got: &str) -> ErrorKind {
    ErrorKind::TypeMismatch {
        expected: kind.name().to_string(),
        got: got.to_string(),
    }
}

/// Whether a wire number converts to `kind` without a string round-trip.
pub fn accepts_direct(datetime: &DateTimeConfig, kind: PrimitiveKind, number: &Decimal) -> bool {
    from_direct(datetime, kind, number).is_ok()
}

/// Numeric widening from a wire number, without a string round-trip.
pub fn from_direct(
    datetime: &DateTimeConfig,
    kind: PrimitiveKind,
    number: &Decimal,
) -> Result<TargetValue, ErrorKind> {
    match kind {
        PrimitiveKind::Int8
        | PrimitiveKind::Int16
        | PrimitiveKind::Int32
        | PrimitiveKind::Int64 => int_from_decimal(kind, number),
        PrimitiveKind::Float32 => {
            // Any representable wire decimal is within f32 range; the
            // narrowing check matters on the textual path.
            number
                .to_f32()
                .map(TargetValue::F32)
                .ok_or_else(|| overflow(number.to_string(), kind))
        }
        PrimitiveKind::Float64 => number
            .to_f64()
            .map(TargetValue::F64)
            .ok_or_else(|| overflow(number.to_string(), kind)),
        PrimitiveKind::Decimal => Ok(TargetValue::Decimal(*number)),
        PrimitiveKind::BigInt => {
            if number.fract().is_zero() {
                Ok(TargetValue::BigInt(number.normalize()))
            } else {
                Err(mismatch(kind, &format!("non-integral number {}", number)))
            }
        }
        PrimitiveKind::Instant => instant_from_number(datetime, number).map(TargetValue::Instant),
        PrimitiveKind::Date => {
            instant_from_number(datetime, number).map(|odt| TargetValue::Date(odt.date()))
        }
        _ => Err(mismatch(kind, "number")),
    }
}

fn overflow(value: String, kind: PrimitiveKind) -> ErrorKind {
    ErrorKind::NumericOverflow {
        value,
        target: kind.name().to_string(),
    }
}

fn int_from_decimal(kind: PrimitiveKind, d: &Decimal) -> Result<TargetValue, ErrorKind> {
    if !d.fract().is_zero() {
        return Err(mismatch(kind, &format!("non-integral number {}", d)));
    }
    let out = match kind {
        PrimitiveKind::Int8 => d.to_i8().map(TargetValue::I8),
        PrimitiveKind::Int16 => d.to_i16().map(TargetValue::I16),
        PrimitiveKind::Int32 => d.to_i32().map(TargetValue::I32),
        PrimitiveKind::Int64 => d.to_i64().map(TargetValue::I64),
        _ => unreachable!("int_from_decimal called with non-integer kind"),
    };
    out.ok_or_else(|| overflow(d.to_string(), kind))
}

/// Parse a textual wire value into a primitive kind.
pub fn from_string(
    datetime: &DateTimeConfig,
    kind: PrimitiveKind,
    s: &str,
) -> Result<TargetValue, ErrorKind> {
    match kind {
        PrimitiveKind::Boolean => s
            .parse::<bool>()
            .map(TargetValue::Bool)
            .map_err(|_| mismatch(kind, &quoted(s))),
        PrimitiveKind::Char => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(TargetValue::Char(c)),
                _ => Err(mismatch(kind, &quoted(s))),
            }
        }
        PrimitiveKind::Int8
        | PrimitiveKind::Int16
        | PrimitiveKind::Int32
        | PrimitiveKind::Int64
        | PrimitiveKind::BigInt
        | PrimitiveKind::Decimal => {
            let d = s
                .parse::<Decimal>()
                .map_err(|_| mismatch(kind, &quoted(s)))?;
            from_direct(datetime, kind, &d)
        }
        PrimitiveKind::Float32 => {
            let v = s.parse::<f64>().map_err(|_| mismatch(kind, &quoted(s)))?;
            if v.is_nan() {
                // NaN is not a numeric value; it has no wire form either.
                return Err(mismatch(kind, &quoted(s)));
            }
            if !v.is_finite() || v.abs() > f32::MAX as f64 {
                // f64 parsing saturates literal overflow to infinity.
                return Err(overflow(s.to_string(), kind));
            }
            Ok(TargetValue::F32(v as f32))
        }
        PrimitiveKind::Float64 => {
            let v = s.parse::<f64>().map_err(|_| mismatch(kind, &quoted(s)))?;
            if v.is_nan() {
                return Err(mismatch(kind, &quoted(s)));
            }
            if v.is_infinite() {
                return Err(overflow(s.to_string(), kind));
            }
            Ok(TargetValue::F64(v))
        }
        PrimitiveKind::Str => Ok(TargetValue::Str(s.to_string())),
        PrimitiveKind::Instant => instant_from_string(datetime, s).map(TargetValue::Instant),
        PrimitiveKind::Date => date_from_string(datetime, s).map(TargetValue::Date),
        PrimitiveKind::EntityRef => {
            if s.is_empty() {
                Err(mismatch(kind, "empty string"))
            } else {
                Ok(TargetValue::EntityRef(s.to_string()))
            }
        }
        PrimitiveKind::Uri => {
            if s.is_empty() || s.contains(char::is_whitespace) {
                Err(mismatch(kind, &quoted(s)))
            } else {
                Ok(TargetValue::Uri(s.to_string()))
            }
        }
    }
}

fn quoted(s: &str) -> String {
    format!("string \"{}\"", s)
}

// ──────────────────────────────────────────────
// Date/time tiers
// ──────────────────────────────────────────────

/// Numeric timestamp: configured epoch unit first, millisecond-epoch
/// fallback second. The fallback keeps older wire producers working
/// when the configured unit puts the instant out of range.
fn instant_from_number(datetime: &DateTimeConfig, d: &Decimal) -> Result<OffsetDateTime, ErrorKind> {
    if !d.fract().is_zero() {
        return Err(mismatch(
            PrimitiveKind::Instant,
            &format!("non-integral timestamp {}", d),
        ));
    }
    let n = d
        .to_i128()
        .ok_or_else(|| overflow(d.to_string(), PrimitiveKind::Instant))?;

    let configured = n
        .checked_mul(datetime.epoch_unit.nanos_per_unit())
        .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(nanos).ok());
    if let Some(odt) = configured {
        return Ok(odt);
    }

    n.checked_mul(EpochUnit::Millis.nanos_per_unit())
        .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(nanos).ok())
        .ok_or_else(|| {
            ErrorKind::UnsupportedConversion(format!("timestamp {} is out of range", n))
        })
}

/// Textual instant: configured pattern first, ISO-8601 last. A pattern
/// without an offset component is interpreted as UTC.
fn instant_from_string(datetime: &DateTimeConfig, s: &str) -> Result<OffsetDateTime, ErrorKind> {
    if let Some(pattern) = &datetime.pattern {
        if let Ok(items) = time::format_description::parse(pattern) {
            if let Ok(odt) = OffsetDateTime::parse(s, &items) {
                return Ok(odt);
            }
            if let Ok(pdt) = PrimitiveDateTime::parse(s, &items) {
                return Ok(pdt.assume_utc());
            }
        }
    }
    OffsetDateTime::parse(s, &Iso8601::DEFAULT).map_err(|_| {
        ErrorKind::UnsupportedConversion(format!("'{}' is not a parseable instant", s))
    })
}

fn date_from_string(datetime: &DateTimeConfig, s: &str) -> Result<time::Date, ErrorKind> {
    if let Some(pattern) = &datetime.pattern {
        if let Ok(items) = time::format_description::parse(pattern) {
            if let Ok(date) = time::Date::parse(s, &items) {
                return Ok(date);
            }
        }
    }
    time::Date::parse(s, &Iso8601::DEFAULT)
        .map_err(|_| ErrorKind::UnsupportedConversion(format!("'{}' is not a parseable date", s)))
}

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// Canonical textual form of an instant for the wire.
pub fn format_instant(odt: &OffsetDateTime) -> Result<String, ErrorKind> {
    odt.format(&Rfc3339)
        .map_err(|_| ErrorKind::UnsupportedConversion("instant is not formattable".to_string()))
}

/// Canonical textual form of a calendar date for the wire.
pub fn format_date(date: &time::Date) -> Result<String, ErrorKind> {
    date.format(&DATE_FORMAT)
        .map_err(|_| ErrorKind::UnsupportedConversion("date is not formattable".to_string()))
}

// ──────────────────────────────────────────────
// String-conversion allow-list
// ──────────────────────────────────────────────

/// A registered string accessor for a named record shape.
pub type StringAccessor = Arc<dyn Fn(&TargetValue) -> Option<String> + Send + Sync>;

/// Registry of explicit string accessors, keyed by record shape name.
/// The registered converter is the only sanctioned way to stringify a
/// structured value; there is no identity-based fallback.
#[derive(Default)]
pub struct StringifierRegistry {
    accessors: RwLock<HashMap<String, StringAccessor>>,
}

impl StringifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, shape_name: impl Into<String>, accessor: F)
    where
        F: Fn(&TargetValue) -> Option<String> + Send + Sync + 'static,
    {
        self.accessors
            .write()
            .expect("stringifier registry lock poisoned")
            .insert(shape_name.into(), Arc::new(accessor));
    }

    fn lookup(&self, shape_name: &str) -> Option<StringAccessor> {
        self.accessors
            .read()
            .expect("stringifier registry lock poisoned")
            .get(shape_name)
            .cloned()
    }
}

/// Convert a target value to its faithful string form, per the
/// allow-list policy. Values outside the allow-list fail with
/// `UnsupportedConversion` instead of falling back to a meaningless
/// identity string.
pub fn stringify(registry: &StringifierRegistry, value: &TargetValue) -> Result<String, ErrorKind> {
    match value {
        TargetValue::Bool(b) => Ok(b.to_string()),
        TargetValue::Char(c) => Ok(c.to_string()),
        TargetValue::I8(v) => Ok(v.to_string()),
        TargetValue::I16(v) => Ok(v.to_string()),
        TargetValue::I32(v) => Ok(v.to_string()),
        TargetValue::I64(v) => Ok(v.to_string()),
        TargetValue::F32(v) => Ok(v.to_string()),
        TargetValue::F64(v) => Ok(v.to_string()),
        TargetValue::Decimal(d) => Ok(d.to_string()),
        TargetValue::BigInt(d) => Ok(d.to_string()),
        TargetValue::Str(s) => Ok(s.clone()),
        TargetValue::EntityRef(s) => Ok(s.clone()),
        TargetValue::Uri(s) => Ok(s.clone()),
        TargetValue::Instant(odt) => format_instant(odt),
        TargetValue::Date(date) => format_date(date),
        TargetValue::Record { name, .. } => match registry.lookup(name) {
            Some(accessor) => accessor(value).ok_or_else(|| {
                ErrorKind::UnsupportedConversion(format!(
                    "string accessor for record '{}' produced nothing",
                    name
                ))
            }),
            None => Err(ErrorKind::UnsupportedConversion(format!(
                "no string form registered for record '{}'",
                name
            ))),
        },
        other => Err(ErrorKind::UnsupportedConversion(format!(
            "no faithful string form for {}",
            other.type_name()
        ))),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
