//! Static type descriptors and type-name parsing.
//!
//! Descriptors come from three places: the introspection layer supplies
//! them declared (or as raw type-name strings parsed here), the
//! `ShapeRegistry` holds externally registered record/table shapes, and
//! the record converter infers them from data when nothing is declared.
//! Type-name parsing never errors -- unresolvable names are common for
//! dynamically loaded classes and degrade to [`TypeDescriptor::Unknown`].

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Scalar kinds with a converter in the scalar registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Arbitrary-precision decimal.
    Decimal,
    /// Arbitrary-precision integer.
    BigInt,
    Str,
    /// Date/time instant.
    Instant,
    /// Calendar date without time of day.
    Date,
    /// Reference to an introspectable entity.
    EntityRef,
    Uri,
}

impl PrimitiveKind {
    /// Canonical type name as used on the wire and in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int8 => "int8",
            PrimitiveKind::Int16 => "int16",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Float32 => "float32",
            PrimitiveKind::Float64 => "float64",
            PrimitiveKind::Decimal => "decimal",
            PrimitiveKind::BigInt => "bigint",
            PrimitiveKind::Str => "string",
            PrimitiveKind::Instant => "instant",
            PrimitiveKind::Date => "date",
            PrimitiveKind::EntityRef => "entityref",
            PrimitiveKind::Uri => "uri",
        }
    }

    /// Resolve a type name, accepting common aliases.
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        match name {
            "boolean" | "bool" => Some(PrimitiveKind::Boolean),
            "char" | "character" => Some(PrimitiveKind::Char),
            "int8" | "byte" => Some(PrimitiveKind::Int8),
            "int16" | "short" => Some(PrimitiveKind::Int16),
            "int32" | "int" => Some(PrimitiveKind::Int32),
            "int64" | "long" => Some(PrimitiveKind::Int64),
            "float32" | "float" => Some(PrimitiveKind::Float32),
            "float64" | "double" => Some(PrimitiveKind::Float64),
            "decimal" | "bigdecimal" => Some(PrimitiveKind::Decimal),
            "bigint" | "biginteger" => Some(PrimitiveKind::BigInt),
            "string" => Some(PrimitiveKind::Str),
            "instant" | "datetime" => Some(PrimitiveKind::Instant),
            "date" | "calendar" => Some(PrimitiveKind::Date),
            "entityref" => Some(PrimitiveKind::EntityRef),
            "uri" | "url" => Some(PrimitiveKind::Uri),
            _ => None,
        }
    }

    /// Whether arrays of this kind are dense primitive ("packed") arrays.
    /// Packed elements are non-nullable.
    pub fn is_packable(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Boolean
                | PrimitiveKind::Char
                | PrimitiveKind::Int8
                | PrimitiveKind::Int16
                | PrimitiveKind::Int32
                | PrimitiveKind::Int64
                | PrimitiveKind::Float32
                | PrimitiveKind::Float64
        )
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of the shape a wire value must conform to.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    ArrayOf {
        dimension: u32,
        element: Box<TypeDescriptor>,
        /// Dense primitive array. Affects reverse representation and the
        /// null-element policy only, never forward conversion semantics.
        packed: bool,
    },
    Record {
        name: String,
        /// Field order is significant for reverse conversion.
        fields: IndexMap<String, TypeDescriptor>,
    },
    Table {
        index_fields: Vec<String>,
        /// Row shape; `Unknown` means infer from the first row.
        row_type: Box<TypeDescriptor>,
    },
    /// No declared type; resolution falls back to the cache, then to
    /// inference from the data.
    Unknown,
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(k) => f.write_str(k.name()),
            TypeDescriptor::ArrayOf {
                dimension, element, ..
            } => {
                for _ in 0..*dimension {
                    f.write_str("[")?;
                }
                write!(f, "{}", element)
            }
            TypeDescriptor::Record { name, .. } => write!(f, "record {}", name),
            TypeDescriptor::Table { index_fields, .. } => {
                write!(f, "table({})", index_fields.join(","))
            }
            TypeDescriptor::Unknown => f.write_str("unknown"),
        }
    }
}

/// Parse a type-name string supplied by the introspection layer.
///
/// Grammar: a leading run of `[` characters gives the array dimension;
/// the remainder (optionally terminated by `;`) names the element type.
/// Primitive names map directly; anything else is looked up in the
/// shape registry, else `Unknown`. Never errors.
pub fn parse_type_name(name: &str, shapes: &ShapeRegistry) -> TypeDescriptor {
    let mut rest = name.trim();
    let mut dimension: u32 = 0;
    while let Some(stripped) = rest.strip_prefix('[') {
        dimension += 1;
        rest = stripped;
    }
    let rest = rest.strip_suffix(';').unwrap_or(rest);

    let element = if let Some(kind) = PrimitiveKind::from_name(rest) {
        TypeDescriptor::Primitive(kind)
    } else if let Some(shape) = shapes.lookup(rest) {
        shape
    } else {
        TypeDescriptor::Unknown
    };

    if dimension == 0 {
        return element;
    }
    let packed = matches!(element, TypeDescriptor::Primitive(k) if k.is_packable());
    TypeDescriptor::ArrayOf {
        dimension,
        element: Box::new(element),
        packed,
    }
}

/// Registry of named record/table shapes, populated by the
/// introspection layer before conversion begins. Read-only during
/// conversion.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: RwLock<HashMap<String, TypeDescriptor>>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, shape: TypeDescriptor) {
        self.shapes
            .write()
            .expect("shape registry lock poisoned")
            .insert(name.into(), shape);
    }

    pub fn lookup(&self, name: &str) -> Option<TypeDescriptor> {
        self.shapes
            .read()
            .expect("shape registry lock poisoned")
            .get(name)
            .cloned()
    }
}

/// A dotted path identifying where a value occurs
/// (e.g. `"pool.Usage.committed"`). Used only to scope cache lookups;
/// never affects conversion logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedKey(String);

impl QualifiedKey {
    pub fn new(path: impl Into<String>) -> Self {
        QualifiedKey(path.into())
    }

    /// The empty root key, used as the starting point for reverse
    /// conversion diagnostics.
    pub fn root() -> Self {
        QualifiedKey(String::new())
    }

    /// Derive the key of a nested field or sub-path.
    pub fn child(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            QualifiedKey(segment.to_string())
        } else {
            QualifiedKey(format!("{}.{}", self.0, segment))
        }
    }

    /// The last path segment, used to synthesize names for inferred
    /// record shapes.
    pub fn leaf(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
