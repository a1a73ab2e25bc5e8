//! Typed conversion failures.
//!
//! Every surfaced error carries the qualified key and the attempted
//! descriptor for diagnosability. Forgiving mode suppresses only the
//! kinds marked recoverable, by substituting raw passthrough at the
//! failing leaf; NumericOverflow, MalformedWireValue, and UnknownField
//! indicate caller error and always surface.

use crate::descriptor::{QualifiedKey, TypeDescriptor};

/// What went wrong, independent of where.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    /// No applicable converter for the requested shape.
    #[error("unsupported conversion: {0}")]
    UnsupportedConversion(String),
    /// Value present but out of the target width's range.
    #[error("numeric overflow: {value} does not fit {target}")]
    NumericOverflow { value: String, target: String },
    /// Declared shape and wire shape are structurally incompatible.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
    /// Extra key in a declared record (strict mode only).
    #[error("unknown field '{field}' for record '{record}'")]
    UnknownField { field: String, record: String },
    /// Cannot infer a shape from null/empty data with no cache hint.
    #[error("ambiguous schema: {0}")]
    AmbiguousSchema(String),
    /// Data the wire format itself disallows.
    #[error("malformed wire value: {0}")]
    MalformedWireValue(String),
}

impl ErrorKind {
    /// Whether forgiving mode may substitute raw passthrough for this
    /// failure at the leaf where it occurred.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::AmbiguousSchema(_) | ErrorKind::UnsupportedConversion(_)
        )
    }

    /// Attach the location and attempted descriptor.
    pub fn at(self, key: &QualifiedKey, attempted: &TypeDescriptor) -> ConversionError {
        ConversionError {
            kind: self,
            key: key.clone(),
            attempted: attempted.clone(),
        }
    }
}

/// A conversion failure located at a qualified key.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} (at '{key}', target {attempted})")]
pub struct ConversionError {
    pub kind: ErrorKind,
    pub key: QualifiedKey,
    pub attempted: TypeDescriptor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PrimitiveKind;

    #[test]
    fn recoverable_kinds() {
        assert!(ErrorKind::AmbiguousSchema("x".to_string()).recoverable());
        assert!(ErrorKind::UnsupportedConversion("x".to_string()).recoverable());
        assert!(!ErrorKind::NumericOverflow {
            value: "128".to_string(),
            target: "int8".to_string()
        }
        .recoverable());
        assert!(!ErrorKind::MalformedWireValue("x".to_string()).recoverable());
        assert!(!ErrorKind::UnknownField {
            field: "bogus".to_string(),
            record: "X".to_string()
        }
        .recoverable());
        assert!(!ErrorKind::TypeMismatch {
            expected: "int32".to_string(),
            got: "list".to_string()
        }
        .recoverable());
    }

    #[test]
    fn display_carries_key_and_descriptor() {
        let err = ErrorKind::NumericOverflow {
            value: "128".to_string(),
            target: "int8".to_string(),
        }
        .at(
            &QualifiedKey::new("pool.Usage.committed"),
            &TypeDescriptor::Primitive(PrimitiveKind::Int8),
        );
        let msg = err.to_string();
        assert!(msg.contains("pool.Usage.committed"), "got: {}", msg);
        assert!(msg.contains("int8"), "got: {}", msg);
    }
}
