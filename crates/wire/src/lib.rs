//! Dynamic wire value model shared by the Ferrule conversion engine.
//!
//! A [`WireValue`] is anything parseable from / serializable to the wire
//! format. JSON is the reference format: objects map to `Map`, arrays to
//! `List`, and scalars map directly. Values are immutable once built --
//! the conversion engine only ever reads them.

mod json;
mod value;

pub use json::WireError;
pub use value::WireValue;
