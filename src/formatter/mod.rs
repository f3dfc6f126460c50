//! Object state formatter
//!
//! This module provides the token-tagged binary codec used to persist page
//! state, together with its value model, type registry and the protected
//! text form built on top of it.

pub mod event_validation;
#[allow(clippy::module_inception)]
pub mod formatter;
mod formatter_decode;
mod formatter_encode;
pub mod formatter_reader;
pub mod formatter_tables;
pub mod formatter_tokens;
pub mod formatter_types;
pub mod formatter_value;
pub mod formatter_writer;

// Re-export main types for convenience
pub use event_validation::EventValidationStore;
pub use formatter::{
    FormatterConfig, ObjectStateFormatter, DEFAULT_MAX_COLLECTION_LENGTH, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_TOTAL_SLOTS, DEFAULT_PURPOSE,
};
pub use formatter_tokens::Token;
pub use formatter_types::{
    BinaryCodec, BincodeCodec, ParsedConverter, StateType, TypeConverter, TypeRegistry,
};
pub use formatter_value::{
    Color, DateTimeKind, EnumRepr, EnumValue, KnownColor, ObjectRef, StateDateTime, StateMap,
    StateObject, StateTyped, TypedArray, Unit, UnitType, Value,
};

pub use crate::error::{DecodeError, EncodeError, FormatterError, FormatterResult};
