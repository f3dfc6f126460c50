//! Error types for the view-state library
//!
//! This module provides a unified error handling system using `thiserror` for
//! the formatter, the protection layer and the page state persister.
//!
//! Decoding failures are deliberately coarse at the top: every structural
//! problem surfaces as [`FormatterError::InvalidSerializedData`], whose
//! message never says what went wrong. The precise [`DecodeError`] is kept
//! as the error `source` for diagnostics only.

use thiserror::Error;

/// The main error type for the view-state library
#[derive(Error, Debug)]
pub enum Error {
    /// Object state formatter errors
    #[error("Formatter error: {0}")]
    Formatter(#[from] FormatterError),

    /// Cryptographic protection errors
    #[error("Protection error: {0}")]
    Protection(#[from] ProtectionError),

    /// Page state could not be restored from the client
    #[error("The state information is invalid for this page and might be corrupted")]
    ViewStateCorrupted {
        /// Underlying failure, kept for diagnostics
        #[source]
        source: Box<Error>,
    },

    /// Invalid input data
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was wrong with the configuration
        message: String,
    },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error reports a structurally invalid serialized stream
    pub fn is_invalid_serialized_data(&self) -> bool {
        match self {
            Error::Formatter(FormatterError::InvalidSerializedData(_)) => true,
            Error::ViewStateCorrupted { source } => source.is_invalid_serialized_data(),
            _ => false,
        }
    }

    /// Whether this error reports a tampered or undecryptable payload
    pub fn is_integrity_failure(&self) -> bool {
        match self {
            Error::Protection(ProtectionError::IntegrityCheckFailed) => true,
            Error::ViewStateCorrupted { source } => source.is_integrity_failure(),
            _ => false,
        }
    }
}

/// Object state formatter errors
#[derive(Error, Debug)]
pub enum FormatterError {
    /// The serialized stream could not be decoded
    #[error("The serialized data is invalid")]
    InvalidSerializedData(#[source] DecodeError),

    /// A specific value could not be encoded
    #[error("Error serializing value '{value}' of type '{type_name}'")]
    Serialization {
        /// Debug text of the offending value, truncated
        value: String,
        /// Type name of the offending value
        type_name: String,
        /// Underlying failure
        #[source]
        source: EncodeError,
    },

    /// Encoding failed outside any specific non-null value
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Failures while writing the token stream
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The output sink failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No converter or binary codec is registered for the type
    #[error("Type '{type_name}' has no string converter and no binary codec")]
    NotSerializable {
        /// Qualified name of the type
        type_name: String,
    },

    /// A converter or codec refused the value
    #[error("Conversion of '{type_name}' failed: {source}")]
    Conversion {
        /// Qualified name of the type
        type_name: String,
        /// Converter failure
        #[source]
        source: ConversionError,
    },

    /// A length does not fit the 32-bit wire representation
    #[error("Length {length} exceeds the maximum encodable length")]
    LengthOverflow {
        /// Offending length
        length: usize,
    },

    /// A character that does not fit one UTF-16 code unit
    #[error("Character {0:?} is outside the basic multilingual plane")]
    CharOutsideBmp(char),

    /// Maps cannot carry a null key
    #[error("Dictionary key is null")]
    NullKey,
}

/// Failures while reading the token stream
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The input source failed or ended early
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The text form was not valid base64
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Format or version marker mismatch
    #[error("Invalid marker: expected {expected:#04x}, got {actual:#04x}")]
    InvalidMarker {
        /// Expected marker byte
        expected: u8,
        /// Marker byte found
        actual: u8,
    },

    /// A byte that is not a known token
    #[error("Unknown token {0}")]
    UnknownToken(u8),

    /// A known token where another kind was required
    #[error("Unexpected token {token} while reading {context}")]
    UnexpectedToken {
        /// Token byte found
        token: u8,
        /// What was being read
        context: &'static str,
    },

    /// A 7-bit encoded integer with too many bytes
    #[error("Bad 7-bit encoded 32-bit integer")]
    Bad7BitInt,

    /// A length or count that is negative
    #[error("Invalid length {0}")]
    InvalidLength(i32),

    /// A length or count above the configured limit
    #[error("Length {length} exceeds the limit of {limit}")]
    LengthLimitExceeded {
        /// Declared length
        length: usize,
        /// Configured limit
        limit: usize,
    },

    /// Collections of one graph declare more slots in total than allowed
    #[error("Decoded collections exceed the budget of {limit} slots")]
    SlotBudgetExceeded {
        /// Configured budget
        limit: usize,
    },

    /// Nesting deeper than the configured limit
    #[error("Nesting depth exceeds the limit of {0}")]
    DepthExceeded(usize),

    /// String bytes were not UTF-8
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    /// Sparse array declares more items than slots
    #[error("Sparse array declares {count} items for length {length}")]
    SparseCountExceedsLength {
        /// Declared non-null item count
        count: usize,
        /// Declared array length
        length: usize,
    },

    /// Sparse array entry index outside the array
    #[error("Sparse array index {index} out of range for length {length}")]
    SparseIndexOutOfRange {
        /// Entry index
        index: i32,
        /// Declared array length
        length: usize,
    },

    /// Reference to a type table slot that was never registered
    #[error("Type reference {0} out of range")]
    TypeIndexOutOfRange(i32),

    /// Reference to an empty or unknown string table slot
    #[error("String reference {0} out of range")]
    StringIndexOutOfRange(u8),

    /// A type name that the registry cannot resolve
    #[error("Could not resolve type '{0}'")]
    UnresolvedType(String),

    /// An array or enum whose type did not resolve
    #[error("Cannot create a value of an unresolved type")]
    MissingType,

    /// An enum token naming a type that is not an enum
    #[error("Type '{0}' is not an enum")]
    NotAnEnum(String),

    /// A converter failed to read its invariant string
    #[error("Conversion of '{type_name}' failed: {source}")]
    Conversion {
        /// Qualified name of the type
        type_name: String,
        /// Converter failure
        #[source]
        source: ConversionError,
    },

    /// The binary fallback could not produce a value
    #[error("Binary fallback failed: {0}")]
    BinaryFallback(String),

    /// A dictionary entry with a null key
    #[error("Dictionary key is null")]
    NullKey,

    /// A dictionary entry whose key is already present
    #[error("Duplicate dictionary key {0}")]
    DuplicateKey(String),

    /// Unit measurement with an unknown unit kind
    #[error("Invalid unit type {0}")]
    InvalidUnitType(i32),

    /// Event validation payload with an unknown version
    #[error("Unsupported event validation version {0}")]
    EventValidationVersion(u8),
}

/// Converter and codec failures
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct ConversionError {
    /// Why the conversion failed
    pub reason: String,
}

impl ConversionError {
    /// Create a conversion error from anything printable
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Protection-specific error types
#[derive(Error, Debug)]
pub enum ProtectionError {
    /// Payload was tampered with, truncated, or protected under another key or purpose
    #[error("The payload failed integrity verification")]
    IntegrityCheckFailed,

    /// Key material is unusable
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// What was wrong with the key
        reason: String,
    },

    /// Encryption could not be performed
    #[error("Encryption failed: {reason}")]
    EncryptionFailed {
        /// Underlying cause
        reason: String,
    },
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for Formatter Results
pub type FormatterResult<T> = std::result::Result<T, FormatterError>;

/// Convenience type alias for encoder Results
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

/// Convenience type alias for decoder Results
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Convenience type alias for Protection Results
pub type ProtectionResult<T> = std::result::Result<T, ProtectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_data_hides_cause() {
        let error = Error::from(FormatterError::InvalidSerializedData(
            DecodeError::UnknownToken(200),
        ));
        assert!(error.is_invalid_serialized_data());
        assert!(!error.is_integrity_failure());
        assert!(!error.to_string().contains("200"));

        let source = std::error::Error::source(&FormatterError::InvalidSerializedData(
            DecodeError::UnknownToken(200),
        ))
        .unwrap();
        assert!(source.to_string().contains("200"));
    }

    #[test]
    fn test_integrity_failure_through_corrupted_state() {
        let error = Error::ViewStateCorrupted {
            source: Box::new(ProtectionError::IntegrityCheckFailed.into()),
        };
        assert!(error.is_integrity_failure());
        assert!(!error.is_invalid_serialized_data());
        assert!(error.to_string().contains("might be corrupted"));
    }

    #[test]
    fn test_serialization_error_display() {
        let error = FormatterError::Serialization {
            value: "Object(Point)".to_string(),
            type_name: "Demo.Point".to_string(),
            source: EncodeError::NotSerializable {
                type_name: "Demo.Point".to_string(),
            },
        };
        assert!(error.to_string().contains("Object(Point)"));
        assert!(error.to_string().contains("Demo.Point"));
    }
}
