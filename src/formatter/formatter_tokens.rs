//! Wire tokens of the object state format
//!
//! Every encoded value starts with one token byte that selects the decoding
//! rule for the bytes that follow. The numeric values are fixed by the legacy
//! format and must not change.

use crate::error::DecodeError;

/// Format marker written as the first byte of every stream
pub const MARKER_FORMAT: u8 = 0xFF;

/// The only supported format version, written as the second byte
pub const MARKER_VERSION_1: u8 = 0x01;

/// Tag byte identifying how the following bytes are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Token {
    /// 16-bit integer, 2 bytes little-endian
    Int16 = 1,
    /// Nonzero 32-bit integer, 7-bit encoded
    Int32 = 2,
    /// Single byte
    Byte = 3,
    /// UTF-8 encoded character
    Char = 4,
    /// Length-prefixed string
    String = 5,
    /// 64-bit binary date/time
    DateTime = 6,
    /// 64-bit float
    Double = 7,
    /// 32-bit float
    Single = 8,
    /// ARGB color as a 32-bit integer
    Color = 9,
    /// Well-known color, 7-bit encoded
    KnownColor = 10,
    /// Int32-backed enum: type reference then 7-bit value
    IntEnum = 11,
    /// The empty color
    EmptyColor = 12,
    /// Two child values
    Pair = 15,
    /// Three child values
    Triplet = 16,
    /// Dense typed array
    Array = 20,
    /// Array of non-null strings
    StringArray = 21,
    /// Growable list
    ArrayList = 22,
    /// Hash map
    Hashtable = 23,
    /// Small-map-optimised dictionary
    HybridDictionary = 24,
    /// A type value
    Type = 25,
    /// Measurement: 64-bit magnitude then 32-bit unit kind
    Unit = 27,
    /// The empty measurement
    EmptyUnit = 28,
    /// Event validation hash store
    EventValidationStore = 29,
    /// String added to the string table
    IndexedStringAdd = 30,
    /// Reference to a string table slot
    IndexedString = 31,
    /// Type reference then converter invariant string
    StringFormatted = 40,
    /// New foreign type, assembly-qualified name follows
    TypeRefAdd = 41,
    /// New local type, full name follows
    TypeRefAddLocal = 42,
    /// Reference to a type table index
    TypeRef = 43,
    /// Opaque length-prefixed binary blob
    BinarySerialized = 50,
    /// Sparse typed array
    SparseArray = 60,
    /// Null
    Null = 100,
    /// Empty string
    EmptyString = 101,
    /// Integer zero
    ZeroInt32 = 102,
    /// Boolean true
    True = 103,
    /// Boolean false
    False = 104,
}

impl Token {
    /// Wire byte for this token
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether this token starts a type reference
    pub fn is_type_reference(self) -> bool {
        matches!(self, Token::TypeRef | Token::TypeRefAdd | Token::TypeRefAddLocal)
    }
}

impl From<Token> for u8 {
    fn from(token: Token) -> u8 {
        token.as_byte()
    }
}

impl TryFrom<u8> for Token {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let token = match byte {
            1 => Token::Int16,
            2 => Token::Int32,
            3 => Token::Byte,
            4 => Token::Char,
            5 => Token::String,
            6 => Token::DateTime,
            7 => Token::Double,
            8 => Token::Single,
            9 => Token::Color,
            10 => Token::KnownColor,
            11 => Token::IntEnum,
            12 => Token::EmptyColor,
            15 => Token::Pair,
            16 => Token::Triplet,
            20 => Token::Array,
            21 => Token::StringArray,
            22 => Token::ArrayList,
            23 => Token::Hashtable,
            24 => Token::HybridDictionary,
            25 => Token::Type,
            27 => Token::Unit,
            28 => Token::EmptyUnit,
            29 => Token::EventValidationStore,
            30 => Token::IndexedStringAdd,
            31 => Token::IndexedString,
            40 => Token::StringFormatted,
            41 => Token::TypeRefAdd,
            42 => Token::TypeRefAddLocal,
            43 => Token::TypeRef,
            50 => Token::BinarySerialized,
            60 => Token::SparseArray,
            100 => Token::Null,
            101 => Token::EmptyString,
            102 => Token::ZeroInt32,
            103 => Token::True,
            104 => Token::False,
            other => return Err(DecodeError::UnknownToken(other)),
        };
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_maps_back() {
        for byte in 0..=u8::MAX {
            if let Ok(token) = Token::try_from(byte) {
                assert_eq!(token.as_byte(), byte);
            }
        }
    }

    #[test]
    fn test_legacy_values() {
        assert_eq!(Token::Pair.as_byte(), 15);
        assert_eq!(Token::SparseArray.as_byte(), 60);
        assert_eq!(Token::TypeRef.as_byte(), 43);
        assert_eq!(Token::Null.as_byte(), 100);
        assert_eq!(Token::False.as_byte(), 104);
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        for byte in [0u8, 13, 14, 26, 44, 99, 105, 0xFF] {
            assert!(matches!(
                Token::try_from(byte),
                Err(DecodeError::UnknownToken(b)) if b == byte
            ));
        }
    }

    #[test]
    fn test_type_reference_tokens() {
        assert!(Token::TypeRef.is_type_reference());
        assert!(Token::TypeRefAddLocal.is_type_reference());
        assert!(!Token::Type.is_type_reference());
    }
}
