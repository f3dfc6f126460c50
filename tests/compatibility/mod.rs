//! Wire compatibility tests
//!
//! This module pins the exact bytes produced for known values so that state
//! written by other implementations of the format keeps decoding, and state
//! written here keeps decoding elsewhere.

pub mod formatter_compatibility;
pub mod protection_compatibility;

/// Compare two byte arrays with detailed error reporting
pub fn assert_bytes_equal(actual: &[u8], expected: &[u8], context: &str) {
    if actual != expected {
        panic!(
            "Byte arrays differ in {}\nExpected: {}\nActual:   {}\nExpected (hex): {}\nActual (hex):   {}",
            context,
            expected.len(),
            actual.len(),
            hex::encode(expected),
            hex::encode(actual)
        );
    }
}

/// Decode a hex vector, panicking with the vector name on bad input
pub fn vector_bytes(hex_text: &str, context: &str) -> Vec<u8> {
    let compact: String = hex_text.split_whitespace().collect();
    hex::decode(compact).unwrap_or_else(|e| panic!("bad hex in vector {}: {}", context, e))
}
