//! Utility functions for the view-state library

use crate::formatter::Value;

/// Longest value description carried in an error
pub const MAX_DESCRIPTION_LENGTH: usize = 100;

/// Convert bytes to hexadecimal string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Convert hexadecimal string to bytes
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(hex)
}

/// Debug text of a value, cut at a character boundary
pub fn describe_value(value: &Value) -> String {
    truncate(format!("{:?}", value), MAX_DESCRIPTION_LENGTH)
}

fn truncate(mut text: String, max: usize) -> String {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str("...");
    text
}
