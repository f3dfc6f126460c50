//! Hash, MAC and key derivation primitives

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Size of a SHA-256 digest and of an HMAC-SHA256 tag
pub const DIGEST_LENGTH: usize = 32;

/// SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA256 over the concatenation of `parts`
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; DIGEST_LENGTH] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// Verify an HMAC-SHA256 tag in constant time
pub fn verify_hmac_sha256(key: &[u8], parts: &[&[u8]], expected: &[u8]) -> bool {
    let computed = hmac_sha256(key, parts);
    computed[..].ct_eq(expected).into()
}

/// Hash-based Key Derivation Function (HKDF) using SHA-256
///
/// `length` is capped at 255 blocks.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8], info: &[u8], length: usize) -> Vec<u8> {
    let prk = hmac_sha256(salt, &[ikm]);

    let blocks = length.div_ceil(DIGEST_LENGTH).min(255);
    let mut output = Vec::with_capacity(blocks * DIGEST_LENGTH);
    let mut previous: Vec<u8> = Vec::new();
    for counter in 1..=blocks {
        let counter = [counter as u8];
        let block = hmac_sha256(&prk, &[previous.as_slice(), info, &counter[..]]);
        output.extend_from_slice(&block);
        previous = block.to_vec();
    }

    output.truncate(length);
    output
}
