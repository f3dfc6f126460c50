//! Protected payload layout and key derivation stability tests

use super::{assert_bytes_equal, vector_bytes};
use webforms_viewstate::protection::{
    protection_hash, DataProtectionProvider, DataProtector, MAGIC_HEADER,
};

const KEY: [u8; 32] = [0x42; 32];
const IV: [u8; 16] = [0x24; 16];

fn provider(application_name: &str) -> DataProtectionProvider {
    DataProtectionProvider::from_key(application_name, &KEY).expect("Failed to create provider")
}

#[test]
pub fn test_payload_layout() {
    let protector = provider("/app").protector("ObjectStateFormatter.Serialize");
    for length in [0usize, 1, 15, 16, 17, 100] {
        let plaintext = vec![0xAB; length];
        let payload = protector.protect_with_iv(&plaintext, &IV);

        let padded = (length / 16 + 1) * 16;
        assert_eq!(payload.len(), 4 + 16 + padded + 32, "plaintext {}", length);
        assert_bytes_equal(&payload[..4], &MAGIC_HEADER, "magic header");
        assert_bytes_equal(&payload[4..20], &IV, "initialization vector");
        assert_eq!(protector.unprotect(&payload).expect("Failed to open"), plaintext);
    }
}

#[test]
pub fn test_magic_header_bytes() {
    assert_bytes_equal(&MAGIC_HEADER, &vector_bytes("09f0c9f0", "magic"), "magic header");
}

#[test]
pub fn test_derivation_is_stable() {
    let first = provider("/app")
        .protector("Purpose.A")
        .protect_with_iv(b"state", &IV);
    let second = provider("/app")
        .protector("Purpose.A")
        .protect_with_iv(b"state", &IV);
    assert_bytes_equal(&first, &second, "same key, name and purpose");

    let chained = provider("/app")
        .protector_for(["Purpose.A"])
        .protect_with_iv(b"state", &IV);
    assert_bytes_equal(&first, &chained, "single element chain");
}

#[test]
pub fn test_derivation_separates_inputs() {
    let base = provider("/app").protector("Purpose.A").protect_with_iv(b"state", &IV);
    let variants = [
        provider("/other").protector("Purpose.A").protect_with_iv(b"state", &IV),
        provider("/app").protector("Purpose.B").protect_with_iv(b"state", &IV),
        provider("/app")
            .protector_for(["Purpose.A", "x"])
            .protect_with_iv(b"state", &IV),
        // length prefixes keep split points apart
        provider("/app")
            .protector_for(["Purpose.", "A"])
            .protect_with_iv(b"state", &IV),
    ];
    for variant in &variants {
        assert_ne!(&base[20..], &variant[20..]);
    }
}

#[test]
pub fn test_tag_covers_header_iv_and_ciphertext() {
    let protector = provider("/app").protector("Purpose.A");
    let payload = protector.protect_with_iv(b"state", &IV);
    let body_length = payload.len() - protection_hash::DIGEST_LENGTH;

    for position in 0..body_length {
        let mut tampered = payload.clone();
        tampered[position] ^= 0x80;
        assert!(protector.unprotect(&tampered).is_err(), "byte {}", position);
    }
}
