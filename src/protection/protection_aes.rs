//! AES-256-CBC encryption with PKCS#7 padding

use crate::error::{ProtectionError, ProtectionResult};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};
use rand::RngCore;

type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// AES key length
pub const KEY_LENGTH: usize = 32;

/// AES block and IV length
pub const IV_LENGTH: usize = 16;

/// AES encryption/decryption utilities
pub struct Aes;

impl Aes {
    /// A fresh random IV
    pub fn random_iv() -> [u8; IV_LENGTH] {
        let mut iv = [0u8; IV_LENGTH];
        rand::rng().fill_bytes(&mut iv);
        iv
    }

    /// Encrypt data with AES-256-CBC using a specific IV
    pub fn encrypt_with_iv(
        data: &[u8],
        key: &[u8; KEY_LENGTH],
        iv: &[u8; IV_LENGTH],
    ) -> Vec<u8> {
        Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(data)
    }

    /// Decrypt AES-256-CBC ciphertext
    pub fn decrypt(
        ciphertext: &[u8],
        key: &[u8; KEY_LENGTH],
        iv: &[u8; IV_LENGTH],
    ) -> ProtectionResult<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % IV_LENGTH != 0 {
            return Err(ProtectionError::IntegrityCheckFailed);
        }
        Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| ProtectionError::IntegrityCheckFailed)
    }
}
