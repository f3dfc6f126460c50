//! Purpose-scoped data protectors
//!
//! A [`DataProtectionProvider`] holds the application's master key. Every
//! protector derived from it is bound to a chain of purpose strings: data
//! protected under one chain can only be unprotected under the same chain.
//!
//! Payload layout:
//!
//! ```text
//! magic (4) | IV (16) | AES-256-CBC ciphertext | HMAC-SHA256 (32)
//! ```
//!
//! The tag covers everything before it and is checked before decryption.

use crate::error::{Error, ProtectionError, ProtectionResult, Result};
use crate::protection::protection_aes::{Aes, IV_LENGTH, KEY_LENGTH};
use crate::protection::protection_hash::{self, DIGEST_LENGTH};
use crate::utils::hex_to_bytes;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Header identifying a protected payload
pub const MAGIC_HEADER: [u8; 4] = [0x09, 0xF0, 0xC9, 0xF0];

/// Minimum master key length in bytes
pub const MIN_KEY_LENGTH: usize = 32;

const KEY_DERIVATION_SALT: &[u8] = b"webforms-viewstate/protection/v1";
const ENCRYPTION_LABEL: &[u8] = b"enc";
const VALIDATION_LABEL: &[u8] = b"mac";

/// Overhead of a protected payload over its ciphertext
const FIXED_OVERHEAD: usize = MAGIC_HEADER.len() + IV_LENGTH + DIGEST_LENGTH;

/// Protects and unprotects byte payloads for one purpose chain
pub trait DataProtector: Send + Sync + fmt::Debug {
    /// A protector for this chain extended with `purpose`
    fn create_protector(&self, purpose: &str) -> Arc<dyn DataProtector>;

    /// Encrypt and authenticate
    fn protect(&self, plaintext: &[u8]) -> ProtectionResult<Vec<u8>>;

    /// Verify and decrypt
    ///
    /// Fails with [`ProtectionError::IntegrityCheckFailed`] for tampered,
    /// truncated or foreign payloads, without saying which.
    fn unprotect(&self, payload: &[u8]) -> ProtectionResult<Vec<u8>>;
}

/// Protection settings
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct ProtectionConfig {
    /// Application discriminator mixed into every derived key
    pub application_name: String,
    /// Hex encoded master key, at least 32 bytes
    pub validation_key: String,
}

impl ProtectionConfig {
    /// Create a config
    pub fn new(application_name: impl Into<String>, validation_key: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            validation_key: validation_key.into(),
        }
    }

    /// Parse a config from JSON
    #[cfg(feature = "serde_support")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration {
            message: format!("Invalid protection config: {}", e),
        })
    }
}

impl fmt::Debug for ProtectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionConfig")
            .field("application_name", &self.application_name)
            .field("validation_key", &"<redacted>")
            .finish()
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey(Vec<u8>);

#[derive(Zeroize, ZeroizeOnDrop)]
struct DerivedKeys {
    encryption: [u8; KEY_LENGTH],
    validation: [u8; DIGEST_LENGTH],
}

/// Root of a protector hierarchy for one application
#[derive(Clone)]
pub struct DataProtectionProvider {
    root: PurposeProtector,
}

impl DataProtectionProvider {
    /// Create a provider from configuration
    pub fn new(config: &ProtectionConfig) -> Result<Self> {
        let mut key = hex_to_bytes(config.validation_key.trim()).map_err(|_| {
            Error::Configuration {
                message: "validation_key must be hex encoded".to_string(),
            }
        })?;
        let provider = Self::from_key(&config.application_name, &key);
        key.zeroize();
        provider.map_err(Error::from)
    }

    /// Create a provider from raw key bytes
    pub fn from_key(application_name: &str, key: &[u8]) -> ProtectionResult<Self> {
        if key.len() < MIN_KEY_LENGTH {
            return Err(ProtectionError::InvalidKey {
                reason: format!(
                    "key is {} bytes, at least {} required",
                    key.len(),
                    MIN_KEY_LENGTH
                ),
            });
        }
        let master = Arc::new(MasterKey(key.to_vec()));
        Ok(Self {
            root: PurposeProtector::derive(Arc::from(application_name), master, Vec::new()),
        })
    }

    /// Create a provider with a fresh random key
    pub fn generate(application_name: &str) -> ProtectionResult<Self> {
        let mut key = [0u8; MIN_KEY_LENGTH];
        getrandom::fill(&mut key).map_err(|e| ProtectionError::InvalidKey {
            reason: format!("Key generation failed: {}", e),
        })?;
        let provider = Self::from_key(application_name, &key);
        key.zeroize();
        provider
    }

    /// A protector for a single purpose
    pub fn protector(&self, purpose: &str) -> PurposeProtector {
        self.root.child(purpose)
    }

    /// A protector for a purpose chain
    pub fn protector_for<I, S>(&self, purposes: I) -> PurposeProtector
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut chain = self.root.purposes.clone();
        chain.extend(purposes.into_iter().map(|p| p.as_ref().to_string()));
        PurposeProtector::derive(
            self.root.application_name.clone(),
            self.root.master.clone(),
            chain,
        )
    }
}

impl fmt::Debug for DataProtectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataProtectionProvider")
            .field("application_name", &self.root.application_name)
            .finish_non_exhaustive()
    }
}

impl DataProtector for DataProtectionProvider {
    fn create_protector(&self, purpose: &str) -> Arc<dyn DataProtector> {
        Arc::new(self.protector(purpose))
    }

    fn protect(&self, plaintext: &[u8]) -> ProtectionResult<Vec<u8>> {
        self.root.protect(plaintext)
    }

    fn unprotect(&self, payload: &[u8]) -> ProtectionResult<Vec<u8>> {
        self.root.unprotect(payload)
    }
}

/// Protector bound to one purpose chain
#[derive(Clone)]
pub struct PurposeProtector {
    application_name: Arc<str>,
    master: Arc<MasterKey>,
    purposes: Vec<String>,
    keys: Arc<DerivedKeys>,
}

impl PurposeProtector {
    fn derive(application_name: Arc<str>, master: Arc<MasterKey>, purposes: Vec<String>) -> Self {
        let mut info = Vec::new();
        append_length_prefixed(&mut info, application_name.as_bytes());
        for purpose in &purposes {
            append_length_prefixed(&mut info, purpose.as_bytes());
        }

        let keys = DerivedKeys {
            encryption: derive_key(&master.0, ENCRYPTION_LABEL, &info),
            validation: derive_key(&master.0, VALIDATION_LABEL, &info),
        };
        info.zeroize();

        Self {
            application_name,
            master,
            purposes,
            keys: Arc::new(keys),
        }
    }

    fn child(&self, purpose: &str) -> Self {
        let mut purposes = self.purposes.clone();
        purposes.push(purpose.to_string());
        Self::derive(self.application_name.clone(), self.master.clone(), purposes)
    }

    /// The purpose chain
    pub fn purposes(&self) -> &[String] {
        &self.purposes
    }

    /// Protect with a caller-chosen IV
    ///
    /// Only for reproducible output; reusing an IV under one key leaks
    /// plaintext relationships.
    pub fn protect_with_iv(&self, plaintext: &[u8], iv: &[u8; IV_LENGTH]) -> Vec<u8> {
        let ciphertext = Aes::encrypt_with_iv(plaintext, &self.keys.encryption, iv);

        let mut payload = Vec::with_capacity(FIXED_OVERHEAD + ciphertext.len());
        payload.extend_from_slice(&MAGIC_HEADER);
        payload.extend_from_slice(iv);
        payload.extend_from_slice(&ciphertext);
        let tag = protection_hash::hmac_sha256(&self.keys.validation, &[payload.as_slice()]);
        payload.extend_from_slice(&tag);
        payload
    }

    fn open(&self, payload: &[u8]) -> ProtectionResult<Vec<u8>> {
        if payload.len() < FIXED_OVERHEAD + IV_LENGTH {
            return Err(ProtectionError::IntegrityCheckFailed);
        }
        let (body, tag) = payload.split_at(payload.len() - DIGEST_LENGTH);
        if !protection_hash::verify_hmac_sha256(&self.keys.validation, &[body], tag) {
            return Err(ProtectionError::IntegrityCheckFailed);
        }
        if body[..MAGIC_HEADER.len()] != MAGIC_HEADER {
            return Err(ProtectionError::IntegrityCheckFailed);
        }

        let (iv, ciphertext) = body[MAGIC_HEADER.len()..].split_at(IV_LENGTH);
        let iv: &[u8; IV_LENGTH] = iv
            .try_into()
            .map_err(|_| ProtectionError::IntegrityCheckFailed)?;
        Aes::decrypt(ciphertext, &self.keys.encryption, iv)
    }
}

impl fmt::Debug for PurposeProtector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PurposeProtector")
            .field("application_name", &self.application_name)
            .field("purposes", &self.purposes)
            .finish_non_exhaustive()
    }
}

impl DataProtector for PurposeProtector {
    fn create_protector(&self, purpose: &str) -> Arc<dyn DataProtector> {
        Arc::new(self.child(purpose))
    }

    fn protect(&self, plaintext: &[u8]) -> ProtectionResult<Vec<u8>> {
        Ok(self.protect_with_iv(plaintext, &Aes::random_iv()))
    }

    fn unprotect(&self, payload: &[u8]) -> ProtectionResult<Vec<u8>> {
        self.open(payload).inspect_err(|_| {
            warn!(
                purposes = self.purposes.len(),
                payload_len = payload.len(),
                "Protected payload failed integrity verification"
            );
        })
    }
}

fn append_length_prefixed(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buffer.extend_from_slice(bytes);
}

fn derive_key(master: &[u8], label: &[u8], info: &[u8]) -> [u8; KEY_LENGTH] {
    let mut labelled = Vec::with_capacity(label.len() + info.len());
    labelled.extend_from_slice(label);
    labelled.extend_from_slice(info);
    let mut okm = protection_hash::hkdf_sha256(master, KEY_DERIVATION_SALT, &labelled, KEY_LENGTH);

    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&okm);
    okm.zeroize();
    labelled.zeroize();
    key
}
