//! The object state formatter
//!
//! Ties the codec to the protection layer: values are encoded, protected
//! under a purpose and base64 encoded on the way out, and go through the
//! inverse steps on the way in.

use crate::error::{DecodeError, Error, FormatterError, Result};
use crate::formatter::formatter_decode::Decoder;
use crate::formatter::formatter_encode::Encoder;
use crate::formatter::formatter_types::TypeRegistry;
use crate::formatter::formatter_value::Value;
use crate::protection::DataProtector;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Purpose used when the caller supplies none
pub const DEFAULT_PURPOSE: &str = "ObjectStateFormatter.Serialize";

/// Default decode nesting limit
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default limit on decoded collection lengths
pub const DEFAULT_MAX_COLLECTION_LENGTH: usize = 1 << 20;

/// Default limit on collection slots declared across one decoded graph
pub const DEFAULT_MAX_TOTAL_SLOTS: usize = 1 << 20;

/// Formatter behaviour settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(default))]
pub struct FormatterConfig {
    /// Fail on values whose type cannot be resolved or converted instead
    /// of substituting null
    pub throw_on_error_deserializing: bool,
    /// Deepest nesting accepted when decoding
    pub max_depth: usize,
    /// Largest collection, array or map accepted when decoding
    pub max_collection_length: usize,
    /// Sum of declared list, map and array lengths accepted in one graph
    pub max_total_slots: usize,
}

impl FormatterConfig {
    /// Config that fails on every unreadable value
    pub fn strict() -> Self {
        Self {
            throw_on_error_deserializing: true,
            ..Self::default()
        }
    }

    /// Parse a config from JSON; missing fields take their defaults
    #[cfg(feature = "serde_support")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration {
            message: format!("Invalid formatter config: {}", e),
        })
    }
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            throw_on_error_deserializing: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_length: DEFAULT_MAX_COLLECTION_LENGTH,
            max_total_slots: DEFAULT_MAX_TOTAL_SLOTS,
        }
    }
}

/// Serializes value graphs to protected text and back
///
/// Holds no per-call state and may be shared between threads.
#[derive(Debug, Clone)]
pub struct ObjectStateFormatter {
    registry: Arc<TypeRegistry>,
    config: FormatterConfig,
    protector: Arc<dyn DataProtector>,
}

impl ObjectStateFormatter {
    /// Create a formatter with the built-in types and default settings
    pub fn new(protector: Arc<dyn DataProtector>) -> Self {
        Self {
            registry: Arc::new(TypeRegistry::new()),
            config: FormatterConfig::default(),
            protector,
        }
    }

    /// Use a custom type registry
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use custom settings
    pub fn with_config(mut self, config: FormatterConfig) -> Self {
        self.config = config;
        self
    }

    /// The type registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The settings
    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    /// Serialize under the default purpose
    pub fn serialize(&self, value: &Value) -> Result<String> {
        self.serialize_with_purpose(value, DEFAULT_PURPOSE)
    }

    /// Serialize, protect under `purpose` and base64 encode
    pub fn serialize_with_purpose(&self, value: &Value, purpose: &str) -> Result<String> {
        self.serialize_with_purposes(value, &[purpose])
    }

    /// Serialize, protect under a purpose chain and base64 encode
    pub fn serialize_with_purposes(&self, value: &Value, purposes: &[&str]) -> Result<String> {
        let raw = self.serialize_raw(value)?;
        let protected = self.protector_for(purposes).protect(&raw)?;
        let text = STANDARD.encode(&protected);
        debug!(
            purposes = purposes.len(),
            raw_len = raw.len(),
            text_len = text.len(),
            "Serialized view state"
        );
        Ok(text)
    }

    /// Deserialize text produced under the default purpose
    pub fn deserialize(&self, text: &str) -> Result<Value> {
        self.deserialize_with_purpose(text, DEFAULT_PURPOSE)
    }

    /// Base64 decode, unprotect under `purpose` and deserialize
    pub fn deserialize_with_purpose(&self, text: &str, purpose: &str) -> Result<Value> {
        self.deserialize_with_purposes(text, &[purpose])
    }

    /// Base64 decode, unprotect under a purpose chain and deserialize
    pub fn deserialize_with_purposes(&self, text: &str, purposes: &[&str]) -> Result<Value> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput {
                message: "serialized state is empty".to_string(),
            });
        }
        let protected = STANDARD
            .decode(text)
            .map_err(|e| FormatterError::InvalidSerializedData(DecodeError::Base64(e)))?;
        let raw = self.protector_for(purposes).unprotect(&protected)?;
        debug!(
            purposes = purposes.len(),
            raw_len = raw.len(),
            "Unprotected view state"
        );
        self.deserialize_raw(&raw)
    }

    fn protector_for(&self, purposes: &[&str]) -> Arc<dyn DataProtector> {
        purposes
            .iter()
            .fold(self.protector.clone(), |protector, purpose| {
                protector.create_protector(purpose)
            })
    }

    /// Encode without protection
    pub fn serialize_raw(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.serialize_to(&mut buffer, value)?;
        Ok(buffer)
    }

    /// Encode without protection into a sink, returning the bytes written
    pub fn serialize_to<W: Write>(&self, sink: W, value: &Value) -> Result<usize> {
        let written = Encoder::new(&self.registry, sink).encode(value)?;
        Ok(written)
    }

    /// Decode unprotected bytes
    pub fn deserialize_raw(&self, bytes: &[u8]) -> Result<Value> {
        self.deserialize_from(bytes)
    }

    /// Decode unprotected bytes from a source
    pub fn deserialize_from<R: Read>(&self, source: R) -> Result<Value> {
        let mut decoder = Decoder::new(&self.registry, &self.config, source);
        let value = decoder
            .decode()
            .map_err(FormatterError::InvalidSerializedData)?;
        debug!(consumed = decoder.position(), "Decoded object state");
        Ok(value)
    }
}
