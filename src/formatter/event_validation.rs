//! Event validation hash store
//!
//! Records which (target, argument) postback combinations a page rendered so
//! that a later postback can be checked against them. Only truncated hashes
//! are kept, never the values themselves.

use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::formatter::formatter_reader::StateReader;
use crate::formatter::formatter_writer::StateWriter;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Length of one stored hash
pub const HASH_LENGTH: usize = 16;

/// Only supported payload version
pub const STORE_VERSION: u8 = 0;

/// Set of hashed postback target/argument pairs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EventValidationStore {
    hashes: BTreeSet<[u8; HASH_LENGTH]>,
}

impl EventValidationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of a target/argument pair
    pub fn hash(target: &str, argument: Option<&str>) -> [u8; HASH_LENGTH] {
        let mut hasher = Sha256::new();
        hasher.update(target.as_bytes());
        hasher.update([0u8]);
        if let Some(argument) = argument {
            hasher.update(argument.as_bytes());
        }
        let digest = hasher.finalize();
        let mut hash = [0u8; HASH_LENGTH];
        hash.copy_from_slice(&digest[..HASH_LENGTH]);
        hash
    }

    /// Record a target/argument pair
    pub fn add(&mut self, target: &str, argument: Option<&str>) -> bool {
        self.hashes.insert(Self::hash(target, argument))
    }

    /// Whether a target/argument pair was recorded
    pub fn contains(&self, target: &str, argument: Option<&str>) -> bool {
        self.hashes.contains(&Self::hash(target, argument))
    }

    /// Record a precomputed hash
    pub fn add_hash(&mut self, hash: [u8; HASH_LENGTH]) -> bool {
        self.hashes.insert(hash)
    }

    /// Stored hashes in ascending order
    pub fn hashes(&self) -> impl Iterator<Item = &[u8; HASH_LENGTH]> {
        self.hashes.iter()
    }

    /// Number of stored hashes
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Write the payload: version, 32-bit count, hashes
    pub(crate) fn write_to<W: Write>(&self, writer: &mut StateWriter<W>) -> EncodeResult<()> {
        writer.write_u8(STORE_VERSION)?;
        let count = i32::try_from(self.hashes.len()).map_err(|_| EncodeError::LengthOverflow {
            length: self.hashes.len(),
        })?;
        writer.write_i32(count)?;
        for hash in &self.hashes {
            writer.write_bytes(hash)?;
        }
        Ok(())
    }

    /// Read a payload written by [`Self::write_to`]
    pub(crate) fn read_from<R: Read>(
        reader: &mut StateReader<R>,
        max_count: usize,
    ) -> DecodeResult<Self> {
        let version = reader.read_u8()?;
        if version != STORE_VERSION {
            return Err(DecodeError::EventValidationVersion(version));
        }
        let raw = reader.read_i32()?;
        let count = usize::try_from(raw).map_err(|_| DecodeError::InvalidLength(raw))?;
        if count > max_count {
            return Err(DecodeError::LengthLimitExceeded {
                length: count,
                limit: max_count,
            });
        }

        let mut store = Self::new();
        for _ in 0..count {
            store.add_hash(reader.read_array::<HASH_LENGTH>()?);
        }
        Ok(store)
    }
}
