//! Purpose-scoped authenticated encryption
//!
//! This module wraps serialized state so that clients can neither read nor
//! alter it, and so that state produced for one purpose (a page, a user, a
//! hidden field) is rejected anywhere else.

pub mod protection_aes;
pub mod protection_hash;
pub mod protection_provider;

// Re-export main types for convenience
pub use protection_aes::Aes;
pub use protection_provider::{
    DataProtectionProvider, DataProtector, ProtectionConfig, PurposeProtector, MAGIC_HEADER,
};

pub use crate::error::{ProtectionError, ProtectionResult};
