//! # WebForms View-State Library
//!
//! A pure Rust implementation of the view-state machinery of a page-based web
//! UI framework: the object state formatter, purpose-scoped protection of the
//! serialized form, and hidden field page state persistence.
//!
//! ## Features
//!
//! - **Formatter Module**: token-tagged binary codec for heterogeneous value
//!   graphs, wire compatible with the legacy format
//! - **Protection Module**: authenticated encryption bound to purpose chains
//! - **Persister Module**: page state and event validation hidden fields
//!
//! ## Optional Features
//!
//! - `serde_support`: Serde (de)serialization of the configuration structs
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use webforms_viewstate::formatter::{ObjectStateFormatter, Value};
//! use webforms_viewstate::protection::DataProtectionProvider;
//!
//! let provider = DataProtectionProvider::generate("/MyApp")?;
//! let formatter = ObjectStateFormatter::new(Arc::new(provider));
//!
//! let state = Value::pair("", Value::List(vec![0.into(), "hello".into()]));
//! let text = formatter.serialize(&state)?;
//! assert_eq!(formatter.deserialize(&text)?, state);
//! # Ok::<(), webforms_viewstate::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};

// Core modules
pub mod error;
pub mod formatter;
pub mod persister;
pub mod protection;

// Utility modules
pub mod utils;

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::error::{Error, Result};
    pub use crate::formatter::{
        FormatterConfig, ObjectStateFormatter, StateType, StateTyped, TypeRegistry, TypedArray,
        Value,
    };
    pub use crate::persister::{HiddenFieldPersister, PageState, PersisterConfig};
    pub use crate::protection::{DataProtectionProvider, DataProtector, ProtectionConfig};
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
