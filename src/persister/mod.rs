//! Page state persistence
//!
//! This module round-trips a page's control state and view state through
//! protected hidden form fields.

pub mod persister_hidden_field;

// Re-export main types for convenience
pub use persister_hidden_field::{
    HiddenFieldPersister, PageState, PersisterConfig, EVENT_VALIDATION_FIELD, VIEW_STATE_FIELD,
};
