//! Hidden field page state persister
//!
//! Page state travels to the client in a hidden form field and comes back
//! with the next postback. The field is protected under a purpose chain made
//! of the persister purpose, the page identifier and an optional per-user
//! key, so state captured on one page or for one user is rejected elsewhere.

use crate::error::{Error, Result};
use crate::formatter::{EventValidationStore, ObjectStateFormatter, Value};
use tracing::warn;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Name of the hidden field carrying page state
pub const VIEW_STATE_FIELD: &str = "__VIEWSTATE";

/// Name of the hidden field carrying event validation data
pub const EVENT_VALIDATION_FIELD: &str = "__EVENTVALIDATION";

/// Default purpose of page state fields
pub const DEFAULT_PERSISTER_PURPOSE: &str = "HiddenFieldPageStatePersister.ViewState";

/// Purpose of event validation fields
pub const EVENT_VALIDATION_PURPOSE: &str = "HiddenFieldPageStatePersister.EventValidation";

/// Persister settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(default))]
pub struct PersisterConfig {
    /// Identifier of the page the state belongs to
    pub page_id: String,
    /// Per-user key, typically derived from the session or identity
    pub view_state_user_key: Option<String>,
    /// Base purpose of the page state field
    pub purpose: String,
}

impl PersisterConfig {
    /// Config for a page
    pub fn for_page(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            ..Self::default()
        }
    }

    /// Bind the state to a user
    pub fn with_user_key(mut self, key: impl Into<String>) -> Self {
        self.view_state_user_key = Some(key.into());
        self
    }

    /// Parse a config from JSON; missing fields take their defaults
    #[cfg(feature = "serde_support")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration {
            message: format!("Invalid persister config: {}", e),
        })
    }
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            page_id: String::new(),
            view_state_user_key: None,
            purpose: DEFAULT_PERSISTER_PURPOSE.to_string(),
        }
    }
}

/// State of one page between requests
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageState {
    /// State controls need regardless of view state settings
    pub control_state: Value,
    /// Regular view state
    pub view_state: Value,
}

impl PageState {
    /// Create a page state
    pub fn new(control_state: impl Into<Value>, view_state: impl Into<Value>) -> Self {
        Self {
            control_state: control_state.into(),
            view_state: view_state.into(),
        }
    }

    /// Whether neither part holds anything
    pub fn is_empty(&self) -> bool {
        self.control_state.is_null() && self.view_state.is_null()
    }
}

/// Persists page state in hidden form fields
#[derive(Debug, Clone)]
pub struct HiddenFieldPersister {
    formatter: ObjectStateFormatter,
    config: PersisterConfig,
}

impl HiddenFieldPersister {
    /// Create a persister
    pub fn new(formatter: ObjectStateFormatter, config: PersisterConfig) -> Self {
        Self { formatter, config }
    }

    /// The settings
    pub fn config(&self) -> &PersisterConfig {
        &self.config
    }

    fn purposes<'a>(&'a self, base: &'a str) -> Vec<&'a str> {
        let mut purposes = vec![base, self.config.page_id.as_str()];
        if let Some(user_key) = &self.config.view_state_user_key {
            purposes.push(user_key);
        }
        purposes
    }

    /// Render page state into the field value
    pub fn save(&self, state: &PageState) -> Result<String> {
        let value = Value::pair(state.control_state.clone(), state.view_state.clone());
        self.formatter
            .serialize_with_purposes(&value, &self.purposes(&self.config.purpose))
    }

    /// Restore page state from the posted field value
    ///
    /// A missing or empty field is a first request and yields empty state.
    pub fn load(&self, field: &str) -> Result<PageState> {
        if field.trim().is_empty() {
            return Ok(PageState::default());
        }

        let value = self
            .formatter
            .deserialize_with_purposes(field, &self.purposes(&self.config.purpose))
            .map_err(|e| self.corrupted(e))?;
        match value {
            Value::Pair(pair) => {
                let (control_state, view_state) = *pair;
                Ok(PageState {
                    control_state,
                    view_state,
                })
            }
            Value::Null => Ok(PageState::default()),
            other => Err(self.corrupted(Error::InvalidInput {
                message: format!("page state must be a pair, got {}", other.type_name()),
            })),
        }
    }

    /// Render event validation data into its field value
    pub fn save_event_validation(&self, store: &EventValidationStore) -> Result<String> {
        let value = Value::EventValidation(store.clone());
        self.formatter
            .serialize_with_purposes(&value, &self.purposes(EVENT_VALIDATION_PURPOSE))
    }

    /// Restore event validation data from its posted field value
    pub fn load_event_validation(&self, field: &str) -> Result<EventValidationStore> {
        if field.trim().is_empty() {
            return Ok(EventValidationStore::new());
        }

        let value = self
            .formatter
            .deserialize_with_purposes(field, &self.purposes(EVENT_VALIDATION_PURPOSE))
            .map_err(|e| self.corrupted(e))?;
        match value {
            Value::EventValidation(store) => Ok(store),
            other => Err(self.corrupted(Error::InvalidInput {
                message: format!(
                    "event validation field must hold a store, got {}",
                    other.type_name()
                ),
            })),
        }
    }

    fn corrupted(&self, source: Error) -> Error {
        warn!(
            page_id = %self.config.page_id,
            error = %source,
            "Rejected posted page state"
        );
        Error::ViewStateCorrupted {
            source: Box::new(source),
        }
    }
}
