//! Per-request intake lifecycle.

pub mod request;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use request::TranslationRequest;

/// Lifecycle stage of a translation request, in strict forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Analyzed,
    LanguagesSelected,
    Calculated,
    Submitted,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Draft => write!(f, "Draft"),
            WorkflowStatus::Analyzed => write!(f, "Analyzed"),
            WorkflowStatus::LanguagesSelected => write!(f, "LanguagesSelected"),
            WorkflowStatus::Calculated => write!(f, "Calculated"),
            WorkflowStatus::Submitted => write!(f, "Submitted"),
        }
    }
}

/// Opaque reference to one request inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowHandle(uuid::Uuid);

impl WorkflowHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for WorkflowHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
