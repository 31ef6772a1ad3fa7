//! Session notifications and the completed-job ledger.

pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::JobId;

pub use store::{NotificationStore, NotificationSubscription};

/// Identifier of a notification. Ids increase in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(u64);

impl NotificationId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NotificationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JobComplete,
    StatusChange,
    System,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::JobComplete => write!(f, "job_complete"),
            NotificationKind::StatusChange => write!(f, "status_change"),
            NotificationKind::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// The only field that changes after creation.
    pub read: bool,
    pub kind: NotificationKind,
}

/// Title and message for a completed job, named after the project when the
/// job service reports one and after the uploaded file otherwise.
pub fn completion_text(
    job_id: &JobId,
    project_name: Option<&str>,
    file_name: Option<&str>,
) -> (String, String) {
    let subject = project_name
        .or(file_name)
        .map(|name| format!("'{}'", name))
        .unwrap_or_else(|| format!("job {}", job_id));

    (
        "Translation complete".to_string(),
        format!("Your translation of {} is ready.", subject),
    )
}
