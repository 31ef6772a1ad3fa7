use std::path::PathBuf;
use thiserror::Error;

use crate::workflow::{WorkflowHandle, WorkflowStatus};

#[derive(Error, Debug)]
pub enum TransflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid unit price '{value}': {reason}")]
    InvalidUnitPrice { value: String, reason: String },

    #[error("Unknown file format '{0}' in supported_formats")]
    UnknownFormat(String),
}

/// Errors surfaced to callers of the intake workflow.
///
/// Every variant is a distinct kind so callers can branch on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Document analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Document '{0}' is empty")]
    EmptyDocument(String),

    #[error("Invalid transition: request is {current}, operation requires {required}")]
    InvalidTransition {
        current: WorkflowStatus,
        required: WorkflowStatus,
    },

    #[error("At least one target language must be selected")]
    EmptySelection,

    #[error("Request must be calculated before submission (currently {current})")]
    NotCalculated { current: WorkflowStatus },

    #[error("Submission rejected by server: {0}")]
    RejectedByServer(String),

    #[error("Submission service unavailable: {0}")]
    SubmissionUnavailable(String),

    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(WorkflowHandle),

    #[error("Session has ended")]
    SessionEnded,
}

/// Failures of a document analysis capability.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Document '{0}' is empty")]
    EmptyFile(String),

    #[error("Analysis service unreachable: {0}")]
    Unreachable(String),

    #[error("Analysis returned malformed data: {0}")]
    Malformed(String),

    #[error("Failed to extract text from {format} document: {reason}")]
    Extraction { format: String, reason: String },
}

impl From<AnalysisError> for WorkflowError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::EmptyFile(name) => WorkflowError::EmptyDocument(name),
            other => WorkflowError::AnalysisUnavailable(other.to_string()),
        }
    }
}

/// Failures of the external job service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<BackendError> for WorkflowError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejected(reason) => WorkflowError::RejectedByServer(reason),
            other => WorkflowError::SubmissionUnavailable(other.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for BackendError {
    fn from(err: crate::db::DatabaseError) -> Self {
        BackendError::Unavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_maps_to_empty_document() {
        let err: WorkflowError = AnalysisError::EmptyFile("a.txt".to_string()).into();
        assert_eq!(err, WorkflowError::EmptyDocument("a.txt".to_string()));
    }

    #[test]
    fn test_unreachable_maps_to_analysis_unavailable() {
        let err: WorkflowError =
            AnalysisError::Unreachable("connection refused".to_string()).into();
        assert!(matches!(
            err,
            WorkflowError::AnalysisUnavailable(msg) if msg.contains("connection refused")
        ));
    }

    #[test]
    fn test_backend_rejection_keeps_reason() {
        let err: WorkflowError = BackendError::Rejected("duplicate request".to_string()).into();
        assert_eq!(
            err,
            WorkflowError::RejectedByServer("duplicate request".to_string())
        );
    }

    #[test]
    fn test_backend_outage_is_not_a_rejection() {
        let err: WorkflowError = BackendError::Unavailable("timeout".to_string()).into();
        assert!(matches!(err, WorkflowError::SubmissionUnavailable(_)));
    }

    #[test]
    fn test_invalid_transition_message_names_states() {
        let err = WorkflowError::InvalidTransition {
            current: WorkflowStatus::Draft,
            required: WorkflowStatus::Analyzed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: request is Draft, operation requires Analyzed"
        );
    }
}
