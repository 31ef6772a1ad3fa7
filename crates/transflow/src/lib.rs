pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod notify;
pub mod poller;
pub mod pricing;
pub mod session;
pub mod workflow;

pub use analysis::{
    DocumentAnalysis, DocumentAnalyzer, FileAnalysisAdapter, FileFormat, HttpAnalyzer,
    LocalAnalyzer, UploadedFile,
};
pub use config::{load_config, load_config_from_str, Config};
pub use error::{
    AnalysisError, BackendError, ConfigError, Result, TransflowError, WorkflowError,
};
pub use gateway::{
    HttpJobBackend, JobBackend, JobId, JobStatusReport, JobSubmission, RemoteJobStatus,
    SqliteJobBackend, SubmissionGateway,
};
pub use notify::{
    Notification, NotificationId, NotificationKind, NotificationStore, NotificationSubscription,
};
pub use poller::{CompletionPoller, PollScheduler, TickOutcome, TickReport};
pub use pricing::{CalculationSummary, CostCalculator, Money};
pub use session::{IntakeSession, SessionSettings};
pub use workflow::{TranslationRequest, WorkflowHandle, WorkflowStatus};
