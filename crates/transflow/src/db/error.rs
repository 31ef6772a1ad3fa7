use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create database directory '{dir}': {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema migration to v{version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored submission no longer decodes.
    #[error("Stored submission for job '{id}' is unreadable: {reason}")]
    Payload { id: String, reason: String },
}
