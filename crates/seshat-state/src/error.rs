//! Error types for seshat-state

use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No document stored under that id
    #[error("document not found: {id}")]
    DocumentNotFound { id: String },

    /// No task stored under that id
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// A task with that id already exists
    #[error("task already exists: {task_id}")]
    TaskExists { task_id: String },

    /// The stored record moved on since it was loaded
    #[error("task {task_id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        task_id: String,
        expected: u64,
        actual: u64,
    },

    /// Document id is not a 64 char hex digest
    #[error("invalid document id: {id}")]
    InvalidDocumentId { id: String },

    /// Backend-specific failure
    #[error("storage backend failure: {0}")]
    Backend(String),
}
