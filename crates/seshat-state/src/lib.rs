//! Seshat-State: persistence contracts for the annotation engine
//!
//! The engine never talks to a database directly. It persists two kinds of
//! objects through the traits defined here:
//!
//! - TextGrid documents (raw uploads and accepted artifacts), stored by the
//!   SHA-256 digest of their text
//! - Task records, stored as JSON bodies guarded by an optimistic version
//!
//! ## Key Components
//!
//! - `DocumentStore`: content-addressed TextGrid text storage
//! - `TaskStore`: versioned task record storage
//! - `fakes`: in-memory implementations used by tests and the CLI

mod error;
pub mod fakes;
pub mod storage_traits;

pub use error::StorageError;
pub use storage_traits::{
    DocumentId, DocumentStore, StorageResult, TaskId, TaskRecord, TaskStore,
};
