//! Storage trait definitions for Seshat
//!
//! These traits define the persistence collaborators of the engine:
//! - `DocumentStore`: TextGrid text addressed by content digest
//! - `TaskStore`: task records with optimistic versioning
//!
//! Both traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// DocumentStore: TextGrid documents
// ---------------------------------------------------------------------------

/// Opaque document id: the SHA-256 hex digest of the document text.
///
/// The inner field is private so an id is always lowercase hex, either
/// computed by `from_bytes` or validated through `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Compute the id of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        DocumentId(hex::encode(hasher.finalize()))
    }

    /// Compute the id of a text document.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for DocumentId {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDocumentId { id: s });
        }
        Ok(DocumentId(s.to_ascii_lowercase()))
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-addressed TextGrid store.
///
/// Guarantees:
/// - `put(text)` always returns `DocumentId::from_text(text)`.
/// - `get(id)` returns the exact text previously stored.
/// - Documents are never deleted: a newer artifact supersedes an older one
///   by being stored under its own id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a document and return its id. Storing the same text twice is a no-op.
    async fn put(&self, text: &str) -> StorageResult<DocumentId>;

    /// Retrieve a document. Returns `StorageError::DocumentNotFound` if absent.
    async fn get(&self, id: &DocumentId) -> StorageResult<String>;

    /// Check whether a document exists.
    async fn contains(&self, id: &DocumentId) -> StorageResult<bool>;
}

// ---------------------------------------------------------------------------
// TaskStore: versioned task records
// ---------------------------------------------------------------------------

/// Unique identifier for an annotation task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        TaskId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored task body together with its concurrency version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    /// Campaign slug the task belongs to
    pub campaign: String,
    /// Incremented by every successful save, starting at 1
    pub version: u64,
    /// Serialized task
    pub body: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Task record store.
///
/// Semantics:
/// - `insert` creates version 1 and fails if the id is taken.
/// - `save` succeeds only if `expected_version` matches the stored version,
///   so two concurrent submissions on one task cannot both win.
/// - A failed `save` leaves the stored record untouched.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a new task record.
    async fn insert(
        &self,
        task_id: &TaskId,
        campaign: &str,
        body: serde_json::Value,
    ) -> StorageResult<TaskRecord>;

    /// Load the current record for a task.
    async fn load(&self, task_id: &TaskId) -> StorageResult<TaskRecord>;

    /// Replace the task body if nobody saved since `expected_version`.
    /// Returns the new version.
    async fn save(
        &self,
        task_id: &TaskId,
        expected_version: u64,
        body: serde_json::Value,
    ) -> StorageResult<u64>;

    /// List all task records of a campaign.
    async fn list(&self, campaign: &str) -> StorageResult<Vec<TaskRecord>>;
}
