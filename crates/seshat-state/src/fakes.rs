//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryDocumentStore` and `MemoryTaskStore` that satisfy the
//! trait contracts without any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Backend("in-memory store lock poisoned".to_string())
}

// ---------------------------------------------------------------------------
// MemoryDocumentStore
// ---------------------------------------------------------------------------

/// In-memory document store backed by a `HashMap<id, text>`.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct documents stored.
    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, text: &str) -> StorageResult<DocumentId> {
        let id = DocumentId::from_text(text);
        let mut documents = self.documents.lock().map_err(poisoned)?;
        documents
            .entry(id.as_str().to_string())
            .or_insert_with(|| text.to_string());
        Ok(id)
    }

    async fn get(&self, id: &DocumentId) -> StorageResult<String> {
        let documents = self.documents.lock().map_err(poisoned)?;
        documents
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StorageError::DocumentNotFound {
                id: id.as_str().to_string(),
            })
    }

    async fn contains(&self, id: &DocumentId) -> StorageResult<bool> {
        let documents = self.documents.lock().map_err(poisoned)?;
        Ok(documents.contains_key(id.as_str()))
    }
}

// ---------------------------------------------------------------------------
// MemoryTaskStore
// ---------------------------------------------------------------------------

/// In-memory task store backed by a `HashMap<TaskId, TaskRecord>`.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(
        &self,
        task_id: &TaskId,
        campaign: &str,
        body: serde_json::Value,
    ) -> StorageResult<TaskRecord> {
        let mut tasks = self.tasks.lock().map_err(poisoned)?;
        if tasks.contains_key(&task_id.0) {
            return Err(StorageError::TaskExists {
                task_id: task_id.0.clone(),
            });
        }
        let record = TaskRecord {
            task_id: task_id.clone(),
            campaign: campaign.to_string(),
            version: 1,
            body,
            updated_at: Utc::now(),
        };
        tasks.insert(task_id.0.clone(), record.clone());
        Ok(record)
    }

    async fn load(&self, task_id: &TaskId) -> StorageResult<TaskRecord> {
        let tasks = self.tasks.lock().map_err(poisoned)?;
        tasks
            .get(&task_id.0)
            .cloned()
            .ok_or_else(|| StorageError::TaskNotFound {
                task_id: task_id.0.clone(),
            })
    }

    async fn save(
        &self,
        task_id: &TaskId,
        expected_version: u64,
        body: serde_json::Value,
    ) -> StorageResult<u64> {
        let mut tasks = self.tasks.lock().map_err(poisoned)?;
        let record = tasks
            .get_mut(&task_id.0)
            .ok_or_else(|| StorageError::TaskNotFound {
                task_id: task_id.0.clone(),
            })?;
        if record.version != expected_version {
            return Err(StorageError::VersionConflict {
                task_id: task_id.0.clone(),
                expected: expected_version,
                actual: record.version,
            });
        }
        record.version += 1;
        record.body = body;
        record.updated_at = Utc::now();
        tracing::debug!(task_id = %task_id, version = record.version, "task record saved");
        Ok(record.version)
    }

    async fn list(&self, campaign: &str) -> StorageResult<Vec<TaskRecord>> {
        let tasks = self.tasks.lock().map_err(poisoned)?;
        let mut records: Vec<TaskRecord> = tasks
            .values()
            .filter(|r| r.campaign == campaign)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(records)
    }
}
