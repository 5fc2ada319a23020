//! Trait contract tests for DocumentStore and TaskStore.
//!
//! These tests verify the behavioral contracts of the storage traits
//! using in-memory fakes. Any conforming implementation must pass these.

use seshat_state::fakes::{MemoryDocumentStore, MemoryTaskStore};
use seshat_state::storage_traits::*;
use seshat_state::StorageError;
use serde_json::json;

// ===========================================================================
// DocumentStore contract tests
// ===========================================================================

#[tokio::test]
async fn document_put_returns_content_id() {
    let store = MemoryDocumentStore::new();
    let text = "File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n";
    let id = store.put(text).await.unwrap();

    assert_eq!(id, DocumentId::from_text(text));
}

#[tokio::test]
async fn document_get_returns_stored_text() {
    let store = MemoryDocumentStore::new();
    let id = store.put("some textgrid").await.unwrap();

    assert_eq!(store.get(&id).await.unwrap(), "some textgrid");
}

#[tokio::test]
async fn document_get_not_found() {
    let store = MemoryDocumentStore::new();
    let bogus = DocumentId::from_text("never stored");
    let err = store.get(&bogus).await.unwrap_err();

    assert!(matches!(err, StorageError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn document_same_text_deduplicated() {
    let store = MemoryDocumentStore::new();
    let a = store.put("identical").await.unwrap();
    let b = store.put("identical").await.unwrap();

    assert_eq!(a, b);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn document_contains() {
    let store = MemoryDocumentStore::new();
    let id = store.put("present").await.unwrap();

    assert!(store.contains(&id).await.unwrap());
    assert!(!store
        .contains(&DocumentId::from_text("absent"))
        .await
        .unwrap());
}

// ===========================================================================
// TaskStore contract tests
// ===========================================================================

#[tokio::test]
async fn task_insert_starts_at_version_one() {
    let store = MemoryTaskStore::new();
    let id = TaskId::new();
    let record = store
        .insert(&id, "phonemes", json!({ "data_file": "a.wav" }))
        .await
        .unwrap();

    assert_eq!(record.version, 1);
    assert_eq!(record.campaign, "phonemes");
}

#[tokio::test]
async fn task_insert_twice_fails() {
    let store = MemoryTaskStore::new();
    let id = TaskId::new();
    store.insert(&id, "c", json!({})).await.unwrap();
    let err = store.insert(&id, "c", json!({})).await.unwrap_err();

    assert!(matches!(err, StorageError::TaskExists { .. }));
}

#[tokio::test]
async fn task_save_bumps_version() {
    let store = MemoryTaskStore::new();
    let id = TaskId::new();
    store.insert(&id, "c", json!({ "n": 0 })).await.unwrap();

    let v2 = store.save(&id, 1, json!({ "n": 1 })).await.unwrap();
    assert_eq!(v2, 2);

    let record = store.load(&id).await.unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.body, json!({ "n": 1 }));
}

#[tokio::test]
async fn task_save_with_stale_version_is_refused_without_change() {
    let store = MemoryTaskStore::new();
    let id = TaskId::new();
    store.insert(&id, "c", json!({ "n": 0 })).await.unwrap();
    store.save(&id, 1, json!({ "n": 1 })).await.unwrap();

    let err = store.save(&id, 1, json!({ "n": 99 })).await.unwrap_err();
    match err {
        StorageError::VersionConflict {
            expected, actual, ..
        } => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected VersionConflict, got {other:?}"),
    }
    assert_eq!(store.load(&id).await.unwrap().body, json!({ "n": 1 }));
}

#[tokio::test]
async fn task_load_missing() {
    let store = MemoryTaskStore::new();
    let err = store.load(&TaskId::new()).await.unwrap_err();

    assert!(matches!(err, StorageError::TaskNotFound { .. }));
}

#[tokio::test]
async fn task_list_filters_by_campaign() {
    let store = MemoryTaskStore::new();
    store.insert(&TaskId::new(), "a", json!({})).await.unwrap();
    store.insert(&TaskId::new(), "a", json!({})).await.unwrap();
    store.insert(&TaskId::new(), "b", json!({})).await.unwrap();

    assert_eq!(store.list("a").await.unwrap().len(), 2);
    assert_eq!(store.list("b").await.unwrap().len(), 1);
    assert!(store.list("zzz").await.unwrap().is_empty());
}
