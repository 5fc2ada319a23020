//! Notifications produced by workflow operations.
//!
//! Task and campaign operations return [`Notification`] values instead of
//! sending anything themselves; the service hands them to a [`Notifier`]
//! once the mutation is persisted.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::user::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Assignment,
    Finished,
    Comment,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Finished => "finished",
            Self::Comment => "comment",
        }
    }
}

/// What a notification links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Task,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub notif_type: NotificationType,
    pub object_type: ObjectType,
    pub object_id: String,
    pub recipients: Vec<UserId>,
}

impl Notification {
    pub fn task(
        notif_type: NotificationType,
        task_id: &str,
        message: impl Into<String>,
        recipients: Vec<UserId>,
    ) -> Self {
        Self {
            message: message.into(),
            notif_type,
            object_type: ObjectType::Task,
            object_id: task_id.to_string(),
            recipients,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers notifications to their recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            event = "notify.sent",
            notif_type = notification.notif_type.as_str(),
            object_id = %notification.object_id,
            recipients = notification.recipients.len(),
            message = %notification.message,
        );
        Ok(())
    }
}

/// Keeps every dispatched notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|e| NotifyError(e.to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
