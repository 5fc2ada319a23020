//! Async orchestration of task operations over the persistence and
//! notification collaborators.
//!
//! Every mutating call follows the same order: load the task record, apply
//! the pure transition, store the raw upload and the task's artifacts in the
//! document store, save the task with the version it was loaded at, and only
//! then dispatch notifications. A failed save leaves the stored task as it
//! was; documents already written are content-addressed and harmless.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use seshat_state::{DocumentId, DocumentStore, StorageError, TaskId, TaskStore};
use tracing::debug;

use crate::campaign::{Assignment, Campaign, CampaignError, CampaignStats, DurationProbe};
use crate::error_log::ErrorSummary;
use crate::gamma::GammaComputer;
use crate::notify::{Notification, Notifier};
use crate::obs;
use crate::task::{Submission, Task, TaskError, TaskStatus};
use crate::user::UserId;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("task record is not a valid task: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error("task {task_id} belongs to campaign {actual}, not {expected}")]
    WrongCampaign {
        task_id: TaskId,
        expected: String,
        actual: String,
    },

    #[error("task {task_id} is not a double-annotator task")]
    NotDoubleTask { task_id: TaskId },
}

impl ServiceError {
    /// The task was saved by someone else since it was loaded.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::Storage(StorageError::VersionConflict { .. }))
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tasks,
            documents,
            notifier,
        }
    }

    /// Persist a freshly assigned task.
    pub async fn create(&self, task: &Task) -> ServiceResult<()> {
        self.store_documents(task).await?;
        self.tasks
            .insert(task.id(), &task.meta().campaign, serde_json::to_value(task)?)
            .await?;
        Ok(())
    }

    pub async fn assign_single(
        &self,
        campaign: &Campaign,
        assignment: &Assignment<'_>,
        annotator: &UserId,
        probe: &dyn DurationProbe,
    ) -> ServiceResult<TaskId> {
        let (task, notification) = campaign.assign_single(assignment, annotator, probe)?;
        self.create(&task).await?;
        self.dispatch(&[notification]).await;
        Ok(task.id().clone())
    }

    pub async fn assign_double(
        &self,
        campaign: &Campaign,
        assignment: &Assignment<'_>,
        reference: &UserId,
        target: &UserId,
        probe: &dyn DurationProbe,
    ) -> ServiceResult<TaskId> {
        let (task, notification) = campaign.assign_double(assignment, reference, target, probe)?;
        self.create(&task).await?;
        self.dispatch(&[notification]).await;
        Ok(task.id().clone())
    }

    /// Load a task with the version it was stored at.
    pub async fn load(&self, task_id: &TaskId) -> ServiceResult<(Task, u64)> {
        let record = self.tasks.load(task_id).await?;
        let task: Task = serde_json::from_value(record.body)?;
        Ok((task, record.version))
    }

    async fn load_in(&self, campaign: &Campaign, task_id: &TaskId) -> ServiceResult<(Task, u64)> {
        let (task, version) = self.load(task_id).await?;
        if task.meta().campaign != campaign.slug {
            return Err(ServiceError::WrongCampaign {
                task_id: task_id.clone(),
                expected: campaign.slug.clone(),
                actual: task.meta().campaign.clone(),
            });
        }
        Ok((task, version))
    }

    async fn save(&self, task: &Task, version: u64) -> ServiceResult<u64> {
        let new_version = self
            .tasks
            .save(task.id(), version, serde_json::to_value(task)?)
            .await?;
        debug!(task_id = %task.id(), version = new_version, "task saved");
        Ok(new_version)
    }

    async fn store_documents(&self, task: &Task) -> ServiceResult<()> {
        for document in task.documents() {
            if !self.documents.contains(&document.id).await? {
                self.documents.put(&document.to_text()).await?;
            }
        }
        Ok(())
    }

    /// Delivery failures are logged: the mutation they follow is already
    /// persisted.
    async fn dispatch(&self, notifications: &[Notification]) {
        for notification in notifications {
            match self.notifier.dispatch(notification).await {
                Ok(()) => obs::emit_notification_dispatched(
                    &notification.object_id,
                    notification.notif_type.as_str(),
                    notification.recipients.len(),
                ),
                Err(err) => obs::emit_notification_failed(&notification.object_id, &err),
            }
        }
    }

    /// Submit a grid on behalf of `annotator`.
    pub async fn submit(
        &self,
        campaign: &Campaign,
        task_id: &TaskId,
        text: &str,
        annotator: &UserId,
    ) -> ServiceResult<Submission> {
        let (mut task, version) = self.load_in(campaign, task_id).await?;
        let submission = task.submit(text, annotator, &campaign.context(Utc::now()))?;

        self.documents.put(text).await?;
        self.store_documents(&task).await?;
        self.save(&task, version).await?;
        self.dispatch(&submission.notifications).await;
        Ok(submission)
    }

    /// Check a grid as [`submit`](Self::submit) would, without saving.
    pub async fn validate(
        &self,
        campaign: &Campaign,
        task_id: &TaskId,
        text: &str,
        annotator: &UserId,
    ) -> ServiceResult<ErrorSummary> {
        let (task, _) = self.load_in(campaign, task_id).await?;
        Ok(task.validate(text, annotator, &campaign.context(Utc::now()))?)
    }

    pub async fn log_download(
        &self,
        task_id: &TaskId,
        downloader: &UserId,
        file: &str,
    ) -> ServiceResult<()> {
        let (mut task, version) = self.load(task_id).await?;
        task.log_download(downloader, file, Utc::now())?;
        self.save(&task, version).await?;
        Ok(())
    }

    pub async fn add_comment(
        &self,
        campaign: &Campaign,
        task_id: &TaskId,
        author: &UserId,
        text: &str,
    ) -> ServiceResult<()> {
        let (mut task, version) = self.load_in(campaign, task_id).await?;
        let notification = task.add_comment(author, text, &campaign.context(Utc::now()))?;
        self.save(&task, version).await?;
        if !notification.recipients.is_empty() {
            self.dispatch(&[notification]).await;
        }
        Ok(())
    }

    pub async fn set_locked(&self, task_id: &TaskId, locked: bool) -> ServiceResult<()> {
        let (mut task, version) = self.load(task_id).await?;
        task.set_locked(locked, Utc::now());
        self.save(&task, version).await?;
        Ok(())
    }

    /// Compute, cache and return the per-tier agreement of a double task.
    pub async fn compute_gamma(
        &self,
        campaign: &Campaign,
        task_id: &TaskId,
        computer: &dyn GammaComputer,
    ) -> ServiceResult<BTreeMap<String, f64>> {
        let (mut task, version) = self.load_in(campaign, task_id).await?;
        let double = task
            .as_double_mut()
            .ok_or_else(|| ServiceError::NotDoubleTask {
                task_id: task_id.clone(),
            })?;
        let values = double.compute_gamma(&campaign.scheme, computer)?.clone();
        self.save(&task, version).await?;
        Ok(values)
    }

    pub async fn status(&self, task_id: &TaskId) -> ServiceResult<TaskStatus> {
        let (task, _) = self.load(task_id).await?;
        Ok(task.status())
    }

    /// Text of a stored grid document (artifact or raw upload).
    pub async fn document_text(&self, id: &DocumentId) -> ServiceResult<String> {
        Ok(self.documents.get(id).await?)
    }

    pub async fn campaign_stats(&self, campaign: &Campaign) -> ServiceResult<CampaignStats> {
        let records = self.tasks.list(&campaign.slug).await?;
        let tasks = records
            .into_iter()
            .map(|record| serde_json::from_value::<Task>(record.body))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CampaignStats::compute(&tasks))
    }
}
