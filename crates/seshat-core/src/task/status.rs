//! Read-only views of a task for dashboards.

use chrono::{DateTime, NaiveDate, Utc};
use seshat_state::{DocumentId, TaskId};
use serde::Serialize;

use super::Task;
use crate::error_log::TimeConflict;
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactStatus {
    pub name: &'static str,
    pub has_been_submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    pub creators: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub campaign: String,
    pub data_file: String,
    pub task_type: &'static str,
    pub step: &'static str,
    pub step_index: usize,
    pub all_steps: Vec<&'static str>,
    pub annotators: Vec<UserId>,
    pub assigner: UserId,
    pub deadline: Option<NaiveDate>,
    pub is_locked: bool,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub artifacts: Vec<ArtifactStatus>,
    /// Unresolved frontiers, only while merging times.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frontier_conflicts: Vec<TimeConflict>,
}

impl TaskStatus {
    pub fn of(task: &Task) -> Self {
        let meta = task.meta();
        let artifacts = task
            .artifacts()
            .into_iter()
            .map(|(name, document)| ArtifactStatus {
                name,
                has_been_submitted: document.is_some(),
                id: document.map(|d| d.id.clone()),
                creators: document.map(|d| d.creators.clone()).unwrap_or_default(),
                created_at: document.map(|d| d.created_at),
            })
            .collect();
        let frontier_conflicts = match task {
            Task::Double(double) => double.frontier_conflicts(),
            Task::Single(_) => Vec::new(),
        };
        Self {
            task_id: meta.task_id.clone(),
            campaign: meta.campaign.clone(),
            data_file: meta.data_file.clone(),
            task_type: task.task_type(),
            step: task.step_name(),
            step_index: task.step_index(),
            all_steps: task.all_steps(),
            annotators: task.annotators(),
            assigner: meta.assigner.clone(),
            deadline: meta.deadline,
            is_locked: meta.is_locked,
            is_done: task.is_done(),
            created_at: meta.created_at,
            start_time: meta.start_time(),
            finish_time: meta.finish_time,
            artifacts,
            frontier_conflicts,
        }
    }
}
