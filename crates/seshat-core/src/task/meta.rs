//! Fields and audit trail shared by every task kind.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use seshat_state::{DocumentId, TaskId};
use serde::{Deserialize, Serialize};

use super::error::{TaskError, TaskResult};
use crate::checkers::GridKind;
use crate::textgrid::TextGrid;
use crate::user::UserId;

/// A grid artifact attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDocument {
    /// Digest of the grid's text form.
    pub id: DocumentId,
    pub kind: GridKind,
    pub creators: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub grid: TextGrid,
}

impl GridDocument {
    pub fn new(kind: GridKind, grid: TextGrid, creators: Vec<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: DocumentId::from_text(&grid.to_text()),
            kind,
            creators,
            created_at: now,
            grid,
        }
    }

    pub fn to_text(&self) -> String {
        self.grid.to_text()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComment {
    pub author: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDownload {
    pub downloader: UserId,
    pub file: String,
    pub time: DateTime<Utc>,
}

/// Audit record of a submitted file, kept whether or not it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUpload {
    /// Digest of the raw uploaded text.
    pub document: DocumentId,
    pub uploader: UserId,
    pub is_valid: bool,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub task_id: TaskId,
    /// Campaign slug.
    pub campaign: String,
    /// Path of the annotated audio file, relative to the campaign root.
    pub data_file: String,
    pub assigner: UserId,
    pub deadline: Option<NaiveDate>,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub template: Option<GridDocument>,
    pub discussion: Vec<TaskComment>,
    pub downloads: Vec<FileDownload>,
    pub uploads: Vec<FileUpload>,
}

impl TaskMeta {
    pub fn new(
        task_id: TaskId,
        campaign: impl Into<String>,
        data_file: impl Into<String>,
        assigner: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            campaign: campaign.into(),
            data_file: data_file.into(),
            assigner,
            deadline: None,
            is_locked: false,
            created_at: now,
            last_update: now,
            finish_time: None,
            template: None,
            discussion: Vec::new(),
            downloads: Vec::new(),
            uploads: Vec::new(),
        }
    }

    /// A task has started once anything was downloaded or uploaded.
    pub fn has_started(&self) -> bool {
        !self.downloads.is_empty() || !self.uploads.is_empty()
    }

    /// Time of the first download.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.downloads.first().map(|download| download.time)
    }

    /// Data file path without extension, slashes replaced by underscores.
    pub fn name(&self) -> String {
        Path::new(&self.data_file)
            .with_extension("")
            .to_string_lossy()
            .replace('/', "_")
    }

    pub(crate) fn ensure_unlocked(&self) -> TaskResult<()> {
        if self.is_locked {
            return Err(TaskError::Locked {
                task_id: self.task_id.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn record_download(&mut self, downloader: &UserId, file: &str, now: DateTime<Utc>) {
        self.downloads.push(FileDownload {
            downloader: downloader.clone(),
            file: file.to_string(),
            time: now,
        });
        self.last_update = now;
    }

    pub(crate) fn record_upload(
        &mut self,
        text: &str,
        uploader: &UserId,
        is_valid: bool,
        now: DateTime<Utc>,
    ) -> DocumentId {
        let document = DocumentId::from_text(text);
        self.uploads.push(FileUpload {
            document: document.clone(),
            uploader: uploader.clone(),
            is_valid,
            time: now,
        });
        self.last_update = now;
        document
    }

    pub(crate) fn record_comment(
        &mut self,
        author: &UserId,
        text: &str,
        now: DateTime<Utc>,
    ) -> TaskResult<()> {
        if text.trim().is_empty() {
            return Err(TaskError::EmptyComment);
        }
        self.discussion.push(TaskComment {
            author: author.clone(),
            text: text.to_string(),
            created_at: now,
        });
        self.last_update = now;
        Ok(())
    }
}
