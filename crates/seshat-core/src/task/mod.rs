//! Annotation tasks and their workflow.
//!
//! A task's step is never stored: it is computed from which artifacts exist
//! (see [`SingleStep`] and [`DoubleStep`]). Operations are pure state
//! transitions on an in-memory task. They return what happened (error
//! summary, notifications to send) and leave persistence to the caller,
//! usually [`TaskService`](crate::service::TaskService).

pub mod double;
pub mod error;
pub mod meta;
pub mod single;
pub mod status;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use seshat_state::{DocumentId, TaskId};
use serde::{Deserialize, Serialize};

pub use double::{DoubleAnnotatorTask, DoubleStep};
pub use error::{TaskError, TaskResult};
pub use meta::{FileDownload, FileUpload, GridDocument, TaskComment, TaskMeta};
pub use single::{SingleAnnotatorTask, SingleStep};
pub use status::{ArtifactStatus, TaskStatus};

use crate::checkers::GridKind;
use crate::error_log::{ErrorLog, ErrorSummary};
use crate::metrics::METRICS;
use crate::notify::{Notification, NotificationType};
use crate::obs::{self, TaskSpan};
use crate::scheme::CheckingScheme;
use crate::textgrid::TextGrid;
use crate::user::UserId;

/// What a task operation needs from its campaign.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    pub scheme: &'a CheckingScheme,
    pub subscribers: &'a [UserId],
    pub now: DateTime<Utc>,
}

/// Result of a submission that was not refused outright.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    /// Whether the grid was stored. A stored grid may still come with
    /// errors explaining why the task could not advance.
    pub accepted: bool,
    pub summary: ErrorSummary,
    /// Digest of the uploaded text, recorded in the upload audit.
    pub upload: DocumentId,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

pub(crate) struct StageOutcome {
    accepted: bool,
    log: ErrorLog,
    notifications: Vec<Notification>,
}

impl StageOutcome {
    pub(crate) fn accepted(log: ErrorLog) -> Self {
        Self {
            accepted: true,
            log,
            notifications: Vec::new(),
        }
    }

    pub(crate) fn rejected(log: ErrorLog) -> Self {
        Self {
            accepted: false,
            log,
            notifications: Vec::new(),
        }
    }

    /// Queue a notification; ones without recipients are dropped.
    pub(crate) fn notify(&mut self, notification: Notification) {
        if !notification.recipients.is_empty() {
            self.notifications.push(notification);
        }
    }
}

/// Parse a submitted file, logging a structural error if it is not a grid.
pub(crate) fn parse_submission(text: &str, log: &mut ErrorLog) -> Option<TextGrid> {
    match TextGrid::parse(text) {
        Ok(grid) => Some(grid),
        Err(err) => {
            log.log_structural(format!("The file is not a valid TextGrid: {err}"));
            None
        }
    }
}

/// Parse and check a submitted file without touching any task.
pub(crate) fn check_text(kind: GridKind, text: &str, scheme: &CheckingScheme) -> ErrorSummary {
    let mut log = ErrorLog::new();
    if let Some(grid) = parse_submission(text, &mut log) {
        kind.run(&grid, scheme, &mut log);
    }
    log.into_summary()
}

/// Record the upload audit entry and turn a stage outcome into a
/// [`Submission`].
pub(crate) fn conclude_submission(
    meta: &mut TaskMeta,
    step: &'static str,
    text: &str,
    annotator: &UserId,
    outcome: StageOutcome,
    now: DateTime<Utc>,
) -> Submission {
    let upload = meta.record_upload(text, annotator, outcome.accepted, now);
    METRICS.inc_submission(outcome.accepted);
    if outcome.accepted {
        obs::emit_submission_accepted(&meta.task_id.0, step, annotator.as_str());
    } else {
        obs::emit_submission_rejected(
            &meta.task_id.0,
            step,
            annotator.as_str(),
            outcome.log.has_errors(),
        );
    }
    Submission {
        accepted: outcome.accepted,
        summary: outcome.log.into_summary(),
        upload,
        notifications: outcome.notifications,
    }
}

/// Any task, tagged by kind when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum Task {
    Single(SingleAnnotatorTask),
    Double(DoubleAnnotatorTask),
}

impl From<SingleAnnotatorTask> for Task {
    fn from(task: SingleAnnotatorTask) -> Self {
        Self::Single(task)
    }
}

impl From<DoubleAnnotatorTask> for Task {
    fn from(task: DoubleAnnotatorTask) -> Self {
        Self::Double(task)
    }
}

impl Task {
    pub fn meta(&self) -> &TaskMeta {
        match self {
            Self::Single(task) => task.meta(),
            Self::Double(task) => task.meta(),
        }
    }

    fn meta_mut(&mut self) -> &mut TaskMeta {
        match self {
            Self::Single(task) => task.meta_mut(),
            Self::Double(task) => task.meta_mut(),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.meta().task_id
    }

    pub fn task_type(&self) -> &'static str {
        match self {
            Self::Single(_) => SingleAnnotatorTask::TASK_TYPE,
            Self::Double(_) => DoubleAnnotatorTask::TASK_TYPE,
        }
    }

    pub fn annotators(&self) -> Vec<UserId> {
        match self {
            Self::Single(task) => vec![task.annotator().clone()],
            Self::Double(task) => task.annotators().into_iter().cloned().collect(),
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Single(task) => task.current_step().name(),
            Self::Double(task) => task.current_step().name(),
        }
    }

    pub fn step_index(&self) -> usize {
        match self {
            Self::Single(task) => task.current_step().index(),
            Self::Double(task) => task.current_step().index(),
        }
    }

    pub fn all_steps(&self) -> Vec<&'static str> {
        match self {
            Self::Single(_) => SingleStep::ALL.iter().map(SingleStep::name).collect(),
            Self::Double(_) => DoubleStep::ALL.iter().map(DoubleStep::name).collect(),
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            Self::Single(task) => task.is_done(),
            Self::Double(task) => task.is_done(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.meta().is_locked
    }

    pub fn set_locked(&mut self, locked: bool, now: DateTime<Utc>) {
        let meta = self.meta_mut();
        meta.is_locked = locked;
        meta.last_update = now;
    }

    pub fn submit(
        &mut self,
        text: &str,
        annotator: &UserId,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<Submission> {
        let _span = TaskSpan::enter(&self.id().0);
        match self {
            Self::Single(task) => task.submit(text, annotator, ctx),
            Self::Double(task) => task.submit(text, annotator, ctx),
        }
    }

    pub fn validate(
        &self,
        text: &str,
        annotator: &UserId,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<ErrorSummary> {
        let _span = TaskSpan::enter(&self.id().0);
        match self {
            Self::Single(task) => task.validate(text, annotator, ctx),
            Self::Double(task) => task.validate(text, annotator, ctx),
        }
    }

    /// Record that `downloader` fetched `file` from this task.
    pub fn log_download(
        &mut self,
        downloader: &UserId,
        file: &str,
        now: DateTime<Utc>,
    ) -> TaskResult<()> {
        self.ensure_participant(downloader)?;
        let meta = self.meta_mut();
        meta.ensure_unlocked()?;
        meta.record_download(downloader, file, now);
        Ok(())
    }

    /// Append a comment to the discussion. Returns the notification for
    /// every annotator and subscriber but the author.
    pub fn add_comment(
        &mut self,
        author: &UserId,
        text: &str,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<Notification> {
        let meta = self.meta_mut();
        meta.ensure_unlocked()?;
        meta.record_comment(author, text, ctx.now)?;

        let mut seen = HashSet::new();
        let recipients: Vec<UserId> = self
            .annotators()
            .into_iter()
            .chain(ctx.subscribers.iter().cloned())
            .filter(|user| user != author && seen.insert(user.clone()))
            .collect();
        let meta = self.meta();
        Ok(Notification::task(
            NotificationType::Comment,
            &meta.task_id.0,
            format!(
                "{author} commented on the annotation task on file {}",
                meta.data_file
            ),
            recipients,
        ))
    }

    fn ensure_participant(&self, user: &UserId) -> TaskResult<()> {
        if self.annotators().contains(user) {
            Ok(())
        } else {
            Err(TaskError::NotAssigned {
                task_id: self.id().clone(),
                user: user.clone(),
            })
        }
    }

    pub fn allow_file_upload(&self, user: &UserId) -> bool {
        !self.is_locked()
            && match self {
                Self::Single(task) => task.allow_file_upload(user),
                Self::Double(task) => task.allow_file_upload(user),
            }
    }

    pub fn allow_starter_zip_dl(&self) -> bool {
        match self {
            Self::Single(task) => task.allow_starter_zip_dl(),
            Self::Double(task) => task.allow_starter_zip_dl(),
        }
    }

    pub fn current_tg_template(&self, user: &UserId) -> &'static str {
        match self {
            Self::Single(task) => task.current_tg_template(user),
            Self::Double(task) => task.current_tg_template(user),
        }
    }

    pub fn current_instructions(&self, user: &UserId) -> &'static str {
        match self {
            Self::Single(task) => task.current_instructions(user),
            Self::Double(task) => task.current_instructions(user),
        }
    }

    pub fn artifacts(&self) -> Vec<(&'static str, Option<&GridDocument>)> {
        match self {
            Self::Single(task) => task.artifacts(),
            Self::Double(task) => task.artifacts(),
        }
    }

    /// Present artifacts only.
    pub fn documents(&self) -> Vec<&GridDocument> {
        self.artifacts()
            .into_iter()
            .filter_map(|(_, document)| document)
            .collect()
    }

    pub fn tiers_gamma(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            Self::Single(_) => None,
            Self::Double(task) => task.tiers_gamma(),
        }
    }

    pub fn as_double_mut(&mut self) -> Option<&mut DoubleAnnotatorTask> {
        match self {
            Self::Double(task) => Some(task),
            Self::Single(_) => None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::of(self)
    }
}
