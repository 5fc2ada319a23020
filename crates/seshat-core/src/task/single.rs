//! Task annotated by one annotator.

use serde::{Deserialize, Serialize};

use super::error::{TaskError, TaskResult};
use super::meta::{GridDocument, TaskMeta};
use super::{check_text, conclude_submission, parse_submission, StageOutcome, Submission, TaskContext};
use crate::checkers::GridKind;
use crate::error_log::{ErrorLog, ErrorSummary};
use crate::notify::{Notification, NotificationType};
use crate::user::UserId;

const INITIAL_TEMPLATE_INSTRUCTIONS: &str =
    "Annotate the audio file using the template TextGrid from the starter archive.";
const DONE_INSTRUCTIONS: &str = "The annotation task is done.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleStep {
    Pending,
    InProgress,
    Done,
}

impl SingleStep {
    pub const ALL: [SingleStep; 3] = [Self::Pending, Self::InProgress, Self::Done];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleAnnotatorTask {
    meta: TaskMeta,
    annotator: UserId,
    final_grid: Option<GridDocument>,
}

impl SingleAnnotatorTask {
    pub const TASK_TYPE: &'static str = "Single Annotator";

    pub fn new(meta: TaskMeta, annotator: UserId) -> Self {
        Self {
            meta,
            annotator,
            final_grid: None,
        }
    }

    pub fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut TaskMeta {
        &mut self.meta
    }

    pub fn annotator(&self) -> &UserId {
        &self.annotator
    }

    pub fn final_grid(&self) -> Option<&GridDocument> {
        self.final_grid.as_ref()
    }

    pub fn current_step(&self) -> SingleStep {
        if self.final_grid.is_some() {
            SingleStep::Done
        } else if self.meta.has_started() {
            SingleStep::InProgress
        } else {
            SingleStep::Pending
        }
    }

    pub fn is_done(&self) -> bool {
        self.current_step() == SingleStep::Done
    }

    pub fn allow_file_upload(&self, user: &UserId) -> bool {
        *user == self.annotator && !self.is_done()
    }

    pub fn allow_starter_zip_dl(&self) -> bool {
        !self.is_done()
    }

    /// Artifact the annotator should download next.
    pub fn current_tg_template(&self, _user: &UserId) -> &'static str {
        if self.final_grid.is_some() {
            "final"
        } else {
            "template"
        }
    }

    pub fn current_instructions(&self, _user: &UserId) -> &'static str {
        if self.is_done() {
            DONE_INSTRUCTIONS
        } else {
            INITIAL_TEMPLATE_INSTRUCTIONS
        }
    }

    /// Named artifacts, absent ones included.
    pub fn artifacts(&self) -> Vec<(&'static str, Option<&GridDocument>)> {
        vec![
            ("template", self.meta.template.as_ref()),
            ("final", self.final_grid.as_ref()),
        ]
    }

    fn ensure_assigned(&self, user: &UserId) -> TaskResult<()> {
        if *user != self.annotator {
            return Err(TaskError::NotAssigned {
                task_id: self.meta.task_id.clone(),
                user: user.clone(),
            });
        }
        Ok(())
    }

    /// Check the submitted grid and, if it has no blocking error, store it as
    /// the final grid.
    pub fn submit(
        &mut self,
        text: &str,
        annotator: &UserId,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<Submission> {
        self.meta.ensure_unlocked()?;
        self.ensure_assigned(annotator)?;
        let step = self.current_step();
        if step == SingleStep::Done {
            return Err(TaskError::Finished {
                task_id: self.meta.task_id.clone(),
            });
        }

        let mut log = ErrorLog::new();
        let outcome = match parse_submission(text, &mut log) {
            Some(grid) => {
                GridKind::Single.run(&grid, ctx.scheme, &mut log);
                if log.has_errors() {
                    StageOutcome::rejected(log)
                } else {
                    self.final_grid = Some(GridDocument::new(
                        GridKind::Single,
                        grid,
                        vec![self.annotator.clone()],
                        ctx.now,
                    ));
                    self.meta.finish_time = Some(ctx.now);
                    crate::obs::emit_task_finished(&self.meta.task_id.0, &self.meta.data_file);
                    let mut outcome = StageOutcome::accepted(log);
                    outcome.notify(Notification::task(
                        NotificationType::Finished,
                        &self.meta.task_id.0,
                        format!("The annotation task on file {} is done", self.meta.data_file),
                        ctx.subscribers.to_vec(),
                    ));
                    outcome
                }
            }
            None => StageOutcome::rejected(log),
        };
        Ok(conclude_submission(&mut self.meta, step.name(), text, annotator, outcome, ctx.now))
    }

    /// Same checks as [`submit`](Self::submit), without recording anything.
    pub fn validate(
        &self,
        text: &str,
        annotator: &UserId,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<ErrorSummary> {
        self.meta.ensure_unlocked()?;
        self.ensure_assigned(annotator)?;
        Ok(check_text(GridKind::Single, text, ctx.scheme))
    }
}
