//! Structured events for checking, task and merge lifecycles.
//!
//! Every event carries an `event` field (`check.completed`,
//! `task.submission_accepted`, ...) so log pipelines can filter on it.
//! Task-scoped work runs inside a [`TaskSpan`] so nested events inherit the
//! task id.

use tracing::{info, warn};

use crate::checkers::GridKind;
use crate::error_log::ErrorLog;

/// RAII guard entering a span tagged with the task id.
///
/// The guard is not `Send`: enter it in synchronous code only, never across
/// an `.await`.
pub struct TaskSpan {
    _span: tracing::span::EnteredSpan,
}

impl TaskSpan {
    pub fn enter(task_id: &str) -> Self {
        let span = tracing::info_span!("seshat.task", task_id = %task_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_check_completed(kind: GridKind, log: &ErrorLog) {
    info!(
        event = "check.completed",
        kind = %kind,
        has_errors = log.has_errors(),
        structural = log.structural().len(),
        mismatches = log.mismatches().len(),
        conflicts = log.conflicts().len(),
    );
}

pub fn emit_submission_accepted(task_id: &str, step: &str, annotator: &str) {
    info!(
        event = "task.submission_accepted",
        task_id = %task_id,
        step = %step,
        annotator = %annotator,
    );
}

pub fn emit_submission_rejected(task_id: &str, step: &str, annotator: &str, blocking: bool) {
    info!(
        event = "task.submission_rejected",
        task_id = %task_id,
        step = %step,
        annotator = %annotator,
        blocking = blocking,
    );
}

/// Frontier merge computed, with the number of unresolved conflicts.
pub fn emit_merge_computed(task_id: &str, tiers: usize, conflicts: usize) {
    info!(
        event = "merge.computed",
        task_id = %task_id,
        tiers = tiers,
        conflicts = conflicts,
    );
}

pub fn emit_task_finished(task_id: &str, data_file: &str) {
    info!(event = "task.finished", task_id = %task_id, data_file = %data_file);
}

pub fn emit_gamma_failed(data_file: &str, tier: &str, error: &dyn std::fmt::Display) {
    warn!(event = "gamma.tier_failed", data_file = %data_file, tier = %tier, error = %error);
}

pub fn emit_notification_dispatched(object_id: &str, notif_type: &str, recipients: usize) {
    info!(
        event = "notify.dispatched",
        object_id = %object_id,
        notif_type = %notif_type,
        recipients = recipients,
    );
}

pub fn emit_notification_failed(object_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "notify.failed", object_id = %object_id, error = %error);
}
