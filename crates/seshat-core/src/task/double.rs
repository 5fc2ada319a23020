//! Task annotated independently by a reference and a target annotator, then
//! merged by the reference annotator in two passes (labels, then times).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{TaskError, TaskResult};
use super::meta::{GridDocument, TaskMeta};
use super::{check_text, conclude_submission, parse_submission, StageOutcome, Submission, TaskContext};
use crate::checkers::{build_merged_annots, GridKind};
use crate::error_log::{ErrorLog, ErrorSummary, TimeConflict};
use crate::gamma::GammaComputer;
use crate::merge::{self, MergeResults};
use crate::metrics::METRICS;
use crate::notify::{Notification, NotificationType};
use crate::obs;
use crate::scheme::CheckingScheme;
use crate::user::{Role, UserId};

const INITIAL_TEMPLATE_INSTRUCTIONS: &str =
    "Annotate the audio file using the template TextGrid from the starter archive.";
const WAIT_FOR_REFERENCE_INSTRUCTIONS: &str = "Wait for the reference annotator to finish their \
    annotation. Meanwhile you can still upload new versions of your file.";
const WAIT_FOR_TARGET_INSTRUCTIONS: &str = "Wait for the target annotator to finish their \
    annotation. Meanwhile you can still upload new versions of your file.";
const CANT_MAKE_MERGED_INSTRUCTIONS: &str = "Both files are in, but their tiers differ. Make sure \
    your TextGrid and your partner's declare the same tiers, then upload it again.";
const REF_MERGE_ANNOTS_INSTRUCTIONS: &str = "With the target annotator, agree on the annotations: \
    every pair of -ref and -target tiers must hold the same number of annotations with the same \
    labels. Timings do not have to match yet.";
const TARGET_MERGE_ANNOTS_INSTRUCTIONS: &str = "Join the reference annotator to agree on the \
    annotations. The merged file is edited and uploaded by the reference annotator.";
const REF_MERGE_TIMES_INSTRUCTIONS: &str = "With the target annotator, move the frontiers listed \
    below closer to their counterpart (less than 100ms apart), then upload the file.";
const TARGET_MERGE_TIMES_INSTRUCTIONS: &str = "Help the reference annotator move the frontiers \
    listed below. The file is uploaded by the reference annotator.";
const DONE_INSTRUCTIONS: &str = "The annotation task is done.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleStep {
    Pending,
    Parallel,
    TiersAgreement,
    MergingAnnots,
    MergingTimes,
    Done,
}

impl DoubleStep {
    pub const ALL: [DoubleStep; 6] = [
        Self::Pending,
        Self::Parallel,
        Self::TiersAgreement,
        Self::MergingAnnots,
        Self::MergingTimes,
        Self::Done,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Parallel => "Parallel Annotations",
            Self::TiersAgreement => "Agreement on tiers",
            Self::MergingAnnots => "Merging annotations",
            Self::MergingTimes => "Merging Times",
            Self::Done => "Done",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Steps where both annotators still work on their own file.
    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Pending | Self::Parallel | Self::TiersAgreement)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleAnnotatorTask {
    meta: TaskMeta,
    reference: UserId,
    target: UserId,
    ref_grid: Option<GridDocument>,
    target_grid: Option<GridDocument>,
    /// `X-ref` / `X-target` stack built from both annotations.
    merged_grid: Option<GridDocument>,
    /// Accepted stack with matching labels.
    merged_annots_grid: Option<GridDocument>,
    /// `X-merged` / `X-target` stack derived from `merged_annots_grid`.
    merged_times_grid: Option<GridDocument>,
    final_grid: Option<GridDocument>,
    merge_results: Option<MergeResults>,
    tiers_gamma: Option<BTreeMap<String, f64>>,
}

impl DoubleAnnotatorTask {
    pub const TASK_TYPE: &'static str = "Double Annotators";

    pub fn new(meta: TaskMeta, reference: UserId, target: UserId) -> Self {
        Self {
            meta,
            reference,
            target,
            ref_grid: None,
            target_grid: None,
            merged_grid: None,
            merged_annots_grid: None,
            merged_times_grid: None,
            final_grid: None,
            merge_results: None,
            tiers_gamma: None,
        }
    }

    pub fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    pub(crate) fn meta_mut(&mut self) -> &mut TaskMeta {
        &mut self.meta
    }

    pub fn reference(&self) -> &UserId {
        &self.reference
    }

    pub fn target(&self) -> &UserId {
        &self.target
    }

    pub fn annotators(&self) -> [&UserId; 2] {
        [&self.reference, &self.target]
    }

    fn annotator(&self, role: Role) -> &UserId {
        match role {
            Role::Reference => &self.reference,
            Role::Target => &self.target,
        }
    }

    pub fn role_of(&self, user: &UserId) -> TaskResult<Role> {
        if *user == self.reference {
            Ok(Role::Reference)
        } else if *user == self.target {
            Ok(Role::Target)
        } else {
            Err(TaskError::NotAssigned {
                task_id: self.meta.task_id.clone(),
                user: user.clone(),
            })
        }
    }

    pub fn ref_grid(&self) -> Option<&GridDocument> {
        self.ref_grid.as_ref()
    }

    pub fn target_grid(&self) -> Option<&GridDocument> {
        self.target_grid.as_ref()
    }

    pub fn merged_grid(&self) -> Option<&GridDocument> {
        self.merged_grid.as_ref()
    }

    pub fn merged_annots_grid(&self) -> Option<&GridDocument> {
        self.merged_annots_grid.as_ref()
    }

    pub fn merged_times_grid(&self) -> Option<&GridDocument> {
        self.merged_times_grid.as_ref()
    }

    pub fn final_grid(&self) -> Option<&GridDocument> {
        self.final_grid.as_ref()
    }

    pub fn merge_results(&self) -> Option<&MergeResults> {
        self.merge_results.as_ref()
    }

    pub fn tiers_gamma(&self) -> Option<&BTreeMap<String, f64>> {
        self.tiers_gamma.as_ref()
    }

    pub fn current_step(&self) -> DoubleStep {
        if self.final_grid.is_some() {
            DoubleStep::Done
        } else if self.merged_annots_grid.is_some() {
            DoubleStep::MergingTimes
        } else if self.merged_grid.is_some() {
            DoubleStep::MergingAnnots
        } else if self.ref_grid.is_some() && self.target_grid.is_some() {
            DoubleStep::TiersAgreement
        } else if self.meta.has_started() {
            DoubleStep::Parallel
        } else {
            DoubleStep::Pending
        }
    }

    pub fn is_done(&self) -> bool {
        self.current_step() == DoubleStep::Done
    }

    pub fn can_compute_gamma(&self) -> bool {
        self.current_step() >= DoubleStep::MergingAnnots
    }

    pub fn allow_file_upload(&self, user: &UserId) -> bool {
        let step = self.current_step();
        match self.role_of(user) {
            Ok(Role::Reference) => step != DoubleStep::Done,
            Ok(Role::Target) => step.is_parallel(),
            Err(_) => false,
        }
    }

    pub fn allow_starter_zip_dl(&self) -> bool {
        self.current_step().is_parallel()
    }

    /// Artifact the given annotator should download next.
    pub fn current_tg_template(&self, user: &UserId) -> &'static str {
        if self.final_grid.is_some() {
            return "final";
        }
        if self.merged_annots_grid.is_some() {
            return "merged_times";
        }
        if self.merged_grid.is_some() {
            return "merged";
        }
        match self.role_of(user) {
            Ok(Role::Reference) if self.ref_grid.is_some() => "ref",
            Ok(Role::Target) if self.target_grid.is_some() => "target",
            _ => "template",
        }
    }

    pub fn current_instructions(&self, user: &UserId) -> &'static str {
        let Ok(role) = self.role_of(user) else {
            return "";
        };
        let own = match role {
            Role::Reference => &self.ref_grid,
            Role::Target => &self.target_grid,
        };
        match (self.current_step(), role) {
            (DoubleStep::Done, _) => DONE_INSTRUCTIONS,
            (DoubleStep::MergingTimes, Role::Reference) => REF_MERGE_TIMES_INSTRUCTIONS,
            (DoubleStep::MergingTimes, Role::Target) => TARGET_MERGE_TIMES_INSTRUCTIONS,
            (DoubleStep::MergingAnnots, Role::Reference) => REF_MERGE_ANNOTS_INSTRUCTIONS,
            (DoubleStep::MergingAnnots, Role::Target) => TARGET_MERGE_ANNOTS_INSTRUCTIONS,
            (DoubleStep::TiersAgreement, _) => CANT_MAKE_MERGED_INSTRUCTIONS,
            (DoubleStep::Pending | DoubleStep::Parallel, _) if own.is_none() => {
                INITIAL_TEMPLATE_INSTRUCTIONS
            }
            (DoubleStep::Pending | DoubleStep::Parallel, Role::Reference) => {
                WAIT_FOR_TARGET_INSTRUCTIONS
            }
            (DoubleStep::Pending | DoubleStep::Parallel, Role::Target) => {
                WAIT_FOR_REFERENCE_INSTRUCTIONS
            }
        }
    }

    /// Frontiers still too far apart, shown while merging times.
    pub fn frontier_conflicts(&self) -> Vec<TimeConflict> {
        match (&self.merge_results, self.current_step()) {
            (Some(results), DoubleStep::MergingTimes) => results.conflicts(),
            _ => Vec::new(),
        }
    }

    /// Named artifacts in workflow order, absent ones included.
    pub fn artifacts(&self) -> Vec<(&'static str, Option<&GridDocument>)> {
        vec![
            ("template", self.meta.template.as_ref()),
            ("ref", self.ref_grid.as_ref()),
            ("target", self.target_grid.as_ref()),
            ("merged", self.merged_grid.as_ref()),
            ("merged_annots", self.merged_annots_grid.as_ref()),
            ("merged_times", self.merged_times_grid.as_ref()),
            ("final", self.final_grid.as_ref()),
        ]
    }

    /// Route a submitted grid to the current step's handler.
    ///
    /// The reference annotator may submit at every step but `Done`; the
    /// target annotator only while annotations are done in parallel. A
    /// refused call changes nothing, not even the upload audit.
    pub fn submit(
        &mut self,
        text: &str,
        annotator: &UserId,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<Submission> {
        self.meta.ensure_unlocked()?;
        let role = self.role_of(annotator)?;
        let step = self.current_step();
        let outcome = match (step, role) {
            (DoubleStep::Done, _) => {
                return Err(TaskError::Finished {
                    task_id: self.meta.task_id.clone(),
                })
            }
            (DoubleStep::MergingAnnots | DoubleStep::MergingTimes, Role::Target) => {
                return Err(TaskError::UploadNotAllowed {
                    role,
                    step: step.name(),
                })
            }
            (DoubleStep::Pending | DoubleStep::Parallel | DoubleStep::TiersAgreement, _) => {
                self.process_annotation(text, role, ctx)
            }
            (DoubleStep::MergingAnnots, Role::Reference) => self.process_merged_annots(text, ctx),
            (DoubleStep::MergingTimes, Role::Reference) => self.process_merged_times(text, ctx),
        };
        Ok(conclude_submission(&mut self.meta, step.name(), text, annotator, outcome, ctx.now))
    }

    /// Check a grid the way [`submit`](Self::submit) would at the current
    /// step, without recording anything.
    pub fn validate(
        &self,
        text: &str,
        annotator: &UserId,
        ctx: &TaskContext<'_>,
    ) -> TaskResult<ErrorSummary> {
        self.meta.ensure_unlocked()?;
        let role = self.role_of(annotator)?;
        let kind = match (role, self.current_step()) {
            (Role::Reference, DoubleStep::MergingAnnots) => GridKind::MergedAnnots,
            (Role::Reference, DoubleStep::MergingTimes) => GridKind::MergedTimes,
            _ => GridKind::Single,
        };
        Ok(check_text(kind, text, ctx.scheme))
    }

    /// Parallel annotation: store the sender's grid, then try to stack both
    /// grids once the two are in.
    fn process_annotation(&mut self, text: &str, role: Role, ctx: &TaskContext<'_>) -> StageOutcome {
        let mut log = ErrorLog::new();
        let Some(grid) = parse_submission(text, &mut log) else {
            return StageOutcome::rejected(log);
        };
        GridKind::Single.run(&grid, ctx.scheme, &mut log);
        if log.has_errors() {
            return StageOutcome::rejected(log);
        }

        let document = GridDocument::new(
            GridKind::Single,
            grid,
            vec![self.annotator(role).clone()],
            ctx.now,
        );
        match role {
            Role::Reference => self.ref_grid = Some(document),
            Role::Target => self.target_grid = Some(document),
        }

        let (Some(reference), Some(target)) = (&self.ref_grid, &self.target_grid) else {
            return StageOutcome::accepted(log);
        };
        // The sender's grid is kept even if stacking fails; the summary then
        // explains why the task stays in tiers agreement.
        let mut merge_log = ErrorLog::new();
        let Some(merged) = build_merged_annots(&reference.grid, &target.grid, &mut merge_log) else {
            return StageOutcome::accepted(merge_log);
        };

        self.merged_grid = Some(GridDocument::new(
            GridKind::MergedAnnots,
            merged,
            vec![self.reference.clone(), self.target.clone()],
            ctx.now,
        ));
        self.tiers_gamma = None;
        let mut outcome = StageOutcome::accepted(log);
        outcome.notify(Notification::task(
            NotificationType::Finished,
            &self.meta.task_id.0,
            format!(
                "The other annotator has finished their job on the double-annotation task for file {}",
                self.meta.data_file
            ),
            vec![self.annotator(role.other()).clone()],
        ));
        outcome
    }

    /// Labels agreed: keep the stack and derive the times-merging stack.
    fn process_merged_annots(&mut self, text: &str, ctx: &TaskContext<'_>) -> StageOutcome {
        let mut log = ErrorLog::new();
        let Some(grid) = parse_submission(text, &mut log) else {
            return StageOutcome::rejected(log);
        };
        GridKind::MergedAnnots.run(&grid, ctx.scheme, &mut log);
        if log.has_errors() || log.has_mismatches() {
            return StageOutcome::rejected(log);
        }
        let (times_grid, results) = match merge::derive_merged_times(&grid, ctx.scheme) {
            Ok(derived) => derived,
            Err(err) => {
                log.log_structural(err.to_string());
                return StageOutcome::rejected(log);
            }
        };

        let conflicts = results.conflict_count();
        obs::emit_merge_computed(&self.meta.task_id.0, results.tier_merges.len(), conflicts);
        METRICS.add_merge_conflicts(conflicts as u64);

        let creators = vec![self.reference.clone(), self.target.clone()];
        self.merged_annots_grid = Some(GridDocument::new(
            GridKind::MergedAnnots,
            grid,
            creators.clone(),
            ctx.now,
        ));
        self.merged_times_grid = Some(GridDocument::new(
            GridKind::MergedTimes,
            times_grid,
            creators,
            ctx.now,
        ));
        self.merge_results = Some(results);
        self.tiers_gamma = None;
        StageOutcome::accepted(log)
    }

    /// Times agreed: collapse the stack into the final grid.
    fn process_merged_times(&mut self, text: &str, ctx: &TaskContext<'_>) -> StageOutcome {
        let mut log = ErrorLog::new();
        let Some(grid) = parse_submission(text, &mut log) else {
            return StageOutcome::rejected(log);
        };
        GridKind::MergedTimes.run(&grid, ctx.scheme, &mut log);
        if log.has_errors() || log.has_mismatches() || log.has_conflicts() {
            return StageOutcome::rejected(log);
        }
        let (final_grid, results) = match merge::resolve_final(&grid, ctx.scheme) {
            Ok(resolved) => resolved,
            Err(err) => {
                log.log_structural(err.to_string());
                return StageOutcome::rejected(log);
            }
        };

        self.final_grid = Some(GridDocument::new(
            GridKind::Single,
            final_grid,
            vec![self.reference.clone(), self.target.clone()],
            ctx.now,
        ));
        self.merge_results = Some(results);
        self.meta.finish_time = Some(ctx.now);
        obs::emit_task_finished(&self.meta.task_id.0, &self.meta.data_file);

        let mut outcome = StageOutcome::accepted(log);
        outcome.notify(Notification::task(
            NotificationType::Finished,
            &self.meta.task_id.0,
            format!("The annotation task on file {} is done", self.meta.data_file),
            ctx.subscribers.to_vec(),
        ));
        outcome
    }

    /// Compute and cache per-tier agreement between the reference and target
    /// grids. Tiers whose computation fails are skipped with a warning.
    pub fn compute_gamma(
        &mut self,
        scheme: &CheckingScheme,
        computer: &dyn GammaComputer,
    ) -> TaskResult<&BTreeMap<String, f64>> {
        let step = self.current_step();
        let (Some(reference), Some(target), true) =
            (&self.ref_grid, &self.target_grid, self.can_compute_gamma())
        else {
            return Err(TaskError::GammaNotReady { step: step.name() });
        };

        let mut values = BTreeMap::new();
        for tier_scheme in scheme.tiers() {
            let (Some(ref_tier), Some(target_tier)) = (
                reference.grid.tier(&tier_scheme.name),
                target.grid.tier(&tier_scheme.name),
            ) else {
                continue;
            };
            match computer.tier_gamma(tier_scheme, ref_tier, target_tier) {
                Ok(Some(value)) => {
                    values.insert(tier_scheme.name.clone(), value);
                }
                Ok(None) => {}
                Err(err) => obs::emit_gamma_failed(&self.meta.data_file, &tier_scheme.name, &err),
            }
        }
        if values.is_empty() {
            return Err(TaskError::GammaUnavailable {
                data_file: self.meta.data_file.clone(),
            });
        }
        Ok(self.tiers_gamma.insert(values))
    }
}
