//! Campaigns: a checking scheme, its subscribers and the tasks assigned
//! under it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use seshat_state::TaskId;
use serde::Serialize;

use crate::checkers::GridKind;
use crate::notify::{Notification, NotificationType, ObjectType};
use crate::scheme::CheckingScheme;
use crate::task::{
    DoubleAnnotatorTask, GridDocument, SingleAnnotatorTask, Task, TaskContext, TaskMeta,
};
use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CampaignError {
    #[error("could not read the duration of {data_file}: {reason}")]
    Probe { data_file: String, reason: String },

    #[error("{data_file} has an invalid duration ({duration}s)")]
    InvalidDuration { data_file: String, duration: f64 },

    #[error("{user} cannot be both reference and target annotator")]
    SameAnnotator { user: UserId },
}

/// Reads the duration, in seconds, of a campaign data file.
pub trait DurationProbe: Send + Sync {
    fn duration(&self, data_file: &str) -> Result<f64, String>;
}

/// Probe answering the same duration for every file.
#[derive(Debug, Clone, Copy)]
pub struct FixedDuration(pub f64);

impl DurationProbe for FixedDuration {
    fn duration(&self, _data_file: &str) -> Result<f64, String> {
        Ok(self.0)
    }
}

/// Parameters shared by both assignment kinds.
#[derive(Debug, Clone, Copy)]
pub struct Assignment<'a> {
    pub data_file: &'a str,
    pub assigner: &'a UserId,
    pub deadline: Option<NaiveDate>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Campaign {
    pub slug: String,
    pub name: String,
    pub creator: UserId,
    pub subscribers: Vec<UserId>,
    pub scheme: Arc<CheckingScheme>,
    /// Whether starter archives include the audio file.
    pub serve_audio: bool,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        creator: UserId,
        scheme: CheckingScheme,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            subscribers: vec![creator.clone()],
            creator,
            scheme: Arc::new(scheme),
            serve_audio: false,
            created_at: now,
        }
    }

    pub fn context(&self, now: DateTime<Utc>) -> TaskContext<'_> {
        TaskContext {
            scheme: &self.scheme,
            subscribers: &self.subscribers,
            now,
        }
    }

    /// Blank grid for `data_file`, one empty tier per scheme tier.
    pub fn gen_template(
        &self,
        data_file: &str,
        probe: &dyn DurationProbe,
        creator: &UserId,
        now: DateTime<Utc>,
    ) -> Result<GridDocument, CampaignError> {
        let duration = probe
            .duration(data_file)
            .map_err(|reason| CampaignError::Probe {
                data_file: data_file.to_string(),
                reason,
            })?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(CampaignError::InvalidDuration {
                data_file: data_file.to_string(),
                duration,
            });
        }
        let stem = Path::new(data_file)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| data_file.to_string());
        Ok(GridDocument::new(
            GridKind::Single,
            self.scheme.gen_template(duration, &stem),
            vec![creator.clone()],
            now,
        ))
    }

    fn new_meta(
        &self,
        assignment: &Assignment<'_>,
        probe: &dyn DurationProbe,
    ) -> Result<TaskMeta, CampaignError> {
        let template =
            self.gen_template(assignment.data_file, probe, assignment.assigner, assignment.now)?;
        let mut meta = TaskMeta::new(
            TaskId::new(),
            self.slug.as_str(),
            assignment.data_file,
            assignment.assigner.clone(),
            assignment.now,
        );
        meta.deadline = assignment.deadline;
        meta.template = Some(template);
        Ok(meta)
    }

    pub fn assign_single(
        &self,
        assignment: &Assignment<'_>,
        annotator: &UserId,
        probe: &dyn DurationProbe,
    ) -> Result<(Task, Notification), CampaignError> {
        let meta = self.new_meta(assignment, probe)?;
        let task = SingleAnnotatorTask::new(meta, annotator.clone());
        Ok((task.into(), self.assignment_notification(vec![annotator.clone()])))
    }

    pub fn assign_double(
        &self,
        assignment: &Assignment<'_>,
        reference: &UserId,
        target: &UserId,
        probe: &dyn DurationProbe,
    ) -> Result<(Task, Notification), CampaignError> {
        if reference == target {
            return Err(CampaignError::SameAnnotator {
                user: reference.clone(),
            });
        }
        let meta = self.new_meta(assignment, probe)?;
        let task = DoubleAnnotatorTask::new(meta, reference.clone(), target.clone());
        Ok((
            task.into(),
            self.assignment_notification(vec![reference.clone(), target.clone()]),
        ))
    }

    fn assignment_notification(&self, annotators: Vec<UserId>) -> Notification {
        Notification {
            message: format!("You were assigned new tasks on campaign {}", self.name),
            notif_type: NotificationType::Assignment,
            object_type: ObjectType::Dashboard,
            object_id: self.slug.clone(),
            recipients: annotators,
        }
    }
}

/// Aggregated figures over a campaign's tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub single_annotator_tasks: usize,
    pub double_annotator_tasks: usize,
    /// Distinct data files with at least one task.
    pub assigned_files: usize,
    pub annotators: Vec<UserId>,
    /// Mean agreement per tier over the tasks where it was computed.
    pub tiers_gamma: BTreeMap<String, f64>,
    /// Some double task can have its agreement computed.
    pub can_update_gamma: bool,
}

impl CampaignStats {
    pub fn compute<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut stats = Self::default();
        let mut files = BTreeSet::new();
        let mut annotators = BTreeSet::new();
        let mut gamma_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for task in tasks {
            stats.total_tasks += 1;
            if task.is_done() {
                stats.completed_tasks += 1;
            }
            files.insert(task.meta().data_file.clone());
            annotators.extend(task.annotators());
            match task {
                Task::Single(_) => stats.single_annotator_tasks += 1,
                Task::Double(double) => {
                    stats.double_annotator_tasks += 1;
                    stats.can_update_gamma |= double.can_compute_gamma();
                }
            }
            for (tier, value) in task.tiers_gamma().into_iter().flatten() {
                let entry = gamma_sums.entry(tier.clone()).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        stats.assigned_files = files.len();
        stats.annotators = annotators.into_iter().collect();
        stats.tiers_gamma = gamma_sums
            .into_iter()
            .map(|(tier, (sum, count))| (tier, sum / count as f64))
            .collect();
        stats
    }

    pub fn completion_ratio(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.completed_tasks as f64 / self.total_tasks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{ContentSpec, ParserRegistry, TierSpec};

    struct BrokenProbe;

    impl DurationProbe for BrokenProbe {
        fn duration(&self, _data_file: &str) -> Result<f64, String> {
            Err("unsupported codec".into())
        }
    }

    fn campaign() -> Campaign {
        let specs = vec![TierSpec {
            name: "words".into(),
            required: true,
            allow_empty: true,
            content: ContentSpec::Unchecked,
        }];
        let scheme =
            CheckingScheme::from_spec("scheme", &specs, &ParserRegistry::empty()).unwrap();
        Campaign::new("corpus", "Corpus", UserId::new("admin"), scheme, Utc::now())
    }

    fn assignment<'a>(data_file: &'a str, assigner: &'a UserId) -> Assignment<'a> {
        Assignment {
            data_file,
            assigner,
            deadline: None,
            now: Utc::now(),
        }
    }

    #[test]
    fn test_assign_single_generates_template() {
        let campaign = campaign();
        let admin = UserId::new("admin");
        let (task, notification) = campaign
            .assign_single(
                &assignment("spk1/rec.wav", &admin),
                &UserId::new("ann"),
                &FixedDuration(4.0),
            )
            .unwrap();
        let template = &task.meta().template.as_ref().unwrap().grid;
        assert_eq!(template.name, "rec");
        assert_eq!(template.end, 4.0);
        assert_eq!(template.tier_names(), vec!["words"]);
        assert_eq!(notification.notif_type, NotificationType::Assignment);
        assert_eq!(notification.object_id, "corpus");
        assert_eq!(task.step_name(), "Pending");
    }

    #[test]
    fn test_assign_double_rejects_same_annotator() {
        let campaign = campaign();
        let admin = UserId::new("admin");
        let ann = UserId::new("ann");
        let err = campaign
            .assign_double(&assignment("a.wav", &admin), &ann, &ann, &FixedDuration(1.0))
            .unwrap_err();
        assert!(matches!(err, CampaignError::SameAnnotator { .. }));
    }

    #[test]
    fn test_probe_failures() {
        let campaign = campaign();
        let admin = UserId::new("admin");
        let err = campaign
            .assign_single(&assignment("a.wav", &admin), &admin, &BrokenProbe)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported codec"));
        let err = campaign
            .assign_single(&assignment("a.wav", &admin), &admin, &FixedDuration(0.0))
            .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidDuration { .. }));
    }

    #[test]
    fn test_stats_counts() {
        let campaign = campaign();
        let admin = UserId::new("admin");
        let probe = FixedDuration(2.0);
        let (single, _) = campaign
            .assign_single(&assignment("a.wav", &admin), &UserId::new("x"), &probe)
            .unwrap();
        let (double, _) = campaign
            .assign_double(
                &assignment("a.wav", &admin),
                &UserId::new("y"),
                &UserId::new("z"),
                &probe,
            )
            .unwrap();
        let stats = CampaignStats::compute([&single, &double]);
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.completed_tasks, 0);
        assert_eq!(stats.assigned_files, 1);
        assert_eq!(stats.single_annotator_tasks, 1);
        assert_eq!(stats.double_annotator_tasks, 1);
        assert_eq!(stats.annotators.len(), 3);
        assert!(!stats.can_update_gamma);
        assert_eq!(stats.completion_ratio(), 0.0);
        assert!(stats.tiers_gamma.is_empty());
    }
}
