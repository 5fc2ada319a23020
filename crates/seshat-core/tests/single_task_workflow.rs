//! Integration tests for the single-annotator workflow and the task-level
//! operations shared by both task kinds.

use chrono::Utc;

use seshat_core::{
    Assignment, Campaign, CheckingScheme, ContentSpec, FixedDuration, IntervalTier,
    NotificationType, ParserRegistry, SingleStep, Task, TaskError, TextGrid, TierSpec, UserId,
};

fn scheme() -> CheckingScheme {
    let specs = vec![
        TierSpec {
            name: "A".into(),
            required: true,
            allow_empty: true,
            content: ContentSpec::Categorical {
                categories: vec!["yes".into(), "no".into()],
            },
        },
        TierSpec {
            name: "B".into(),
            required: false,
            allow_empty: true,
            content: ContentSpec::Unchecked,
        },
    ];
    CheckingScheme::from_spec("yes-no", &specs, &ParserRegistry::with_builtins()).unwrap()
}

fn campaign() -> Campaign {
    let mut campaign = Campaign::new("corpus", "Corpus", UserId::new("admin"), scheme(), Utc::now());
    campaign.subscribers.push(UserId::new("supervisor"));
    campaign
}

fn annotator() -> UserId {
    UserId::new("carol")
}

fn new_task(campaign: &Campaign) -> Task {
    let admin = UserId::new("admin");
    let assignment = Assignment {
        data_file: "interview.wav",
        assigner: &admin,
        deadline: None,
        now: Utc::now(),
    };
    let (task, notification) = campaign
        .assign_single(&assignment, &annotator(), &FixedDuration(5.0))
        .unwrap();
    assert_eq!(notification.recipients, vec![annotator()]);
    assert_eq!(notification.notif_type, NotificationType::Assignment);
    task
}

fn grid(labels: &[&str]) -> String {
    let bounds = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
    let tier = labels.iter().enumerate().fold(
        IntervalTier::new("A", 0.0, 5.0),
        |t, (i, label)| t.with_interval(bounds[i], bounds[i + 1], *label),
    );
    TextGrid::new("interview", 0.0, 5.0).with_tier(tier).to_text()
}

// ── Submission ──

#[test]
fn unknown_category_is_one_annotation_error() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);

    let submission = task
        .submit(&grid(&["yes", "maybe", "no", "yes", "no"]), &annotator(), &ctx)
        .unwrap();

    assert!(!submission.accepted);
    assert!(submission.summary.has_errors);
    assert!(submission.summary.structural.is_empty());
    assert_eq!(submission.summary.annotation_count(), 1);
    let error = &submission.summary.annot["A"][0];
    assert_eq!(error.index, 1);
    assert_eq!(error.label, "maybe");
    assert_eq!(error.start, 1.0);
    assert!(!task.is_done());
    assert_eq!(task.step_name(), "In Progress");
}

#[test]
fn missing_required_tier_is_structural() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let task = new_task(&campaign);
    let text = TextGrid::new("interview", 0.0, 5.0)
        .with_tier(IntervalTier::blank("B", 0.0, 5.0))
        .to_text();

    let summary = task.validate(&text, &annotator(), &ctx).unwrap();
    assert!(summary.has_errors);
    assert_eq!(summary.structural[0].msg, "The tier A is missing");
}

#[test]
fn oversized_interval_count_is_structural() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);
    let text = grid(&["yes", "no"]).replacen(
        "intervals: size = 2",
        "intervals: size = 1000000000000000000",
        1,
    );

    let submission = task.submit(&text, &annotator(), &ctx).unwrap();
    assert!(!submission.accepted);
    assert_eq!(submission.summary.structural.len(), 1);
    assert!(submission.summary.structural[0].msg.contains("not a valid TextGrid"));
    assert_eq!(task.meta().uploads.len(), 1);
    assert!(!task.meta().uploads[0].is_valid);
}

#[test]
fn steps_only_move_forward() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);
    assert_eq!(task.step_name(), SingleStep::Pending.name());
    assert_eq!(task.all_steps(), vec!["Pending", "In Progress", "Done"]);

    let mut seen = vec![task.step_index()];
    task.log_download(&annotator(), "interview.TextGrid", Utc::now())
        .unwrap();
    seen.push(task.step_index());
    task.submit(&grid(&["maybe"]), &annotator(), &ctx).unwrap();
    seen.push(task.step_index());
    task.submit(&grid(&["yes", "no", "yes", "no", "yes"]), &annotator(), &ctx)
        .unwrap();
    seen.push(task.step_index());

    assert_eq!(seen, vec![0, 1, 1, 2]);
    assert!(task.is_done());
    assert_eq!(task.current_tg_template(&annotator()), "final");
}

#[test]
fn accepted_submission_notifies_subscribers() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);

    let text = grid(&["yes", "no"]);
    let submission = task.submit(&text, &annotator(), &ctx).unwrap();
    assert!(submission.accepted);
    assert!(submission.summary.is_empty());
    assert_eq!(submission.notifications.len(), 1);
    assert_eq!(
        submission.notifications[0].recipients,
        vec![UserId::new("admin"), UserId::new("supervisor")]
    );
    assert!(task.meta().finish_time.is_some());
    assert_eq!(task.meta().uploads.len(), 1);
    assert!(task.meta().uploads[0].is_valid);
    assert_eq!(task.meta().uploads[0].document, submission.upload);

    // an accepted grid stays valid when checked again
    assert!(!task.validate(&text, &annotator(), &ctx).unwrap().has_errors);
}

#[test]
fn done_task_refuses_further_uploads() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);
    task.submit(&grid(&["yes"]), &annotator(), &ctx).unwrap();
    assert!(task.is_done());
    assert!(!task.allow_file_upload(&annotator()));

    let err = task
        .submit(&grid(&["no"]), &annotator(), &ctx)
        .unwrap_err();
    assert!(matches!(err, TaskError::Finished { .. }));
    assert_eq!(task.meta().uploads.len(), 1);
}

#[test]
fn only_the_annotator_may_submit() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);
    let err = task
        .submit(&grid(&["yes"]), &UserId::new("admin"), &ctx)
        .unwrap_err();
    assert!(matches!(err, TaskError::NotAssigned { .. }));
    assert!(matches!(
        task.log_download(&UserId::new("admin"), "interview.TextGrid", Utc::now()),
        Err(TaskError::NotAssigned { .. })
    ));
}

// ── Locking ──

#[test]
fn lock_blocks_uploads_until_released() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);

    task.set_locked(true, Utc::now());
    assert!(task.is_locked());
    assert!(!task.allow_file_upload(&annotator()));
    assert!(matches!(
        task.submit(&grid(&["yes"]), &annotator(), &ctx),
        Err(TaskError::Locked { .. })
    ));
    assert!(matches!(
        task.add_comment(&annotator(), "hello", &ctx),
        Err(TaskError::Locked { .. })
    ));

    task.set_locked(false, Utc::now());
    assert!(task.submit(&grid(&["yes"]), &annotator(), &ctx).unwrap().accepted);
}

// ── Discussion ──

#[test]
fn comment_notifies_everyone_but_the_author() {
    let campaign = campaign();
    let ctx = campaign.context(Utc::now());
    let mut task = new_task(&campaign);

    let notification = task
        .add_comment(&UserId::new("admin"), "Please check tier A", &ctx)
        .unwrap();
    assert_eq!(notification.notif_type, NotificationType::Comment);
    assert_eq!(
        notification.recipients,
        vec![annotator(), UserId::new("supervisor")]
    );
    assert_eq!(task.meta().discussion.len(), 1);

    assert_eq!(
        task.add_comment(&annotator(), "   ", &ctx).unwrap_err(),
        TaskError::EmptyComment
    );
    assert_eq!(task.meta().discussion.len(), 1);
}
