//! Seshat Core Library
//!
//! TextGrid checking against campaign schemes, two-annotator frontier
//! merging and the annotation task workflow.

pub mod campaign;
pub mod checkers;
pub mod error_log;
pub mod gamma;
pub mod merge;
pub mod metrics;
pub mod notify;
pub mod obs;
pub mod scheme;
pub mod service;
pub mod task;
pub mod telemetry;
pub mod textgrid;
pub mod user;

pub use campaign::{
    Assignment, Campaign, CampaignError, CampaignStats, DurationProbe, FixedDuration,
};
pub use checkers::{
    build_merged_annots, check_merged_annots, check_merged_times, check_single, GridKind,
    SuffixPair, MERGED_TARGET, REF_TARGET,
};
pub use error_log::{
    AnnotationError, AnnotationMismatch, ErrorLog, ErrorSummary, StructuralError, TimeConflict,
};
pub use gamma::{GammaComputer, GammaError};
pub use merge::{
    derive_merged_times, merge_tiers, resolve_final, FrontierMerge, MergeError, MergeResults,
    TierMerge, DIFF_THRESHOLD,
};
pub use notify::{
    LogNotifier, Notification, NotificationType, Notifier, NotifyError, ObjectType,
    RecordingNotifier,
};
pub use scheme::{
    AnnotationChecker, CheckingScheme, ContentSpec, InvalidAnnotation, ParserRef,
    ParserRegistry, PatternChecker, SchemeError, SchemeFile, SchemeFileError, TierContent,
    TierScheme, TierSpec,
};
pub use service::{ServiceError, ServiceResult, TaskService};
pub use task::{
    DoubleAnnotatorTask, DoubleStep, GridDocument, SingleAnnotatorTask, SingleStep, Submission,
    Task, TaskContext, TaskError, TaskMeta, TaskStatus,
};
pub use textgrid::{decode_textgrid_bytes, Interval, IntervalTier, ParseError, TextGrid};
pub use user::{Role, UserId};

pub use metrics::METRICS;
pub use obs::{emit_check_completed, emit_merge_computed, emit_task_finished, TaskSpan};
pub use telemetry::init_tracing;

pub use seshat_state::{DocumentId, DocumentStore, StorageError, TaskId, TaskStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
