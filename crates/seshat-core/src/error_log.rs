//! Per-check error accumulation.
//!
//! An [`ErrorLog`] is created by every check operation, filled by the
//! checkers and turned into an [`ErrorSummary`] when the operation ends.
//! Nothing is shared between operations: two checks running at the same time
//! on different tasks each own their log.
//!
//! Four categories are tracked. Structural and annotation errors block the
//! acceptance of a grid (`has_errors`). Annotation mismatches between the
//! reference and target annotator, and frontier time conflicts, are advisory:
//! they are reported so annotators can resolve them, but they never set
//! `has_errors`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::textgrid::Interval;

/// Something is wrong with the grid as a whole (tier set, topology,
/// unparseable file, unresolvable checker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralError {
    pub msg: String,
}

/// A specific interval's label is invalid for its tier scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationError {
    pub index: usize,
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub msg: String,
}

/// First interval where a reference tier and its target counterpart disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationMismatch {
    pub ref_tier: String,
    pub target_tier: String,
    pub index: usize,
    pub ref_label: String,
    pub target_label: String,
}

/// A frontier pair whose times are too far apart to be merged automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConflict {
    pub tier_a: String,
    pub tier_b: String,
    pub time_a: f64,
    pub time_b: f64,
    pub index_before: usize,
    pub index_after: usize,
    pub threshold: f64,
}

/// Accumulator for one check operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorLog {
    structural: Vec<StructuralError>,
    annot: BTreeMap<String, Vec<AnnotationError>>,
    mismatch: Vec<AnnotationMismatch>,
    timing: Vec<TimeConflict>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_structural(&mut self, msg: impl Into<String>) {
        self.structural.push(StructuralError { msg: msg.into() });
    }

    pub fn log_annot(
        &mut self,
        tier: &str,
        index: usize,
        interval: &Interval,
        msg: impl Into<String>,
    ) {
        self.annot
            .entry(tier.to_string())
            .or_default()
            .push(AnnotationError {
                index,
                label: interval.label.clone(),
                start: interval.start,
                end: interval.end,
                msg: msg.into(),
            });
    }

    pub fn log_mismatch(
        &mut self,
        ref_tier: &str,
        target_tier: &str,
        index: usize,
        ref_interval: &Interval,
        target_interval: &Interval,
    ) {
        self.mismatch.push(AnnotationMismatch {
            ref_tier: ref_tier.to_string(),
            target_tier: target_tier.to_string(),
            index,
            ref_label: ref_interval.label.clone(),
            target_label: target_interval.label.clone(),
        });
    }

    pub fn log_conflict(&mut self, conflict: TimeConflict) {
        self.timing.push(conflict);
    }

    /// Whether a blocking (structural or annotation) error was logged.
    pub fn has_errors(&self) -> bool {
        !self.structural.is_empty() || self.annot.values().any(|errors| !errors.is_empty())
    }

    pub fn has_mismatches(&self) -> bool {
        !self.mismatch.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        !self.timing.is_empty()
    }

    /// Nothing at all was logged, advisory entries included.
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_mismatches() && !self.has_conflicts()
    }

    pub fn structural(&self) -> &[StructuralError] {
        &self.structural
    }

    pub fn annotation_errors(&self, tier: &str) -> &[AnnotationError] {
        self.annot.get(tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mismatches(&self) -> &[AnnotationMismatch] {
        &self.mismatch
    }

    pub fn conflicts(&self) -> &[TimeConflict] {
        &self.timing
    }

    /// Close the operation and produce its serializable summary.
    pub fn into_summary(self) -> ErrorSummary {
        ErrorSummary {
            has_errors: self.has_errors(),
            structural: self.structural,
            annot: self.annot,
            annot_mismatch: self.mismatch,
            time_conflict: self.timing,
        }
    }
}

/// Serializable result of a check, returned to callers and clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub has_errors: bool,
    pub structural: Vec<StructuralError>,
    pub annot: BTreeMap<String, Vec<AnnotationError>>,
    pub annot_mismatch: Vec<AnnotationMismatch>,
    pub time_conflict: Vec<TimeConflict>,
}

impl ErrorSummary {
    /// No entry of any category.
    pub fn is_empty(&self) -> bool {
        !self.has_errors
            && self.structural.is_empty()
            && self.annot.values().all(Vec::is_empty)
            && self.annot_mismatch.is_empty()
            && self.time_conflict.is_empty()
    }

    /// Total number of annotation errors across tiers.
    pub fn annotation_count(&self) -> usize {
        self.annot.values().map(Vec::len).sum()
    }
}

impl From<ErrorLog> for ErrorSummary {
    fn from(log: ErrorLog) -> Self {
        log.into_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(label: &str) -> Interval {
        Interval::new(0.5, 1.0, label)
    }

    #[test]
    fn test_empty_log_has_no_errors() {
        let log = ErrorLog::new();
        assert!(!log.has_errors());
        assert!(log.is_clean());
        assert!(log.into_summary().is_empty());
    }

    #[test]
    fn test_structural_blocks() {
        let mut log = ErrorLog::new();
        log.log_structural("Duplicate tier name: A");
        assert!(log.has_errors());
        let summary = log.into_summary();
        assert!(summary.has_errors);
        assert_eq!(summary.structural[0].msg, "Duplicate tier name: A");
    }

    #[test]
    fn test_annotation_errors_keyed_by_tier_in_order() {
        let mut log = ErrorLog::new();
        log.log_annot("words", 3, &interval("x"), "first");
        log.log_annot("words", 7, &interval("y"), "second");
        log.log_annot("phones", 0, &interval(""), "third");
        assert!(log.has_errors());
        assert_eq!(log.annotation_errors("words").len(), 2);
        assert_eq!(log.annotation_errors("words")[1].index, 7);
        assert!(log.annotation_errors("missing").is_empty());
        assert_eq!(log.into_summary().annotation_count(), 3);
    }

    #[test]
    fn test_mismatch_and_conflict_are_advisory() {
        let mut log = ErrorLog::new();
        log.log_mismatch("A-ref", "A-target", 2, &interval("a"), &interval("b"));
        log.log_conflict(TimeConflict {
            tier_a: "A-merged".into(),
            tier_b: "A-target".into(),
            time_a: 1.0,
            time_b: 1.3,
            index_before: 0,
            index_after: 1,
            threshold: 0.1,
        });
        assert!(!log.has_errors());
        assert!(log.has_mismatches());
        assert!(log.has_conflicts());
        assert!(!log.is_clean());

        let summary = log.into_summary();
        assert!(!summary.has_errors);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_summary_json_shape() {
        let mut log = ErrorLog::new();
        log.log_structural("bad");
        log.log_annot("A", 0, &Interval::new(0.0, 1.0, "maybe"), "not a category");
        log.log_mismatch("A-ref", "A-target", 1, &interval("x"), &interval("y"));
        let json = serde_json::to_value(log.into_summary()).unwrap();

        assert_eq!(json["has_errors"], true);
        assert_eq!(json["structural"][0]["msg"], "bad");
        assert_eq!(json["annot"]["A"][0]["label"], "maybe");
        assert_eq!(json["annot"]["A"][0]["end"], 1.0);
        assert_eq!(json["annot_mismatch"][0]["ref_label"], "x");
        assert_eq!(json["annot_mismatch"][0]["target_tier"], "A-target");
        assert!(json["time_conflict"].as_array().unwrap().is_empty());
    }
}
