//! Checks for stacked two-annotator grids.

use std::collections::BTreeSet;

use super::{
    check_duplicate_tiers, check_required_tiers, check_unexpected_tiers, GridKind, SuffixPair,
    MERGED_TARGET, REF_TARGET,
};
use crate::error_log::{ErrorLog, ErrorSummary};
use crate::merge;
use crate::scheme::CheckingScheme;
use crate::textgrid::TextGrid;

/// Check a `X-ref` / `X-target` grid.
///
/// Label mismatches between paired tiers are reported but do not set
/// `has_errors`.
pub fn check_merged_annots(grid: &TextGrid, scheme: &CheckingScheme) -> ErrorSummary {
    GridKind::MergedAnnots.check(grid, scheme)
}

/// Check a `X-merged` / `X-target` grid, reporting every frontier pair still
/// too far apart to be merged.
pub fn check_merged_times(grid: &TextGrid, scheme: &CheckingScheme) -> ErrorSummary {
    GridKind::MergedTimes.check(grid, scheme)
}

pub(crate) fn run_merged_annots(grid: &TextGrid, scheme: &CheckingScheme, log: &mut ErrorLog) {
    run_stacked(grid, scheme, REF_TARGET, log);
}

pub(crate) fn run_merged_times(grid: &TextGrid, scheme: &CheckingScheme, log: &mut ErrorLog) {
    if run_stacked(grid, scheme, MERGED_TARGET, log) {
        merge::report_conflicts(grid, scheme, MERGED_TARGET, log);
    }
}

/// Returns `false` if the grid had duplicate tiers and nothing else was
/// checked.
fn run_stacked(
    grid: &TextGrid,
    scheme: &CheckingScheme,
    pair: SuffixPair,
    log: &mut ErrorLog,
) -> bool {
    if !check_duplicate_tiers(grid, log) {
        return false;
    }
    for suffix in [pair.upper, pair.lower] {
        check_required_tiers(grid, scheme, suffix, log);
    }
    check_unexpected_tiers(
        grid,
        |name| pair.radical(name).is_some_and(|radical| scheme.contains(radical)),
        log,
    );

    for tier in &grid.tiers {
        if let Some(tier_scheme) = pair.radical(&tier.name).and_then(|r| scheme.tier(r)) {
            tier_scheme.check_tier(tier, log);
        }
    }

    for tier_scheme in scheme.tiers() {
        let upper_name = pair.upper_name(&tier_scheme.name);
        let lower_name = pair.lower_name(&tier_scheme.name);
        match (grid.tier(&upper_name), grid.tier(&lower_name)) {
            (Some(upper), Some(lower)) => {
                if upper.len() != lower.len() {
                    log.log_structural(format!(
                        "The tiers {upper_name} and {lower_name} don't have the same number of annotations ({} and {})",
                        upper.len(),
                        lower.len()
                    ));
                }
                let first_mismatch = upper
                    .iter()
                    .zip(lower.iter())
                    .enumerate()
                    .find(|(_, (a, b))| a.label != b.label);
                if let Some((index, (a, b))) = first_mismatch {
                    log.log_mismatch(&upper_name, &lower_name, index, a, b);
                }
            }
            // Missing required tiers were already reported.
            (Some(_), None) if !tier_scheme.required => {
                log.log_structural(format!(
                    "The tier {upper_name} has no counterpart {lower_name}"
                ));
            }
            (None, Some(_)) if !tier_scheme.required => {
                log.log_structural(format!(
                    "The tier {lower_name} has no counterpart {upper_name}"
                ));
            }
            _ => {}
        }
    }
    true
}

/// Stack the reference and target grids into a `X-ref` / `X-target` grid.
///
/// Both grids must declare the same tier names. On mismatch one structural
/// error is logged per tier lacking a counterpart and `None` is returned.
pub fn build_merged_annots(
    reference: &TextGrid,
    target: &TextGrid,
    log: &mut ErrorLog,
) -> Option<TextGrid> {
    let ref_names: BTreeSet<&str> = reference.tier_names().into_iter().collect();
    let target_names: BTreeSet<&str> = target.tier_names().into_iter().collect();
    if ref_names != target_names {
        for name in ref_names.difference(&target_names) {
            log.log_structural(format!(
                "The tier {name} of the reference annotator's TextGrid is missing from the target annotator's TextGrid"
            ));
        }
        for name in target_names.difference(&ref_names) {
            log.log_structural(format!(
                "The tier {name} of the target annotator's TextGrid is missing from the reference annotator's TextGrid"
            ));
        }
        return None;
    }

    let mut merged = TextGrid::new(
        reference.name.clone(),
        reference.start.min(target.start),
        reference.end.max(target.end),
    );
    for ref_tier in &reference.tiers {
        let target_tier = target.tier(&ref_tier.name)?;
        merged.push(ref_tier.renamed(REF_TARGET.upper_name(&ref_tier.name)));
        merged.push(target_tier.renamed(REF_TARGET.lower_name(&ref_tier.name)));
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{ContentSpec, ParserRegistry, TierSpec};
    use crate::textgrid::IntervalTier;

    fn scheme() -> CheckingScheme {
        let specs = vec![
            TierSpec {
                name: "A".into(),
                required: true,
                allow_empty: true,
                content: ContentSpec::Categorical {
                    categories: vec!["x".into(), "y".into()],
                },
            },
            TierSpec {
                name: "B".into(),
                required: false,
                allow_empty: true,
                content: ContentSpec::Unchecked,
            },
        ];
        CheckingScheme::from_spec("test", &specs, &ParserRegistry::empty()).unwrap()
    }

    fn tier(name: &str, bounds: &[f64], labels: &[&str]) -> IntervalTier {
        labels.iter().enumerate().fold(
            IntervalTier::new(name, 0.0, *bounds.last().unwrap_or(&0.0)),
            |t, (i, l)| t.with_interval(bounds[i], bounds[i + 1], *l),
        )
    }

    #[test]
    fn test_build_merged_interleaves_in_reference_order() {
        let reference = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("B", &[0.0, 2.0], &["note"]))
            .with_tier(tier("A", &[0.0, 1.0, 2.0], &["x", "y"]));
        let target = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A", &[0.0, 1.05, 2.0], &["x", "y"]))
            .with_tier(tier("B", &[0.0, 2.0], &["other"]));
        let mut log = ErrorLog::new();
        let merged = build_merged_annots(&reference, &target, &mut log).unwrap();
        assert!(log.is_clean());
        assert_eq!(
            merged.tier_names(),
            vec!["B-ref", "B-target", "A-ref", "A-target"]
        );
        assert_eq!(merged.tier("A-target").unwrap().intervals[0].end, 1.05);
    }

    #[test]
    fn test_build_merged_refuses_different_tier_sets() {
        let reference = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A", &[0.0, 2.0], &["x"]))
            .with_tier(tier("B", &[0.0, 2.0], &[""]));
        let target = TextGrid::new("rec", 0.0, 2.0).with_tier(tier("A", &[0.0, 2.0], &["x"]));
        let mut log = ErrorLog::new();
        assert!(build_merged_annots(&reference, &target, &mut log).is_none());
        assert_eq!(log.structural().len(), 1);
        assert!(log.structural()[0].msg.contains("tier B"));
    }

    #[test]
    fn test_merged_annots_mismatch_is_advisory() {
        let grid = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A-ref", &[0.0, 1.0, 2.0], &["x", "x"]))
            .with_tier(tier("A-target", &[0.0, 1.0, 2.0], &["x", "y"]));
        let summary = check_merged_annots(&grid, &scheme());
        assert!(!summary.has_errors);
        assert_eq!(summary.annot_mismatch.len(), 1);
        assert_eq!(summary.annot_mismatch[0].index, 1);
        assert_eq!(summary.annot_mismatch[0].ref_label, "x");
        assert_eq!(summary.annot_mismatch[0].target_label, "y");
    }

    #[test]
    fn test_merged_annots_parity_is_structural() {
        let grid = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A-ref", &[0.0, 1.0, 2.0], &["x", "y"]))
            .with_tier(tier("A-target", &[0.0, 2.0], &["x"]));
        let summary = check_merged_annots(&grid, &scheme());
        assert!(summary.has_errors);
        assert!(summary.structural[0].msg.contains("same number of annotations"));
        assert!(summary.annot_mismatch.is_empty());
    }

    #[test]
    fn test_merged_annots_symmetry_for_optional_tier() {
        let grid = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A-ref", &[0.0, 2.0], &["x"]))
            .with_tier(tier("A-target", &[0.0, 2.0], &["x"]))
            .with_tier(tier("B-ref", &[0.0, 2.0], &["n"]));
        let summary = check_merged_annots(&grid, &scheme());
        assert_eq!(summary.structural.len(), 1);
        assert_eq!(
            summary.structural[0].msg,
            "The tier B-ref has no counterpart B-target"
        );
    }

    #[test]
    fn test_merged_annots_unexpected_and_content() {
        let grid = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A-ref", &[0.0, 2.0], &["z"]))
            .with_tier(tier("A-target", &[0.0, 2.0], &["x"]))
            .with_tier(tier("A", &[0.0, 2.0], &["x"]));
        let summary = check_merged_annots(&grid, &scheme());
        assert_eq!(summary.structural.len(), 1);
        assert!(summary.structural[0].msg.contains("The tier A is unexpected"));
        assert_eq!(summary.annot["A-ref"].len(), 1);
    }

    #[test]
    fn test_merged_times_reports_conflicts() {
        let grid = TextGrid::new("rec", 0.0, 3.0)
            .with_tier(tier("A-merged", &[0.0, 1.0, 2.0, 3.0], &["x", "y", "x"]))
            .with_tier(tier("A-target", &[0.0, 1.05, 2.3, 3.0], &["x", "y", "x"]));
        let summary = check_merged_times(&grid, &scheme());
        assert!(!summary.has_errors);
        assert_eq!(summary.time_conflict.len(), 1);
        let conflict = &summary.time_conflict[0];
        assert_eq!(conflict.tier_a, "A-merged");
        assert_eq!(conflict.tier_b, "A-target");
        assert_eq!(conflict.index_before, 1);
        assert_eq!(conflict.index_after, 2);
        assert_eq!(conflict.time_b, 2.3);
    }

    #[test]
    fn test_merged_times_requires_suffixes() {
        let grid = TextGrid::new("rec", 0.0, 2.0)
            .with_tier(tier("A-ref", &[0.0, 2.0], &["x"]))
            .with_tier(tier("A-target", &[0.0, 2.0], &["x"]));
        let summary = check_merged_times(&grid, &scheme());
        let messages: Vec<_> = summary.structural.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "The tier A-merged is missing",
                "The tier A-ref is unexpected (and thus invalid)"
            ]
        );
        assert!(summary.time_conflict.is_empty());
    }
}
