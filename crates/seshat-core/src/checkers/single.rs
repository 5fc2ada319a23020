//! Checks for a grid produced by a single annotator.

use super::{check_duplicate_tiers, check_required_tiers, check_unexpected_tiers, GridKind};
use crate::error_log::{ErrorLog, ErrorSummary};
use crate::scheme::CheckingScheme;
use crate::textgrid::TextGrid;

/// Check a grid whose tiers are named exactly like the scheme's.
pub fn check_single(grid: &TextGrid, scheme: &CheckingScheme) -> ErrorSummary {
    GridKind::Single.check(grid, scheme)
}

pub(crate) fn run_single(grid: &TextGrid, scheme: &CheckingScheme, log: &mut ErrorLog) {
    if !check_duplicate_tiers(grid, log) {
        return;
    }
    check_required_tiers(grid, scheme, "", log);
    check_unexpected_tiers(grid, |name| scheme.contains(name), log);

    // Content checks still run on valid tiers when the tier set is wrong.
    for tier in &grid.tiers {
        if let Some(tier_scheme) = scheme.tier(&tier.name) {
            tier_scheme.check_tier(tier, log);
        }
    }
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
        CheckingScheme::from_spec("test", &specs, &ParserRegistry::with_builtins()).unwrap()
    }

    fn tier(name: &str, labels: &[&str]) -> IntervalTier {
        labels
            .iter()
            .enumerate()
            .fold(IntervalTier::new(name, 0.0, 2.0), |t, (i, l)| {
                t.with_interval(i as f64 * 0.5, (i + 1) as f64 * 0.5, *l)
            })
    }

    #[test]
    fn test_valid_grid() {
        let grid = TextGrid::new("g", 0.0, 2.0)
            .with_tier(tier("A", &["x", "", "y"]))
            .with_tier(tier("B", &["anything"]));
        let summary = check_single(&grid, &scheme());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_optional_tier_may_be_absent() {
        let grid = TextGrid::new("g", 0.0, 2.0).with_tier(tier("A", &["x"]));
        assert!(!check_single(&grid, &scheme()).has_errors);
    }

    #[test]
    fn test_missing_and_unexpected_still_check_content() {
        let grid = TextGrid::new("g", 0.0, 2.0)
            .with_tier(tier("B", &["ok"]))
            .with_tier(tier("C", &["?"]));
        let summary = check_single(&grid, &scheme());
        assert!(summary.has_errors);
        let messages: Vec<_> = summary.structural.iter().map(|e| e.msg.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "The tier A is missing",
                "The tier C is unexpected (and thus invalid)"
            ]
        );

        let grid = TextGrid::new("g", 0.0, 2.0)
            .with_tier(tier("A", &["x", "z"]))
            .with_tier(tier("C", &["?"]));
        let summary = check_single(&grid, &scheme());
        assert_eq!(summary.structural.len(), 1);
        assert_eq!(summary.annot["A"][0].index, 1);
    }

    #[test]
    fn test_duplicate_tiers_short_circuit() {
        let grid = TextGrid::new("g", 0.0, 2.0)
            .with_tier(tier("A", &["bad"]))
            .with_tier(tier("A", &["bad"]));
        let summary = check_single(&grid, &scheme());
        assert_eq!(summary.structural.len(), 1);
        assert!(summary.annot.is_empty());
    }
}
