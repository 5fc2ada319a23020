//! Frontier time merging between paired tiers.
//!
//! A frontier is the boundary between two consecutive intervals of a tier.
//! Two tiers with the same number of frontiers are merged pairwise: frontiers
//! closer than [`DIFF_THRESHOLD`] seconds are moved to their mean, the others
//! are left at the first tier's time and reported as conflicts.

use serde::{Deserialize, Serialize};

use crate::checkers::{SuffixPair, MERGED_TARGET, REF_TARGET};
use crate::error_log::{ErrorLog, TimeConflict};
use crate::scheme::CheckingScheme;
use crate::textgrid::{IntervalTier, TextGrid};

/// Maximum distance, in seconds, between two frontiers that can be merged.
pub const DIFF_THRESHOLD: f64 = 0.1;

/// Tolerance on the threshold comparison, so a distance written as `0.1` in
/// a file still counts as within the threshold.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// Boundary between intervals `index_before` and `index_after`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frontier {
    pub time: f64,
    pub index_before: usize,
    pub index_after: usize,
}

/// Frontiers of a tier, in time order.
pub fn frontiers(tier: &IntervalTier) -> Vec<Frontier> {
    tier.intervals
        .windows(2)
        .enumerate()
        .map(|(index, pair)| Frontier {
            time: pair[0].end,
            index_before: index,
            index_after: index + 1,
        })
        .collect()
}

/// Whether two frontier times can be merged automatically.
pub fn within_threshold(time_a: f64, time_b: f64) -> bool {
    (time_a - time_b).abs() <= DIFF_THRESHOLD + THRESHOLD_EPSILON
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error(
        "tiers {tier_a} and {tier_b} don't have the same number of frontiers ({count_a} and {count_b})"
    )]
    FrontierCountMismatch {
        tier_a: String,
        tier_b: String,
        count_a: usize,
        count_b: usize,
    },
}

/// Outcome of merging one frontier pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierMerge {
    pub time_a: f64,
    pub time_b: f64,
    pub index_before: usize,
    pub index_after: usize,
    pub could_merge: bool,
    pub merged_time: Option<f64>,
}

/// Outcome of merging two tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierMerge {
    pub tier_a: String,
    pub tier_b: String,
    pub frontiers: Vec<FrontierMerge>,
}

impl TierMerge {
    pub fn conflicts(&self) -> impl Iterator<Item = TimeConflict> + '_ {
        self.frontiers
            .iter()
            .filter(|frontier| !frontier.could_merge)
            .map(|frontier| TimeConflict {
                tier_a: self.tier_a.clone(),
                tier_b: self.tier_b.clone(),
                time_a: frontier.time_a,
                time_b: frontier.time_b,
                index_before: frontier.index_before,
                index_after: frontier.index_after,
                threshold: DIFF_THRESHOLD,
            })
    }
}

/// Merge outcome for a whole grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeResults {
    pub tier_merges: Vec<TierMerge>,
}

impl MergeResults {
    /// Every frontier pair that could not be merged.
    pub fn conflicts(&self) -> Vec<TimeConflict> {
        self.tier_merges
            .iter()
            .flat_map(TierMerge::conflicts)
            .collect()
    }

    pub fn conflict_count(&self) -> usize {
        self.tier_merges
            .iter()
            .flat_map(|merge| merge.frontiers.iter())
            .filter(|frontier| !frontier.could_merge)
            .count()
    }

    /// All frontiers were merged.
    pub fn is_complete(&self) -> bool {
        self.conflict_count() == 0
    }
}

/// Merge `tier_b`'s frontiers into a copy of `tier_a`.
///
/// The returned tier keeps `tier_a`'s name and labels. Mergeable frontiers are
/// moved to the mean of both times; conflicting ones keep `tier_a`'s time.
pub fn merge_tiers(
    tier_a: &IntervalTier,
    tier_b: &IntervalTier,
) -> Result<(IntervalTier, TierMerge), MergeError> {
    let frontiers_a = frontiers(tier_a);
    let frontiers_b = frontiers(tier_b);
    if frontiers_a.len() != frontiers_b.len() {
        return Err(MergeError::FrontierCountMismatch {
            tier_a: tier_a.name.clone(),
            tier_b: tier_b.name.clone(),
            count_a: frontiers_a.len(),
            count_b: frontiers_b.len(),
        });
    }

    let mut merged = tier_a.clone();
    let mut tier_merge = TierMerge {
        tier_a: tier_a.name.clone(),
        tier_b: tier_b.name.clone(),
        frontiers: Vec::with_capacity(frontiers_a.len()),
    };
    for (a, b) in frontiers_a.iter().zip(&frontiers_b) {
        let could_merge = within_threshold(a.time, b.time);
        let merged_time = could_merge.then(|| (a.time + b.time) / 2.0);
        if let Some(time) = merged_time {
            merged.intervals[a.index_before].end = time;
            merged.intervals[a.index_after].start = time;
        }
        tier_merge.frontiers.push(FrontierMerge {
            time_a: a.time,
            time_b: b.time,
            index_before: a.index_before,
            index_after: a.index_after,
            could_merge,
            merged_time,
        });
    }
    Ok((merged, tier_merge))
}

/// Merge every `upper`/`lower` pair of a stacked grid, in scheme order.
///
/// Pairs where either tier is absent are skipped. Returns, for each merged
/// pair, the radical, the merged tier and the untouched lower tier.
fn merge_pairs<'g>(
    grid: &'g TextGrid,
    scheme: &CheckingScheme,
    pair: SuffixPair,
) -> Result<(Vec<(String, IntervalTier, &'g IntervalTier)>, MergeResults), MergeError> {
    let mut merged = Vec::new();
    let mut results = MergeResults::default();
    for tier_scheme in scheme.tiers() {
        let upper = grid.tier(&pair.upper_name(&tier_scheme.name));
        let lower = grid.tier(&pair.lower_name(&tier_scheme.name));
        let (Some(upper), Some(lower)) = (upper, lower) else {
            continue;
        };
        let (tier, tier_merge) = merge_tiers(upper, lower)?;
        results.tier_merges.push(tier_merge);
        merged.push((tier_scheme.name.clone(), tier, lower));
    }
    Ok((merged, results))
}

/// Derive the `X-merged` / `X-target` grid from an accepted `X-ref` /
/// `X-target` grid.
pub fn derive_merged_times(
    merged_annots: &TextGrid,
    scheme: &CheckingScheme,
) -> Result<(TextGrid, MergeResults), MergeError> {
    let (pairs, results) = merge_pairs(merged_annots, scheme, REF_TARGET)?;
    let mut grid = merged_annots.empty_like();
    for (radical, merged, target) in pairs {
        grid.push(merged.renamed(MERGED_TARGET.upper_name(&radical)));
        grid.push(target.clone());
    }
    Ok((grid, results))
}

/// Collapse an accepted `X-merged` / `X-target` grid into the final grid,
/// whose tiers carry the scheme's own names.
pub fn resolve_final(
    merged_times: &TextGrid,
    scheme: &CheckingScheme,
) -> Result<(TextGrid, MergeResults), MergeError> {
    let (pairs, results) = merge_pairs(merged_times, scheme, MERGED_TARGET)?;
    let mut grid = merged_times.empty_like();
    for (radical, merged, _) in pairs {
        grid.push(merged.renamed(radical));
    }
    Ok((grid, results))
}

/// Log the conflicts of every mergeable pair of a stacked grid.
///
/// Pairs with different frontier counts are skipped: the stacked checks
/// already report them as structural errors.
pub(crate) fn report_conflicts(
    grid: &TextGrid,
    scheme: &CheckingScheme,
    pair: SuffixPair,
    log: &mut ErrorLog,
) {
    for tier_scheme in scheme.tiers() {
        let upper = grid.tier(&pair.upper_name(&tier_scheme.name));
        let lower = grid.tier(&pair.lower_name(&tier_scheme.name));
        let (Some(upper), Some(lower)) = (upper, lower) else {
            continue;
        };
        if let Ok((_, tier_merge)) = merge_tiers(upper, lower) {
            for conflict in tier_merge.conflicts() {
                log.log_conflict(conflict);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{ContentSpec, ParserRegistry, TierSpec};

    fn tier(name: &str, bounds: &[f64]) -> IntervalTier {
        bounds.windows(2).fold(
            IntervalTier::new(name, bounds[0], bounds[bounds.len() - 1]),
            |t, w| t.with_interval(w[0], w[1], "a"),
        )
    }

    fn scheme(names: &[&str]) -> CheckingScheme {
        let specs: Vec<TierSpec> = names
            .iter()
            .map(|name| TierSpec {
                name: name.to_string(),
                required: true,
                allow_empty: true,
                content: ContentSpec::Unchecked,
            })
            .collect();
        CheckingScheme::from_spec("s", &specs, &ParserRegistry::empty()).unwrap()
    }

    #[test]
    fn test_frontiers() {
        let fronts = frontiers(&tier("A", &[0.0, 1.0, 2.5, 3.0]));
        assert_eq!(fronts.len(), 2);
        assert_eq!(fronts[1].time, 2.5);
        assert_eq!((fronts[1].index_before, fronts[1].index_after), (1, 2));
        assert!(frontiers(&tier("A", &[0.0, 3.0])).is_empty());
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(within_threshold(1.0, 1.1));
        assert!(within_threshold(1.1, 1.0));
        assert!(!within_threshold(1.0, 1.1000001));
        assert!(!within_threshold(1.0, 1.2));
    }

    #[test]
    fn test_merge_tiers_moves_close_frontiers_to_mean() {
        let a = tier("A-ref", &[0.0, 1.0, 2.0, 3.0]);
        let b = tier("A-target", &[0.0, 1.04, 2.5, 3.0]);
        let (merged, tier_merge) = merge_tiers(&a, &b).unwrap();

        assert_eq!(merged.name, "A-ref");
        assert!((merged.intervals[0].end - 1.02).abs() < 1e-12);
        assert_eq!(merged.intervals[1].start, merged.intervals[0].end);
        // conflicting frontier keeps tier a's time
        assert_eq!(merged.intervals[1].end, 2.0);
        assert_eq!(merged.intervals[2].start, 2.0);

        assert!(tier_merge.frontiers[0].could_merge);
        assert!(!tier_merge.frontiers[1].could_merge);
        assert_eq!(tier_merge.frontiers[1].merged_time, None);
        let conflicts: Vec<_> = tier_merge.conflicts().collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].threshold, DIFF_THRESHOLD);
    }

    #[test]
    fn test_merge_tiers_refuses_count_mismatch() {
        let a = tier("A-ref", &[0.0, 1.0, 2.0]);
        let b = tier("A-target", &[0.0, 2.0]);
        assert_eq!(
            merge_tiers(&a, &b).unwrap_err(),
            MergeError::FrontierCountMismatch {
                tier_a: "A-ref".into(),
                tier_b: "A-target".into(),
                count_a: 1,
                count_b: 0,
            }
        );
    }

    #[test]
    fn test_derive_merged_times_and_resolve_final() {
        let grid = TextGrid::new("rec", 0.0, 3.0)
            .with_tier(tier("A-ref", &[0.0, 1.0, 3.0]))
            .with_tier(tier("A-target", &[0.0, 1.05, 3.0]))
            .with_tier(tier("B-ref", &[0.0, 2.0, 3.0]))
            .with_tier(tier("B-target", &[0.0, 2.4, 3.0]));
        let scheme = scheme(&["A", "B"]);

        let (times, results) = derive_merged_times(&grid, &scheme).unwrap();
        assert_eq!(
            times.tier_names(),
            vec!["A-merged", "A-target", "B-merged", "B-target"]
        );
        assert!((times.tier("A-merged").unwrap().intervals[0].end - 1.025).abs() < 1e-12);
        assert_eq!(times.tier("A-target").unwrap().intervals[0].end, 1.05);
        assert_eq!(results.conflict_count(), 1);
        assert_eq!(results.conflicts()[0].tier_a, "A-ref");

        let mut fixed = times.clone();
        fixed.tiers[3].intervals[0].end = 2.05;
        fixed.tiers[3].intervals[1].start = 2.05;
        let (final_grid, results) = resolve_final(&fixed, &scheme).unwrap();
        assert!(results.is_complete());
        assert_eq!(final_grid.tier_names(), vec!["A", "B"]);
        assert!((final_grid.tier("B").unwrap().intervals[0].end - 2.025).abs() < 1e-12);
    }
}
