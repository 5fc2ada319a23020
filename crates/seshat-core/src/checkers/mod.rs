//! Grid checkers, one per workflow stage.
//!
//! - [`check_single`]: a lone annotator's grid against the scheme.
//! - [`check_merged_annots`]: the stacked `X-ref` / `X-target` grid the
//!   reference annotator edits until labels agree.
//! - [`check_merged_times`]: the stacked `X-merged` / `X-target` grid used to
//!   resolve frontier timing conflicts.
//!
//! Later stages reuse the building blocks of earlier ones explicitly. Every
//! entry point owns a fresh [`ErrorLog`] and returns its [`ErrorSummary`].

pub mod single;
pub mod stacked;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use single::check_single;
pub use stacked::{build_merged_annots, check_merged_annots, check_merged_times};

use crate::error_log::{ErrorLog, ErrorSummary};
use crate::scheme::CheckingScheme;
use crate::textgrid::TextGrid;

/// Tier suffixes of a stacked grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixPair {
    pub upper: &'static str,
    pub lower: &'static str,
}

/// Suffixes of the merged-annotations grid.
pub const REF_TARGET: SuffixPair = SuffixPair {
    upper: "-ref",
    lower: "-target",
};

/// Suffixes of the merged-times grid.
pub const MERGED_TARGET: SuffixPair = SuffixPair {
    upper: "-merged",
    lower: "-target",
};

impl SuffixPair {
    pub fn upper_name(&self, radical: &str) -> String {
        format!("{radical}{}", self.upper)
    }

    pub fn lower_name(&self, radical: &str) -> String {
        format!("{radical}{}", self.lower)
    }

    /// Tier name with either suffix removed, or `None` if it carries neither.
    pub fn radical<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_suffix(self.upper)
            .or_else(|| name.strip_suffix(self.lower))
    }
}

/// Which checker applies to a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    Single,
    MergedAnnots,
    MergedTimes,
}

impl GridKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MergedAnnots => "merged_annots",
            Self::MergedTimes => "merged_times",
        }
    }

    /// Run the matching checker in a fresh log.
    pub fn check(self, grid: &TextGrid, scheme: &CheckingScheme) -> ErrorSummary {
        let mut log = ErrorLog::new();
        self.run(grid, scheme, &mut log);
        log.into_summary()
    }

    /// Run the matching checker, appending to `log`.
    pub fn run(self, grid: &TextGrid, scheme: &CheckingScheme, log: &mut ErrorLog) {
        match self {
            Self::Single => single::run_single(grid, scheme, log),
            Self::MergedAnnots => stacked::run_merged_annots(grid, scheme, log),
            Self::MergedTimes => stacked::run_merged_times(grid, scheme, log),
        }
        crate::metrics::METRICS.inc_checks_run();
        crate::obs::emit_check_completed(self, log);
    }
}

impl std::fmt::Display for GridKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural error per repeated tier name. Returns `false` when any
/// duplicate was found, in which case no further check is meaningful.
pub(crate) fn check_duplicate_tiers(grid: &TextGrid, log: &mut ErrorLog) -> bool {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for name in grid.tier_names() {
        if !seen.insert(name) && reported.insert(name) {
            log.log_structural(format!("Duplicate tier name: {name}"));
        }
    }
    reported.is_empty()
}

pub(crate) fn check_required_tiers(
    grid: &TextGrid,
    scheme: &CheckingScheme,
    suffix: &str,
    log: &mut ErrorLog,
) {
    for radical in scheme.required_tiers() {
        let name = format!("{radical}{suffix}");
        if grid.tier(&name).is_none() {
            log.log_structural(format!("The tier {name} is missing"));
        }
    }
}

pub(crate) fn check_unexpected_tiers<F>(grid: &TextGrid, is_expected: F, log: &mut ErrorLog)
where
    F: Fn(&str) -> bool,
{
    for name in grid.tier_names() {
        if !is_expected(name) {
            log.log_structural(format!("The tier {name} is unexpected (and thus invalid)"));
        }
    }
}
