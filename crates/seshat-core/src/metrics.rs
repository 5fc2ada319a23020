//! Process-wide counters.
//!
//! Incremented at the call site; [`Metrics::flush`] logs the current values
//! as one `info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    checks_run: AtomicU64,
    submissions_accepted: AtomicU64,
    submissions_rejected: AtomicU64,
    merge_conflicts: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            checks_run: AtomicU64::new(0),
            submissions_accepted: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            merge_conflicts: AtomicU64::new(0),
        }
    }

    pub fn inc_checks_run(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_submission(&self, accepted: bool) {
        if accepted {
            self.submissions_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.submissions_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Add unresolved frontier conflicts found by a merge.
    pub fn add_merge_conflicts(&self, count: u64) {
        self.merge_conflicts.fetch_add(count, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            checks_run = self.checks_run(),
            submissions_accepted = self.submissions_accepted(),
            submissions_rejected = self.submissions_rejected(),
            merge_conflicts = self.merge_conflicts(),
        );
    }

    pub fn checks_run(&self) -> u64 {
        self.checks_run.load(Ordering::Relaxed)
    }

    pub fn submissions_accepted(&self) -> u64 {
        self.submissions_accepted.load(Ordering::Relaxed)
    }

    pub fn submissions_rejected(&self) -> u64 {
        self.submissions_rejected.load(Ordering::Relaxed)
    }

    pub fn merge_conflicts(&self) -> u64 {
        self.merge_conflicts.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.checks_run.store(0, Ordering::Relaxed);
        self.submissions_accepted.store(0, Ordering::Relaxed);
        self.submissions_rejected.store(0, Ordering::Relaxed);
        self.merge_conflicts.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_counters_split_by_outcome() {
        let m = Metrics::new();
        m.inc_submission(true);
        m.inc_submission(false);
        m.inc_submission(false);
        assert_eq!(m.submissions_accepted(), 1);
        assert_eq!(m.submissions_rejected(), 2);
    }

    #[test]
    fn test_reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_checks_run();
        m.add_merge_conflicts(4);
        assert_eq!(m.merge_conflicts(), 4);
        m.reset();
        assert_eq!(m.checks_run(), 0);
        assert_eq!(m.merge_conflicts(), 0);
    }
}
