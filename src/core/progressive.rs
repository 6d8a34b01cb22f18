//! Termination and snapshot cadence for a progressively refined render.
//!
//! Grounded in `original_source/Application.cpp`'s `_updateQuitCond`/
//! `_saveIfRequired`: a render stops when either `numSamples` or
//! `numSeconds` is set and reached (`0` on either means "no limit", matching
//! the original's `!= 0` guards), and a mid-render snapshot is written every
//! `snapshot` samples when that option is non-zero, independent of whether
//! the whole render is also about to stop. `film::render_frame`'s
//! `should_continue` closure is this module's only consumer: it owns no
//! knowledge of tiles or pixels, only "how many samples so far, how much
//! wall clock has passed."

use std::time::Instant;

use crate::core::error::{BudgetKind, Error};

/// A sample-count limit, a wall-clock limit, or both — whichever is reached
/// first stops the render. `0`/`None` on a field disables that limit,
/// matching `Options::numSamples`/`numSeconds`'s own "zero means unset"
/// convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Budget {
    pub max_samples: Option<u64>,
    pub max_seconds: Option<f64>,
}

impl Budget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn samples(max_samples: u64) -> Self {
        Self {
            max_samples: Some(max_samples),
            max_seconds: None,
        }
    }

    pub fn seconds(max_seconds: f64) -> Self {
        Self {
            max_samples: None,
            max_seconds: Some(max_seconds),
        }
    }

    /// True once either limit that is actually set has been reached.
    pub fn exhausted(&self, samples_completed: u64, elapsed_seconds: f64) -> bool {
        if let Some(max) = self.max_samples {
            if samples_completed >= max {
                return true;
            }
        }
        if let Some(max) = self.max_seconds {
            if elapsed_seconds >= max {
                return true;
            }
        }
        false
    }

    /// The specific limit that was reached, for the driver's final status —
    /// budget exhaustion is not a failure (`error::exit_code` maps
    /// `Error::Budget` to `0`), but it shares `Error` so the same `Result`
    /// plumbing that reports `Error::Numerical`/`Error::Io` can report it.
    pub fn reached(&self, samples_completed: u64, elapsed_seconds: f64) -> Option<Error> {
        if let Some(max) = self.max_samples {
            if samples_completed >= max {
                return Some(Error::Budget(BudgetKind::Samples));
            }
        }
        if let Some(max) = self.max_seconds {
            if elapsed_seconds >= max {
                return Some(Error::Budget(BudgetKind::Seconds));
            }
        }
        None
    }
}

/// How often to persist a `.snapshot` image mid-render, in samples.
/// Grounded in `_saveIfRequired`'s `numSamples % _options.snapshot == 0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotPolicy {
    pub every: Option<u64>,
}

impl SnapshotPolicy {
    pub fn never() -> Self {
        Self { every: None }
    }

    pub fn every_n_samples(n: u64) -> Self {
        Self {
            every: if n == 0 { None } else { Some(n) },
        }
    }

    /// True when `samples_completed` lands exactly on a cadence boundary.
    /// `samples_completed == 0` never fires — there is nothing to snapshot
    /// before the first wave has committed.
    pub fn is_due(&self, samples_completed: u64) -> bool {
        match self.every {
            Some(n) if n > 0 => samples_completed > 0 && samples_completed % n == 0,
            _ => false,
        }
    }
}

/// Owns the render's start time and the two policies above, and exposes the
/// one closure `film::render_frame` actually needs. A thin wrapper — all
/// the real logic lives in `Budget`/`SnapshotPolicy`, which stay trivially
/// testable without a clock.
pub struct ProgressiveController {
    budget: Budget,
    snapshot: SnapshotPolicy,
    started_at: Instant,
}

impl ProgressiveController {
    pub fn new(budget: Budget, snapshot: SnapshotPolicy) -> Self {
        Self {
            budget,
            snapshot,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    pub fn snapshot_due(&self, samples_completed: u64) -> bool {
        self.snapshot.is_due(samples_completed)
    }

    /// `film::render_frame`'s `should_continue` predicate: `true` to keep
    /// going, `false` once the budget is exhausted. Polled between waves,
    /// never mid-tile, so the accumulator is always left holding a whole
    /// number of completed samples.
    pub fn should_continue(&self, samples_completed: u64) -> bool {
        !self.budget.exhausted(samples_completed, self.elapsed_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_budget_never_exhausts() {
        let budget = Budget::unbounded();
        assert!(!budget.exhausted(1_000_000, 1e9));
    }

    #[test]
    fn sample_budget_exhausts_at_the_target_count() {
        let budget = Budget::samples(10);
        assert!(!budget.exhausted(9, 0.0));
        assert!(budget.exhausted(10, 0.0));
        assert!(matches!(budget.reached(10, 0.0), Some(Error::Budget(BudgetKind::Samples))));
    }

    #[test]
    fn time_budget_exhausts_once_elapsed_reaches_the_target() {
        let budget = Budget::seconds(2.0);
        assert!(!budget.exhausted(0, 1.9));
        assert!(budget.exhausted(0, 2.0));
        assert!(matches!(budget.reached(0, 2.0), Some(Error::Budget(BudgetKind::Seconds))));
    }

    #[test]
    fn snapshot_cadence_zero_means_never() {
        let policy = SnapshotPolicy::every_n_samples(0);
        assert!(!policy.is_due(100));
    }

    #[test]
    fn snapshot_cadence_fires_on_multiples_but_not_on_zero() {
        let policy = SnapshotPolicy::every_n_samples(16);
        assert!(!policy.is_due(0));
        assert!(!policy.is_due(15));
        assert!(policy.is_due(16));
        assert!(policy.is_due(32));
        assert!(!policy.is_due(33));
    }

    #[test]
    fn error_budget_kind_matches_exit_code_zero() {
        assert_eq!(crate::core::error::exit_code(&Error::Budget(BudgetKind::Samples)), 0);
    }
}
