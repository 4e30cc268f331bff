//! Planner run counters
//!
//! Lock-free tallies of optimize outcomes, read out as a [`MetricsSnapshot`].

use crate::model::{CollectionPlan, PlanStatus};
use crate::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PlannerMetrics {
    total_optimizations: AtomicU64,
    optimized: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    errors: AtomicU64,
    total_duration_ms: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_optimizations: u64,
    pub optimized: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Runs that returned an error other than cancellation
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub average_duration_ms: f64,
}

impl PlannerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one finished optimize run
    pub fn record(&self, outcome: &Result<CollectionPlan>, elapsed: Duration) {
        self.total_optimizations.fetch_add(1, Ordering::Relaxed);
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.total_duration_ms.fetch_add(millis, Ordering::Relaxed);

        let counter = match outcome {
            Ok(plan) if plan.status == PlanStatus::Optimized => &self.optimized,
            Ok(_) => &self.failed,
            Err(PlannerError::Cancelled) => &self.cancelled,
            Err(_) => &self.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters plus the access cache's `(hits, misses)`
    pub fn snapshot(&self, cache: (u64, u64)) -> MetricsSnapshot {
        let total = self.total_optimizations.load(Ordering::Relaxed);
        let duration = self.total_duration_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_optimizations: total,
            optimized: self.optimized.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits: cache.0,
            cache_misses: cache.1,
            average_duration_ms: if total == 0 {
                0.0
            } else {
                duration as f64 / total as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::test_window;
    use crate::assembler;
    use crate::model::{SearchRequirements, StripId};

    fn finished(covered: bool) -> CollectionPlan {
        let mut plan = assembler::draft("s", "a", test_window(), SearchRequirements::default());
        assembler::submit(&mut plan).unwrap();
        let strips = if covered { vec![] } else { vec![StripId(0)] };
        assembler::assemble(plan, &strips, vec![], vec![]).unwrap()
    }

    #[test]
    fn test_outcomes_are_tallied() {
        let metrics = PlannerMetrics::new();
        assert_eq!(metrics.snapshot((0, 0)).average_duration_ms, 0.0);

        metrics.record(&Ok(finished(true)), Duration::from_millis(100));
        metrics.record(&Ok(finished(false)), Duration::from_millis(300));
        metrics.record(&Err(PlannerError::Cancelled), Duration::from_millis(50));
        metrics.record(&Err(PlannerError::Validation("bad".into())), Duration::from_millis(10));

        let snapshot = metrics.snapshot((7, 3));
        assert_eq!(snapshot.total_optimizations, 4);
        assert_eq!(snapshot.optimized, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.cancelled, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!((snapshot.cache_hits, snapshot.cache_misses), (7, 3));
        assert!((snapshot.average_duration_ms - 115.0).abs() < 1e-9);
    }
}
