//! Conflict resolution and window selection
//!
//! Two windows conflict when their `[start, end)` intervals overlap over the
//! same strip, or, with [`ConflictScope::SharedResource`], on the same sensor
//! anywhere. Greedy selection walks candidates in rank order and keeps every
//! window that conflicts with nothing already kept. Exact selection solves
//! weighted interval scheduling per strip.

use crate::config::{ConflictScope, SelectionConfig, SelectionStrategy};
use crate::model::{ScoredWindow, SelectedWindow, StripId};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Keeps zero-confidence windows in exact solutions when nothing conflicts
const EXACT_EPSILON: f64 = 0.000001000;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub strategy: SelectionStrategy,
    pub conflict_scope: ConflictScope,
    pub exact_max_windows: usize,
    pub min_confidence: f64,
    /// Ties in confidence go to the window closest to this instant
    pub window_center: Option<DateTime<Utc>>,
}

impl SelectionPolicy {
    pub fn from_config(config: &SelectionConfig, window_center: Option<DateTime<Utc>>) -> Self {
        Self {
            strategy: config.strategy,
            conflict_scope: config.conflict_scope,
            exact_max_windows: config.exact_max_windows,
            min_confidence: config.min_confidence,
            window_center,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default(), None)
    }
}

/// Whether `a` and `b` may not both be selected
pub fn conflicts(a: &ScoredWindow, b: &ScoredWindow, scope: ConflictScope) -> bool {
    if !a.overlaps(b) {
        return false;
    }
    a.strip_id() == b.strip_id()
        || (scope == ConflictScope::SharedResource
            && a.candidate.resource_id == b.candidate.resource_id)
}

/// Select a conflict-free subset, returned ordered by start time then strip
pub fn select(scored: Vec<ScoredWindow>, policy: &SelectionPolicy) -> Vec<SelectedWindow> {
    let total = scored.len();
    let eligible: Vec<ScoredWindow> = scored
        .into_iter()
        .filter(|w| w.confidence_score >= policy.min_confidence)
        .collect();
    if eligible.len() < total {
        debug!(
            "Dropped {} windows below confidence {:.1}",
            total - eligible.len(),
            policy.min_confidence
        );
    }

    let exact = match policy.strategy {
        SelectionStrategy::Greedy => false,
        SelectionStrategy::Exact => true,
        SelectionStrategy::Auto => eligible.len() <= policy.exact_max_windows,
    };
    // Per-strip DP cannot see cross-strip sensor conflicts
    let exact = exact && policy.conflict_scope == ConflictScope::Strip;

    let mut selected = if exact {
        select_exact(eligible, policy)
    } else {
        select_greedy(eligible, policy)
    };

    selected.sort_by(|a, b| {
        a.window
            .candidate
            .start_time
            .cmp(&b.window.candidate.start_time)
            .then_with(|| a.window.strip_id().cmp(&b.window.strip_id()))
            .then_with(|| a.window.candidate.resource_id.cmp(&b.window.candidate.resource_id))
    });

    info!(
        "Selected {} of {} windows ({})",
        selected.len(),
        total,
        if exact { "exact" } else { "greedy" }
    );
    selected
}

/// Descending confidence, then proximity to the window centre, then
/// start, strip and resource for a total order
fn rank(a: &ScoredWindow, b: &ScoredWindow, center: Option<DateTime<Utc>>) -> Ordering {
    b.confidence_score
        .total_cmp(&a.confidence_score)
        .then_with(|| match center {
            Some(c) => distance_to(a, c).cmp(&distance_to(b, c)),
            None => Ordering::Equal,
        })
        .then_with(|| a.candidate.start_time.cmp(&b.candidate.start_time))
        .then_with(|| a.strip_id().cmp(&b.strip_id()))
        .then_with(|| a.candidate.resource_id.cmp(&b.candidate.resource_id))
}

fn distance_to(w: &ScoredWindow, center: DateTime<Utc>) -> i64 {
    (w.candidate.midpoint() - center).num_milliseconds().abs()
}

fn select_greedy(mut windows: Vec<ScoredWindow>, policy: &SelectionPolicy) -> Vec<SelectedWindow> {
    windows.sort_by(|a, b| rank(a, b, policy.window_center));

    let mut accepted: Vec<SelectedWindow> = Vec::new();
    for window in windows {
        let blocker = accepted
            .iter_mut()
            .find(|kept| conflicts(&kept.window, &window, policy.conflict_scope));
        match blocker {
            Some(kept) => kept.displaced += 1,
            None => accepted.push(SelectedWindow {
                window,
                displaced: 0,
            }),
        }
    }
    accepted
}

fn select_exact(windows: Vec<ScoredWindow>, policy: &SelectionPolicy) -> Vec<SelectedWindow> {
    let mut by_strip: BTreeMap<StripId, Vec<ScoredWindow>> = BTreeMap::new();
    for w in windows {
        by_strip.entry(w.strip_id()).or_default().push(w);
    }

    let mut selected = Vec::new();
    for (_, strip_windows) in by_strip {
        selected.extend(schedule_strip(strip_windows, policy));
    }
    selected
}

/// Weighted interval scheduling over one strip's windows
fn schedule_strip(mut windows: Vec<ScoredWindow>, policy: &SelectionPolicy) -> Vec<SelectedWindow> {
    windows.sort_by(|a, b| {
        a.candidate
            .end_time
            .cmp(&b.candidate.end_time)
            .then_with(|| rank(a, b, policy.window_center))
    });
    let n = windows.len();

    // predecessor[j]: number of windows ending at or before window j starts
    let predecessor: Vec<usize> = windows
        .iter()
        .map(|w| windows.partition_point(|o| o.candidate.end_time <= w.candidate.start_time))
        .collect();

    let weight = |w: &ScoredWindow| w.confidence_score.max(0.0) + EXACT_EPSILON;
    let mut best = vec![0.0f64; n + 1];
    for j in 1..=n {
        let take = weight(&windows[j - 1]) + best[predecessor[j - 1]];
        best[j] = take.max(best[j - 1]);
    }

    let mut chosen = BTreeSet::new();
    let mut j = n;
    while j > 0 {
        let take = weight(&windows[j - 1]) + best[predecessor[j - 1]];
        if take >= best[j - 1] {
            chosen.insert(j - 1);
            j = predecessor[j - 1];
        } else {
            j -= 1;
        }
    }

    let mut selected: Vec<SelectedWindow> = chosen
        .iter()
        .map(|&i| SelectedWindow {
            window: windows[i].clone(),
            displaced: 0,
        })
        .collect();
    selected.sort_by(|a, b| rank(&a.window, &b.window, policy.window_center));

    for (i, w) in windows.iter().enumerate() {
        if chosen.contains(&i) {
            continue;
        }
        if let Some(kept) = selected
            .iter_mut()
            .find(|kept| conflicts(&kept.window, w, ConflictScope::Strip))
        {
            kept.displaced += 1;
        }
    }
    selected
}

/// Coverage-weighted mean confidence: Σ(score · coverage) / Σ coverage
pub fn aggregate_confidence(selected: &[SelectedWindow]) -> f64 {
    let coverage: f64 = selected.iter().map(|s| s.window.candidate.coverage_fraction).sum();
    if coverage <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = selected
        .iter()
        .map(|s| s.window.confidence_score * s.window.candidate.coverage_fraction)
        .sum();
    weighted / coverage
}

/// Strips with no selected window
pub fn uncovered_strips(
    strips: impl IntoIterator<Item = StripId>,
    selected: &[SelectedWindow],
) -> Vec<StripId> {
    let covered: BTreeSet<StripId> = selected.iter().map(|s| s.window.strip_id()).collect();
    let mut missing: Vec<StripId> = strips.into_iter().filter(|s| !covered.contains(s)).collect();
    missing.sort();
    missing.dedup();
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::{pass, t0};
    use crate::model::{AssetType, CandidateWindow};
    use chrono::Duration;
    use proptest::prelude::*;

    fn scored(strip: u32, resource: &str, start_min: i64, minutes: i64, confidence: f64) -> ScoredWindow {
        let candidate = CandidateWindow {
            strip_id: StripId(strip),
            start_time: t0() + Duration::minutes(start_min),
            end_time: t0() + Duration::minutes(start_min + minutes),
            ..pass(resource, 0, 0, 1.0)
        };
        ScoredWindow {
            candidate,
            asset_type: AssetType::Infrastructure,
            confidence_score: confidence,
            resolution_score: 1.0,
            detection_score: 1.0,
            coverage_score: 1.0,
            spectral_score: 1.0,
        }
    }

    fn policy(strategy: SelectionStrategy, scope: ConflictScope) -> SelectionPolicy {
        SelectionPolicy {
            strategy,
            conflict_scope: scope,
            ..Default::default()
        }
    }

    #[test]
    fn test_scenario_3_keeps_higher_confidence() {
        let windows = vec![scored(0, "sat-a", 0, 10, 60.0), scored(0, "sat-b", 5, 10, 90.0)];
        for strategy in [SelectionStrategy::Greedy, SelectionStrategy::Exact] {
            let selected = select(windows.clone(), &policy(strategy, ConflictScope::Strip));
            assert_eq!(selected.len(), 1);
            assert_eq!(selected[0].window.confidence_score, 90.0);
            assert_eq!(selected[0].displaced, 1);
            assert_eq!(aggregate_confidence(&selected), 90.0);
        }
    }

    #[test]
    fn test_non_overlapping_windows_all_kept() {
        let windows = vec![
            scored(0, "sat-a", 0, 10, 60.0),
            scored(0, "sat-a", 10, 10, 70.0),
            scored(0, "sat-b", 30, 10, 80.0),
        ];
        let selected = select(windows, &SelectionPolicy::default());
        assert_eq!(selected.len(), 3);
        // ordered by start time
        assert!(selected
            .windows(2)
            .all(|p| p[0].window.candidate.start_time <= p[1].window.candidate.start_time));
    }

    #[test]
    fn test_cross_strip_conflicts_follow_scope() {
        let windows = vec![scored(0, "sat-a", 0, 10, 80.0), scored(1, "sat-a", 5, 10, 70.0)];

        let per_strip = select(windows.clone(), &policy(SelectionStrategy::Greedy, ConflictScope::Strip));
        assert_eq!(per_strip.len(), 2);

        let shared = select(
            windows,
            &policy(SelectionStrategy::Greedy, ConflictScope::SharedResource),
        );
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].window.strip_id(), StripId(0));
    }

    #[test]
    fn test_exact_beats_greedy_on_chains() {
        let windows = vec![
            scored(0, "sat-a", 0, 10, 60.0),
            scored(0, "sat-b", 5, 10, 70.0),
            scored(0, "sat-c", 10, 10, 60.0),
        ];
        let greedy = select(windows.clone(), &policy(SelectionStrategy::Greedy, ConflictScope::Strip));
        let exact = select(windows, &policy(SelectionStrategy::Exact, ConflictScope::Strip));
        let total = |s: &[SelectedWindow]| s.iter().map(|w| w.window.confidence_score).sum::<f64>();
        assert_eq!(total(&greedy), 70.0);
        assert_eq!(total(&exact), 120.0);
    }

    #[test]
    fn test_auto_switches_on_window_count() {
        let windows = vec![
            scored(0, "sat-a", 0, 10, 60.0),
            scored(0, "sat-b", 5, 10, 70.0),
            scored(0, "sat-c", 10, 10, 60.0),
        ];
        let mut auto = policy(SelectionStrategy::Auto, ConflictScope::Strip);
        assert_eq!(select(windows.clone(), &auto).len(), 2);
        auto.exact_max_windows = 2;
        assert_eq!(select(windows, &auto).len(), 1);
    }

    #[test]
    fn test_ties_go_to_window_nearest_centre() {
        let windows = vec![scored(0, "sat-a", 0, 30, 75.0), scored(0, "sat-b", 20, 30, 75.0)];
        let mut p = SelectionPolicy::default();
        p.window_center = Some(t0() + Duration::minutes(40));
        let selected = select(windows, &p);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].window.candidate.resource_id, "sat-b");
    }

    #[test]
    fn test_min_confidence_filters() {
        let windows = vec![scored(0, "sat-a", 0, 10, 40.0), scored(1, "sat-a", 0, 10, 80.0)];
        let mut p = SelectionPolicy::default();
        p.min_confidence = 50.0;
        let selected = select(windows, &p);
        assert_eq!(selected.len(), 1);
        assert_eq!(
            uncovered_strips([StripId(0), StripId(1)], &selected),
            vec![StripId(0)]
        );
    }

    #[test]
    fn test_aggregate_weights_by_coverage() {
        let mut a = scored(0, "sat-a", 0, 10, 90.0);
        a.candidate.coverage_fraction = 1.0;
        let mut b = scored(1, "sat-a", 20, 10, 60.0);
        b.candidate.coverage_fraction = 0.5;
        let selected = select(vec![a, b], &SelectionPolicy::default());
        assert!((aggregate_confidence(&selected) - 80.0).abs() < 1e-9);
        assert_eq!(aggregate_confidence(&[]), 0.0);
    }

    fn arb_windows() -> impl Strategy<Value = Vec<ScoredWindow>> {
        prop::collection::vec(
            (0u32..3, 0usize..3, 0i64..120, 1i64..30, 0.0f64..100.0),
            0..40,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .map(|(strip, res, start, len, conf)| {
                    scored(strip, ["sat-a", "sat-b", "sat-c"][res], start, len, conf)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_no_double_booking(windows in arb_windows(), exact in any::<bool>(), shared in any::<bool>()) {
            let strategy = if exact { SelectionStrategy::Exact } else { SelectionStrategy::Greedy };
            let scope = if shared { ConflictScope::SharedResource } else { ConflictScope::Strip };
            let selected = select(windows, &policy(strategy, scope));
            for (i, a) in selected.iter().enumerate() {
                for b in selected.iter().skip(i + 1) {
                    prop_assert!(!conflicts(&a.window, &b.window, scope));
                }
            }
        }

        #[test]
        fn prop_selection_dominates_discarded(windows in arb_windows(), exact in any::<bool>()) {
            let strategy = if exact { SelectionStrategy::Exact } else { SelectionStrategy::Greedy };
            let selected = select(windows.clone(), &policy(strategy, ConflictScope::Strip));
            for w in &windows {
                let kept = selected.iter().any(|s| s.window == *w);
                if kept {
                    continue;
                }
                let blocking: f64 = selected
                    .iter()
                    .filter(|s| conflicts(&s.window, w, ConflictScope::Strip))
                    .map(|s| s.window.confidence_score)
                    .sum();
                prop_assert!(blocking + 1e-3 >= w.confidence_score);
            }
        }

        #[test]
        fn prop_every_strip_with_candidates_is_covered(windows in arb_windows()) {
            let strips: BTreeSet<StripId> = windows.iter().map(|w| w.strip_id()).collect();
            let selected = select(windows, &SelectionPolicy::default());
            prop_assert!(uncovered_strips(strips, &selected).is_empty());
        }
    }
}
