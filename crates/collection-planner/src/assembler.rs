//! Plan Assembler
//!
//! The only code that builds or mutates a [`CollectionPlan`]. Status moves
//! DRAFT → PROCESSING → OPTIMIZED | FAILED through checked transitions;
//! terminal plans are never touched again.

use crate::model::{
    CapabilityEntry, CollectionPlan, PlanFailure, PlanStatus, SearchRequirements, SelectedWindow,
    StripAccessFailure, StripId, TemporalWindow,
};
use crate::selector::{aggregate_confidence, uncovered_strips};
use crate::{PlannerError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

/// New plan in DRAFT
pub fn draft(
    search_id: &str,
    asset_id: &str,
    window: TemporalWindow,
    requirements: SearchRequirements,
) -> CollectionPlan {
    let now = Utc::now();
    CollectionPlan {
        id: Uuid::new_v4(),
        search_id: search_id.to_string(),
        asset_id: asset_id.to_string(),
        status: PlanStatus::Draft,
        window,
        requirements,
        collection_windows: Vec::new(),
        confidence_score: 0.0,
        capability_matrix: Vec::new(),
        strip_count: 0,
        failure: None,
        created_at: now,
        updated_at: now,
    }
}

/// DRAFT → PROCESSING
pub fn submit(plan: &mut CollectionPlan) -> Result<()> {
    plan.transition(PlanStatus::Processing)
}

/// Max confidence per asset type, in asset-type order
pub fn capability_matrix(selected: &[SelectedWindow]) -> Vec<CapabilityEntry> {
    let mut best: BTreeMap<_, f64> = BTreeMap::new();
    for s in selected {
        let entry = best.entry(s.window.asset_type).or_insert(f64::MIN);
        *entry = entry.max(s.window.confidence_score);
    }
    best.into_iter()
        .map(|(asset_type, confidence_score)| CapabilityEntry {
            asset_type,
            confidence_score,
        })
        .collect()
}

/// Finish a PROCESSING plan from the resolver's output.
///
/// OPTIMIZED only when every strip has a selected window; otherwise FAILED
/// with an insufficient-coverage failure naming the bare strips. Selected
/// windows are kept on FAILED plans for inspection.
pub fn assemble(
    mut plan: CollectionPlan,
    strips: &[StripId],
    mut selected: Vec<SelectedWindow>,
    access_failures: Vec<StripAccessFailure>,
) -> Result<CollectionPlan> {
    if plan.status != PlanStatus::Processing {
        return Err(PlannerError::InvalidTransition {
            from: plan.status,
            to: PlanStatus::Optimized,
        });
    }

    selected.sort_by(|a, b| {
        a.window
            .candidate
            .start_time
            .cmp(&b.window.candidate.start_time)
            .then_with(|| a.window.strip_id().cmp(&b.window.strip_id()))
    });

    let uncovered = uncovered_strips(strips.iter().copied(), &selected);
    plan.confidence_score = aggregate_confidence(&selected);
    plan.capability_matrix = capability_matrix(&selected);
    plan.collection_windows = selected;
    plan.strip_count = strips.len();

    if uncovered.is_empty() {
        plan.transition(PlanStatus::Optimized)?;
        info!(
            "Plan {} OPTIMIZED: {} windows over {} strips, confidence {:.1}",
            plan.id,
            plan.collection_windows.len(),
            plan.strip_count,
            plan.confidence_score
        );
    } else {
        let err = PlannerError::InsufficientCoverage {
            strips: uncovered.clone(),
        };
        warn!("Plan {} FAILED: {}", plan.id, err);
        plan.failure = Some(PlanFailure {
            code: err.code().to_string(),
            message: err.to_string(),
            unsatisfied_strips: uncovered,
            access_failures,
        });
        plan.transition(PlanStatus::Failed)?;
    }
    Ok(plan)
}

/// PROCESSING → FAILED for a plan-level error (e.g. bad geometry)
pub fn fail(mut plan: CollectionPlan, err: &PlannerError) -> Result<CollectionPlan> {
    let unsatisfied_strips = match err {
        PlannerError::InsufficientCoverage { strips } => strips.clone(),
        _ => Vec::new(),
    };
    plan.transition(PlanStatus::Failed)?;
    plan.failure = Some(PlanFailure {
        code: err.code().to_string(),
        message: err.to_string(),
        unsatisfied_strips,
        access_failures: Vec::new(),
    });
    warn!("Plan {} FAILED: {}", plan.id, err);
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::{pass, t0, test_window};
    use crate::model::{AssetType, CandidateWindow, ScoredWindow};
    use chrono::Duration;

    fn selected(strip: u32, start_h: i64, confidence: f64, asset_type: AssetType) -> SelectedWindow {
        SelectedWindow {
            window: ScoredWindow {
                candidate: CandidateWindow {
                    strip_id: StripId(strip),
                    ..pass("sat-a", start_h, 10, 1.0)
                },
                asset_type,
                confidence_score: confidence,
                resolution_score: 1.0,
                detection_score: 1.0,
                coverage_score: 1.0,
                spectral_score: 1.0,
            },
            displaced: 0,
        }
    }

    fn processing() -> CollectionPlan {
        let mut plan = draft("search-1", "asset-1", test_window(), SearchRequirements::default());
        submit(&mut plan).unwrap();
        plan
    }

    #[test]
    fn test_full_coverage_is_optimized_and_ordered() {
        let plan = assemble(
            processing(),
            &[StripId(0), StripId(1)],
            vec![
                selected(1, 5, 70.0, AssetType::Infrastructure),
                selected(0, 2, 90.0, AssetType::Infrastructure),
                selected(0, 5, 80.0, AssetType::Infrastructure),
            ],
            Vec::new(),
        )
        .unwrap();

        assert_eq!(plan.status, PlanStatus::Optimized);
        assert!(plan.failure.is_none());
        let order: Vec<_> = plan
            .collection_windows
            .iter()
            .map(|w| (w.window.candidate.start_time, w.window.strip_id()))
            .collect();
        assert_eq!(
            order,
            vec![
                (t0() + Duration::hours(2), StripId(0)),
                (t0() + Duration::hours(5), StripId(0)),
                (t0() + Duration::hours(5), StripId(1)),
            ]
        );
        assert!((plan.confidence_score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_uncovered_strip_fails_plan() {
        let failures = vec![StripAccessFailure {
            strip_id: StripId(1),
            code: "access_oracle_timeout".into(),
            message: "timed out".into(),
        }];
        let plan = assemble(
            processing(),
            &[StripId(0), StripId(1)],
            vec![selected(0, 2, 90.0, AssetType::Custom)],
            failures,
        )
        .unwrap();

        assert_eq!(plan.status, PlanStatus::Failed);
        let failure = plan.failure.unwrap();
        assert_eq!(failure.code, "insufficient_coverage");
        assert_eq!(failure.unsatisfied_strips, vec![StripId(1)]);
        assert!(failure.message.contains("strip-001"));
        assert_eq!(failure.access_failures.len(), 1);
        assert_eq!(plan.collection_windows.len(), 1);
    }

    #[test]
    fn test_capability_matrix_takes_max_per_type() {
        let matrix = capability_matrix(&[
            selected(0, 1, 60.0, AssetType::Agriculture),
            selected(1, 2, 85.0, AssetType::Agriculture),
            selected(2, 3, 40.0, AssetType::EnvironmentalMonitoring),
        ]);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0].asset_type, AssetType::EnvironmentalMonitoring);
        assert_eq!(matrix[0].confidence_score, 40.0);
        assert_eq!(matrix[1].confidence_score, 85.0);
    }

    #[test]
    fn test_terminal_plans_are_immutable() {
        let plan = assemble(processing(), &[StripId(0)], vec![selected(0, 1, 50.0, AssetType::Custom)], vec![])
            .unwrap();
        assert!(matches!(
            assemble(plan.clone(), &[StripId(0)], vec![], vec![]),
            Err(PlannerError::InvalidTransition { .. })
        ));
        assert!(fail(plan, &PlannerError::Cancelled).is_err());
    }

    #[test]
    fn test_draft_cannot_be_assembled() {
        let plan = draft("s", "a", test_window(), SearchRequirements::default());
        assert!(assemble(plan, &[StripId(0)], vec![], vec![]).is_err());
    }

    #[test]
    fn test_fail_records_error() {
        let plan = fail(processing(), &PlannerError::Geometry("bowtie".into())).unwrap();
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(plan.failure.unwrap().code, "geometry_error");
    }
}
