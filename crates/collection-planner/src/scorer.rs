//! Candidate window scoring
//!
//! Implements the 4-factor confidence model:
//! Confidence(w) = 100 · (w₁·R + w₂·D + w₃·C + w₄·S)
//!
//! - R: resolution adequacy, target / achieved capped at 1
//! - D: detection adequacy, full while the smallest target spans at least
//!   `detection_factor` pixels, then a linear falloff; scaled by how far the
//!   asset's detection limit degrades at the pass's ground distance
//! - C: strip coverage fraction
//! - S: spectral band match
//!
//! Pure and deterministic: no I/O, inputs are never mutated.

use crate::config::{ScoringConfig, ScoringWeights};
use crate::model::{
    AssetCapability, CandidateWindow, ScoredWindow, SearchRequirements, MAX_DETECTION_LIMIT,
    MIN_DETECTION_LIMIT,
};
use crate::MAX_CONFIDENCE;
use tracing::debug;

/// Scores candidates against one capability profile
#[derive(Debug, Clone)]
pub struct Scorer<'a> {
    capability: &'a AssetCapability,
    resolution_target_m: f64,
    weights: ScoringWeights,
    detection_factor: f64,
    detection_falloff: f64,
    limit_factor: f64,
    reference_km: f64,
}

impl<'a> Scorer<'a> {
    /// A SPATIAL requirement, when present, replaces the capability's
    /// resolution as the resolution target.
    pub fn new(
        capability: &'a AssetCapability,
        requirements: &SearchRequirements,
        config: &ScoringConfig,
    ) -> Self {
        Self {
            capability,
            resolution_target_m: requirements
                .resolution_target_m()
                .unwrap_or(capability.resolution_m),
            weights: config.weights_for(capability.asset_type),
            detection_factor: config.detection_factor,
            detection_falloff: config.detection_falloff,
            limit_factor: config.detection_limit_factor(capability.asset_type),
            reference_km: config.detection_reference_km,
        }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn score(&self, candidate: &CandidateWindow) -> ScoredWindow {
        let achieved = candidate.achieved_resolution_m;

        let resolution_score = resolution_score(self.resolution_target_m, achieved);
        let detection_score = detection_score(
            self.capability.min_detectable_size_m,
            achieved,
            self.detection_factor,
            self.detection_falloff,
        ) * detection_limit_retention(
            self.capability.detection_limit,
            candidate.ground_distance_km,
            self.limit_factor,
            self.reference_km,
        );
        let coverage_score = unit(candidate.coverage_fraction);
        let spectral_score = unit(candidate.spectral_match);

        let composite = self.weights.resolution * resolution_score
            + self.weights.detection * detection_score
            + self.weights.coverage * coverage_score
            + self.weights.spectral * spectral_score;
        let confidence_score = (MAX_CONFIDENCE * composite).clamp(0.0, MAX_CONFIDENCE);

        debug!(
            "Scored {} {}: {:.2} (res={:.2}, det={:.2}, cov={:.2}, spec={:.2})",
            candidate.strip_id,
            candidate.resource_id,
            confidence_score,
            resolution_score,
            detection_score,
            coverage_score,
            spectral_score
        );

        ScoredWindow {
            candidate: candidate.clone(),
            asset_type: self.capability.asset_type,
            confidence_score,
            resolution_score,
            detection_score,
            coverage_score,
            spectral_score,
        }
    }

    pub fn score_all(&self, candidates: &[CandidateWindow]) -> Vec<ScoredWindow> {
        candidates.iter().map(|c| self.score(c)).collect()
    }
}

/// Score one candidate with default scoring settings and no requirements
pub fn score(candidate: &CandidateWindow, capability: &AssetCapability) -> ScoredWindow {
    Scorer::new(capability, &SearchRequirements::default(), &ScoringConfig::default())
        .score(candidate)
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// target / achieved, capped at 1; under-resolved passes score below 1
pub fn resolution_score(target_m: f64, achieved_m: f64) -> f64 {
    if !(achieved_m.is_finite() && achieved_m > 0.0) {
        return 0.0;
    }
    unit(target_m / achieved_m)
}

/// 1 while `achieved · factor <= min_detectable`, then falls linearly to 0
/// once the sampling ratio exceeds 1 by `falloff`.
pub fn detection_score(min_detectable_m: f64, achieved_m: f64, factor: f64, falloff: f64) -> f64 {
    if !(achieved_m.is_finite() && achieved_m > 0.0 && min_detectable_m > 0.0) {
        return 0.0;
    }
    let sampling = achieved_m * factor / min_detectable_m;
    if sampling <= 1.0 {
        return 1.0;
    }
    unit(1.0 - (sampling - 1.0) / falloff)
}

/// Detection limit at `distance_km` from nadir: grows by `type_factor` per
/// `reference_km`, clamped to the valid limit range.
pub fn interpolate_detection_limit(
    base_limit: f64,
    distance_km: f64,
    type_factor: f64,
    reference_km: f64,
) -> f64 {
    let distance = if distance_km.is_finite() { distance_km.max(0.0) } else { 0.0 };
    let growth = if reference_km > 0.0 {
        distance / reference_km * type_factor.max(0.0)
    } else {
        0.0
    };
    (base_limit * (1.0 + growth)).clamp(MIN_DETECTION_LIMIT, MAX_DETECTION_LIMIT)
}

/// base / interpolated limit: 1 at nadir, shrinking with distance
pub fn detection_limit_retention(
    base_limit: f64,
    distance_km: f64,
    type_factor: f64,
    reference_km: f64,
) -> f64 {
    if base_limit.is_nan() {
        return 1.0;
    }
    let base = base_limit.clamp(MIN_DETECTION_LIMIT, MAX_DETECTION_LIMIT);
    unit(base / interpolate_detection_limit(base, distance_km, type_factor, reference_km))
}
