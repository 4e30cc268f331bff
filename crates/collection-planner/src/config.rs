//! Planner configuration
//!
//! Every tunable of the pipeline lives here. Defaults reproduce the
//! documented planning behaviour; a JSON file may override any subset.

use crate::model::AssetType;
use crate::{PlannerError, Result, DETECTION_FACTOR, EXACT_SELECTION_MAX_WINDOWS};
use crate::{MAX_DATE_RANGE_DAYS, MIN_DATE_RANGE_DAYS, MIN_USABLE_COVERAGE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Scoring weights (4-factor model, 9 decimal precision)
/// Sum = 1.000000000
pub const W_RESOLUTION: f64 = 0.300000000;
pub const W_DETECTION: f64 = 0.300000000;
pub const W_COVERAGE: f64 = 0.250000000;
pub const W_SPECTRAL: f64 = 0.150000000;

const WEIGHT_TOLERANCE: f64 = 0.000001000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub decomposer: DecomposerConfig,
    pub access: AccessConfig,
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub pipeline: PipelineConfig,
    pub temporal: TemporalConfig,
}

impl PlannerConfig {
    /// Load from a JSON file; missing sections keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Loading planner config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let config: PlannerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f64| -> Result<()> {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(PlannerError::Config(format!("{} must be in [0, 1], got {}", name, v)))
            }
        };

        fraction("decomposer.min_sliver_fraction", self.decomposer.min_sliver_fraction)?;
        fraction("decomposer.strip_overlap", self.decomposer.strip_overlap)?;
        if self.decomposer.strip_overlap >= 1.0 {
            return Err(PlannerError::Config(
                "decomposer.strip_overlap must be below 1".into(),
            ));
        }
        fraction("access.min_usable_coverage", self.access.min_usable_coverage)?;

        if self.access.max_attempts == 0 {
            return Err(PlannerError::Config("access.max_attempts must be at least 1".into()));
        }
        if self.access.timeout_ms == 0 {
            return Err(PlannerError::Config("access.timeout_ms must be positive".into()));
        }
        if !(self.scoring.detection_factor.is_finite() && self.scoring.detection_factor > 0.0) {
            return Err(PlannerError::Config("scoring.detection_factor must be positive".into()));
        }
        if !(self.scoring.detection_falloff.is_finite() && self.scoring.detection_falloff > 0.0) {
            return Err(PlannerError::Config("scoring.detection_falloff must be positive".into()));
        }

        let reference_km = self.scoring.detection_reference_km;
        if !(reference_km.is_finite() && reference_km > 0.0) {
            return Err(PlannerError::Config(
                "scoring.detection_reference_km must be positive".into(),
            ));
        }
        for (asset_type, factor) in &self.scoring.detection_limit_factors {
            if !(factor.is_finite() && *factor >= 0.0) {
                return Err(PlannerError::Config(format!(
                    "scoring.detection_limit_factors.{:?} must be non-negative, got {}",
                    asset_type, factor
                )));
            }
        }

        self.scoring.default_weights.validate("default")?;
        for (asset_type, weights) in &self.scoring.weights_by_asset_type {
            weights.validate(&format!("{:?}", asset_type))?;
        }

        if !(0.0..=100.0).contains(&self.selection.min_confidence) {
            return Err(PlannerError::Config(format!(
                "selection.min_confidence must be in [0, 100], got {}",
                self.selection.min_confidence
            )));
        }
        if self.temporal.min_days < 1 || self.temporal.min_days > self.temporal.max_days {
            return Err(PlannerError::Config(format!(
                "temporal range [{}, {}] days is invalid",
                self.temporal.min_days, self.temporal.max_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposerConfig {
    /// Strips smaller than this fraction of `swath × length` are merged
    pub min_sliver_fraction: f64,
    /// Alternate scan direction between consecutive strips
    pub boustrophedon: bool,
    /// Fractional overlap between neighbouring strips for mosaicking
    pub strip_overlap: f64,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            min_sliver_fraction: 0.01,
            boustrophedon: true,
            strip_overlap: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub min_usable_coverage: f64,
    /// Per-attempt oracle timeout
    pub timeout_ms: u64,
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt
    pub backoff_base_ms: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl AccessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            min_usable_coverage: MIN_USABLE_COVERAGE,
            timeout_ms: 20_000,
            max_attempts: 3,
            backoff_base_ms: 500,
            cache_enabled: true,
            cache_ttl_secs: 3600,
            cache_capacity: 1000,
        }
    }
}

/// Weights of the four confidence factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub resolution: f64,
    pub detection: f64,
    pub coverage: f64,
    pub spectral: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.resolution + self.detection + self.coverage + self.spectral
    }

    fn validate(&self, label: &str) -> Result<()> {
        let all = [self.resolution, self.detection, self.coverage, self.spectral];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PlannerError::Config(format!(
                "{} weights must be non-negative",
                label
            )));
        }
        if (self.sum() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(PlannerError::Config(format!(
                "{} weights sum to {:.9}, expected 1",
                label,
                self.sum()
            )));
        }
        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            resolution: W_RESOLUTION,
            detection: W_DETECTION,
            coverage: W_COVERAGE,
            spectral: W_SPECTRAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Pixels required across the smallest detectable target
    pub detection_factor: f64,
    /// Sampling ratio span over which detection falls from 1 to 0
    pub detection_falloff: f64,
    pub default_weights: ScoringWeights,
    pub weights_by_asset_type: BTreeMap<AssetType, ScoringWeights>,
    /// Growth of the detection limit per `detection_reference_km` of
    /// ground distance, by asset type
    pub detection_limit_factors: BTreeMap<AssetType, f64>,
    pub detection_reference_km: f64,
}

impl ScoringConfig {
    pub fn weights_for(&self, asset_type: AssetType) -> ScoringWeights {
        self.weights_by_asset_type
            .get(&asset_type)
            .copied()
            .unwrap_or(self.default_weights)
    }

    /// Unlisted asset types keep a neutral factor of 1
    pub fn detection_limit_factor(&self, asset_type: AssetType) -> f64 {
        self.detection_limit_factors
            .get(&asset_type)
            .copied()
            .unwrap_or(1.0)
    }
}

pub fn default_detection_limit_factors() -> BTreeMap<AssetType, f64> {
    BTreeMap::from([
        (AssetType::EnvironmentalMonitoring, 1.2),
        (AssetType::Infrastructure, 1.0),
        (AssetType::Agriculture, 1.1),
        (AssetType::Custom, 1.3),
    ])
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            detection_factor: DETECTION_FACTOR,
            detection_falloff: 3.0,
            default_weights: ScoringWeights::default(),
            weights_by_asset_type: BTreeMap::new(),
            detection_limit_factors: default_detection_limit_factors(),
            detection_reference_km: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Descending-confidence interval scheduling
    #[default]
    Greedy,
    /// Weighted interval scheduling by dynamic programming
    Exact,
    /// Exact up to `exact_max_windows`, greedy beyond
    Auto,
}

/// Which windows can conflict with each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictScope {
    /// Overlapping windows over the same strip
    #[default]
    Strip,
    /// Additionally, overlapping windows on the same sensor across strips
    SharedResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: SelectionStrategy,
    pub conflict_scope: ConflictScope,
    pub exact_max_windows: usize,
    /// Scored windows below this confidence never reach selection
    pub min_confidence: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::Greedy,
            conflict_scope: ConflictScope::Strip,
            exact_max_windows: EXACT_SELECTION_MAX_WINDOWS,
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent strip workers; 0 means available cores
    pub workers: usize,
}

impl PipelineConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub min_days: i64,
    pub max_days: i64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            min_days: MIN_DATE_RANGE_DAYS,
            max_days: MAX_DATE_RANGE_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = ScoringWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        let access = AccessConfig::default();
        assert_eq!(access.backoff(1), Duration::from_millis(500));
        assert_eq!(access.backoff(2), Duration::from_millis(1000));
        assert_eq!(access.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "access": {{ "max_attempts": 5 }},
                "selection": {{ "strategy": "exact" }},
                "scoring": {{
                    "weights_by_asset_type": {{
                        "AGRICULTURE": {{ "resolution": 0.2, "detection": 0.2, "coverage": 0.2, "spectral": 0.4 }}
                    }}
                }}
            }}"#
        )
        .unwrap();

        let config = PlannerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.access.max_attempts, 5);
        assert_eq!(config.access.timeout_ms, 20_000);
        assert_eq!(config.selection.strategy, SelectionStrategy::Exact);
        assert_eq!(config.scoring.weights_for(AssetType::Agriculture).spectral, 0.4);
        assert_eq!(
            config.scoring.weights_for(AssetType::Infrastructure),
            ScoringWeights::default()
        );
    }

    #[test]
    fn test_rejects_unbalanced_weights() {
        let mut config = PlannerConfig::default();
        config.scoring.default_weights.spectral = 0.5;
        assert!(matches!(config.validate(), Err(PlannerError::Config(_))));
    }

    #[test]
    fn test_detection_limit_factors() {
        let mut config = PlannerConfig::default();
        assert_eq!(config.scoring.detection_limit_factor(AssetType::Custom), 1.3);

        config.scoring.detection_limit_factors.remove(&AssetType::Custom);
        assert_eq!(config.scoring.detection_limit_factor(AssetType::Custom), 1.0);

        config.scoring.detection_limit_factors.insert(AssetType::Agriculture, -0.5);
        assert!(matches!(config.validate(), Err(PlannerError::Config(_))));

        let mut config = PlannerConfig::default();
        config.scoring.detection_reference_km = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut config = PlannerConfig::default();
        config.access.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_workers() {
        let pipeline = PipelineConfig { workers: 3 };
        assert_eq!(pipeline.effective_workers(), 3);
        assert!(PipelineConfig::default().effective_workers() >= 1);
    }
}
