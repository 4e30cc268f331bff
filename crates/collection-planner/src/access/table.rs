//! Pre-computed pass table oracle

use super::{AccessOracle, OracleError};
use crate::model::{AssetCapability, CandidateWindow, Strip, StripId, TemporalWindow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn full() -> f64 {
    1.0
}

/// One row of a pass table; rows without `strip_id` apply to every strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    #[serde(default)]
    pub strip_id: Option<StripId>,
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub achieved_resolution_m: f64,
    pub coverage_fraction: f64,
    #[serde(default = "full")]
    pub spectral_match: f64,
    #[serde(default = "full")]
    pub geometric_quality: f64,
    #[serde(default)]
    pub ground_distance_km: f64,
}

impl PassRecord {
    fn applies_to(&self, strip: StripId) -> bool {
        self.strip_id.map_or(true, |id| id == strip)
    }

    fn to_candidate(&self, strip: StripId) -> CandidateWindow {
        CandidateWindow {
            strip_id: strip,
            resource_id: self.resource_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            achieved_resolution_m: self.achieved_resolution_m,
            coverage_fraction: self.coverage_fraction,
            spectral_match: self.spectral_match,
            geometric_quality: self.geometric_quality,
            ground_distance_km: self.ground_distance_km,
        }
    }
}

pub struct PassTableOracle {
    records: Vec<PassRecord>,
}

impl PassTableOracle {
    pub fn new(records: Vec<PassRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AccessOracle for PassTableOracle {
    fn name(&self) -> &str {
        "pass-table"
    }

    async fn passes(
        &self,
        strip: &Strip,
        _capability: &AssetCapability,
        window: &TemporalWindow,
    ) -> Result<Vec<CandidateWindow>, OracleError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.applies_to(strip.id))
            .filter(|r| r.start_time < window.end && r.end_time > window.start)
            .map(|r| r.to_candidate(strip.id))
            .collect())
    }
}
