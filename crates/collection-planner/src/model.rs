//! Planning data model
//!
//! Inputs (`AreaOfInterest`, `AssetCapability`, `SearchRequirements`,
//! `TemporalWindow`) are validated on construction and immutable afterwards.
//! Intermediates (`Strip`, `CandidateWindow`, `ScoredWindow`) live for one
//! pipeline invocation. `CollectionPlan` is built by [`crate::assembler`].

use crate::config::TemporalConfig;
use crate::geometry;
use crate::{PlannerError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// ============================================================================
// Geometry
// ============================================================================

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// AOI geometry; polygons carry a closed exterior ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coordinate),
    Polygon(Vec<Coordinate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn from_coordinates(coords: &[Coordinate]) -> Option<Self> {
        let first = coords.first()?;
        let mut bbox = BoundingBox {
            min_lon: first.lon,
            min_lat: first.lat,
            max_lon: first.lon,
            max_lat: first.lat,
        };
        for c in coords.iter().skip(1) {
            bbox.min_lon = bbox.min_lon.min(c.lon);
            bbox.min_lat = bbox.min_lat.min(c.lat);
            bbox.max_lon = bbox.max_lon.max(c.lon);
            bbox.max_lat = bbox.max_lat.max(c.lat);
        }
        Some(bbox)
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// East-west extent in the local projection (km)
    pub fn width_km(&self) -> f64 {
        let proj = geometry::LocalProjection::centred_on(self.center());
        let (x0, _) = proj.project(Coordinate::new(self.min_lon, self.center().lat));
        let (x1, _) = proj.project(Coordinate::new(self.max_lon, self.center().lat));
        (x1 - x0).abs()
    }

    /// North-south extent in the local projection (km)
    pub fn height_km(&self) -> f64 {
        let proj = geometry::LocalProjection::centred_on(self.center());
        let (_, y0) = proj.project(Coordinate::new(self.center().lon, self.min_lat));
        let (_, y1) = proj.project(Coordinate::new(self.center().lon, self.max_lat));
        (y1 - y0).abs()
    }
}

/// Validated, immutable area of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Geometry", into = "Geometry")]
pub struct AreaOfInterest {
    geometry: Geometry,
    area_km2: f64,
    bounding_box: BoundingBox,
}

impl AreaOfInterest {
    /// Validate geometry and derive area and bounding box.
    ///
    /// Fails with [`PlannerError::Geometry`] for out-of-range coordinates,
    /// open or self-intersecting rings and zero-area polygons.
    pub fn new(geometry: Geometry) -> Result<Self> {
        geometry::validate_geometry(&geometry)?;

        let (area_km2, bounding_box) = match &geometry {
            Geometry::Point(c) => (
                0.0,
                BoundingBox {
                    min_lon: c.lon,
                    min_lat: c.lat,
                    max_lon: c.lon,
                    max_lat: c.lat,
                },
            ),
            Geometry::Polygon(ring) => {
                let bbox = BoundingBox::from_coordinates(ring)
                    .ok_or_else(|| PlannerError::Geometry("empty polygon".to_string()))?;
                let proj = geometry::LocalProjection::centred_on(bbox.center());
                (geometry::ring_area_km2(ring, &proj), bbox)
            }
        };

        Ok(Self {
            geometry,
            area_km2,
            bounding_box,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn is_point(&self) -> bool {
        matches!(self.geometry, Geometry::Point(_))
    }
}

impl TryFrom<Geometry> for AreaOfInterest {
    type Error = PlannerError;

    fn try_from(geometry: Geometry) -> Result<Self> {
        AreaOfInterest::new(geometry)
    }
}

impl From<AreaOfInterest> for Geometry {
    fn from(area: AreaOfInterest) -> Self {
        area.geometry
    }
}

// ============================================================================
// Assets and requirements
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    EnvironmentalMonitoring,
    Infrastructure,
    Agriculture,
    Custom,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::EnvironmentalMonitoring,
        AssetType::Infrastructure,
        AssetType::Agriculture,
        AssetType::Custom,
    ];
}

/// Asset size bounds (m)
pub const MIN_ASSET_SIZE_M: f64 = 0.5;
pub const MAX_ASSET_SIZE_M: f64 = 1000.0;

/// Detection limit bounds
pub const MIN_DETECTION_LIMIT: f64 = 0.1;
pub const MAX_DETECTION_LIMIT: f64 = 100.0;

/// Capability profile resolved from the asset catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCapability {
    pub asset_id: String,
    pub asset_type: AssetType,
    pub min_detectable_size_m: f64,
    pub detection_limit: f64,
    pub resolution_m: f64,
    #[serde(default)]
    pub spectral_bands: BTreeSet<String>,
    pub revisit_time_hours: f64,
    pub swath_width_km: f64,
}

impl AssetCapability {
    pub fn validate(&self) -> Result<()> {
        if self.asset_id.trim().is_empty() {
            return Err(PlannerError::Validation("asset_id must not be empty".into()));
        }
        if !(MIN_ASSET_SIZE_M..=MAX_ASSET_SIZE_M).contains(&self.min_detectable_size_m) {
            return Err(PlannerError::Validation(format!(
                "min_detectable_size_m {} outside [{}, {}]",
                self.min_detectable_size_m, MIN_ASSET_SIZE_M, MAX_ASSET_SIZE_M
            )));
        }
        if !(MIN_DETECTION_LIMIT..=MAX_DETECTION_LIMIT).contains(&self.detection_limit) {
            return Err(PlannerError::Validation(format!(
                "detection_limit {} outside [{}, {}]",
                self.detection_limit, MIN_DETECTION_LIMIT, MAX_DETECTION_LIMIT
            )));
        }
        for (name, value) in [
            ("resolution_m", self.resolution_m),
            ("revisit_time_hours", self.revisit_time_hours),
            ("swath_width_km", self.swath_width_km),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlannerError::Validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Stable hash of every field that influences access generation
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.asset_id.hash(&mut hasher);
        self.asset_type.hash(&mut hasher);
        self.min_detectable_size_m.to_bits().hash(&mut hasher);
        self.detection_limit.to_bits().hash(&mut hasher);
        self.resolution_m.to_bits().hash(&mut hasher);
        self.spectral_bands.hash(&mut hasher);
        self.revisit_time_hours.to_bits().hash(&mut hasher);
        self.swath_width_km.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementParameter {
    Temporal,
    Spatial,
    Spectral,
    Radiometric,
}

impl RequirementParameter {
    /// Accepted units with their factor to the parameter's base unit
    pub fn units(&self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Temporal => &[("seconds", 1.0), ("minutes", 60.0), ("hours", 3600.0)],
            Self::Spatial => &[("meters", 1.0), ("kilometers", 1000.0)],
            Self::Spectral => &[("nanometers", 1.0), ("micrometers", 1000.0)],
            Self::Radiometric => &[("bits", 1.0), ("levels", 1.0)],
        }
    }

    /// Valid range in base units (s, m, nm, bits)
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::Temporal => (1.0, 86_400.0),
            Self::Spatial => (0.1, 1000.0),
            Self::Spectral => (1.0, 2500.0),
            Self::Radiometric => (1.0, 16.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequirement {
    pub parameter: RequirementParameter,
    pub value: f64,
    pub unit: String,
}

impl SearchRequirement {
    pub fn new(parameter: RequirementParameter, value: f64, unit: impl Into<String>) -> Self {
        Self {
            parameter,
            value,
            unit: unit.into(),
        }
    }

    /// Value converted to the parameter's base unit
    pub fn base_value(&self) -> Result<f64> {
        let factor = self
            .parameter
            .units()
            .iter()
            .find(|(unit, _)| *unit == self.unit)
            .map(|(_, factor)| *factor)
            .ok_or_else(|| {
                PlannerError::Validation(format!(
                    "unit '{}' not valid for {:?}; expected one of {:?}",
                    self.unit,
                    self.parameter,
                    self.parameter
                        .units()
                        .iter()
                        .map(|(u, _)| *u)
                        .collect::<Vec<_>>()
                ))
            })?;

        if self.parameter == RequirementParameter::Radiometric && self.unit == "levels" {
            // levels are quantisation steps; express as bits
            if self.value < 2.0 {
                return Err(PlannerError::Validation(format!(
                    "radiometric levels must be at least 2, got {}",
                    self.value
                )));
            }
            return Ok(self.value.log2());
        }
        Ok(self.value * factor)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.value.is_finite() {
            return Err(PlannerError::Validation(format!(
                "{:?} value must be finite",
                self.parameter
            )));
        }
        let base = self.base_value()?;
        let (min, max) = self.parameter.range();
        if !(min..=max).contains(&base) {
            return Err(PlannerError::Validation(format!(
                "{:?} value {} {} outside [{}, {}] in base units",
                self.parameter, self.value, self.unit, min, max
            )));
        }
        Ok(())
    }
}

/// Requirement set with no duplicate `(parameter, unit)` pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SearchRequirement>", into = "Vec<SearchRequirement>")]
pub struct SearchRequirements(Vec<SearchRequirement>);

impl SearchRequirements {
    pub fn new(requirements: Vec<SearchRequirement>) -> Result<Self> {
        let mut seen = HashSet::new();
        for req in &requirements {
            req.validate()?;
            if !seen.insert((req.parameter, req.unit.clone())) {
                return Err(PlannerError::Validation(format!(
                    "duplicate requirement {:?} in {}",
                    req.parameter, req.unit
                )));
            }
        }
        Ok(Self(requirements))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchRequirement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strictest SPATIAL requirement in meters, if any
    pub fn resolution_target_m(&self) -> Option<f64> {
        self.strictest(RequirementParameter::Spatial)
    }

    /// Strictest TEMPORAL requirement as a pass-duration cap
    pub fn max_pass_duration(&self) -> Option<Duration> {
        self.strictest(RequirementParameter::Temporal)
            .map(|secs| Duration::milliseconds((secs * 1000.0).round() as i64))
    }

    fn strictest(&self, parameter: RequirementParameter) -> Option<f64> {
        self.0
            .iter()
            .filter(|r| r.parameter == parameter)
            .filter_map(|r| r.base_value().ok())
            .reduce(f64::min)
    }
}

impl TryFrom<Vec<SearchRequirement>> for SearchRequirements {
    type Error = PlannerError;

    fn try_from(requirements: Vec<SearchRequirement>) -> Result<Self> {
        SearchRequirements::new(requirements)
    }
}

impl From<SearchRequirements> for Vec<SearchRequirement> {
    fn from(requirements: SearchRequirements) -> Self {
        requirements.0
    }
}

/// Collection time window, `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TemporalWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(PlannerError::Validation(format!(
                "window start {} must precede end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Check the configured `MIN_DATE_RANGE`/`MAX_DATE_RANGE` bounds
    pub fn validate_range(&self, config: &TemporalConfig) -> Result<()> {
        if self.start >= self.end {
            return Err(PlannerError::Validation(
                "window start must precede end".to_string(),
            ));
        }
        let days = self.duration().num_seconds() as f64 / 86_400.0;
        if days < config.min_days as f64 || days > config.max_days as f64 {
            return Err(PlannerError::Validation(format!(
                "window spans {:.2} days; must be between {} and {} days",
                days, config.min_days, config.max_days
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn center(&self) -> DateTime<Utc> {
        self.start + self.duration() / 2
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end
    }
}

// ============================================================================
// Pipeline intermediates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StripId(pub u32);

impl fmt::Display for StripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strip-{:03}", self.0)
    }
}

/// Direction a strip is scanned in a boustrophedon sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanDirection {
    Ascending,
    Descending,
}

/// Swath-wide slice of an area of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strip {
    pub id: StripId,
    pub sequence_index: u32,
    /// Closed ring (a single coordinate for point AOIs)
    pub polygon: Vec<Coordinate>,
    pub centroid: Coordinate,
    pub area_km2: f64,
    /// Extent across the swath (km)
    pub width_km: f64,
    /// Extent along the strip (km)
    pub length_km: f64,
    pub overlap_fraction_with_neighbors: f64,
    pub scan_direction: ScanDirection,
}

impl Strip {
    /// Stable hash of the strip geometry, used in access cache keys
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.id.hash(&mut hasher);
        for c in &self.polygon {
            c.lon.to_bits().hash(&mut hasher);
            c.lat.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// One satellite access opportunity over one strip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateWindow {
    pub strip_id: StripId,
    /// Physical sensor resource (satellite/instrument) providing the pass
    pub resource_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub achieved_resolution_m: f64,
    pub coverage_fraction: f64,
    pub spectral_match: f64,
    pub geometric_quality: f64,
    /// Ground distance from the sub-satellite point to the strip at closest
    /// approach; 0 when the source does not report it
    #[serde(default)]
    pub ground_distance_km: f64,
}

impl CandidateWindow {
    /// Half-open `[start, end)` interval overlap
    pub fn overlaps(&self, other: &CandidateWindow) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start_time + self.duration() / 2
    }

    /// Range checks applied to every oracle result
    pub fn is_well_formed(&self) -> bool {
        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        self.start_time < self.end_time
            && self.achieved_resolution_m.is_finite()
            && self.achieved_resolution_m > 0.0
            && unit(self.coverage_fraction)
            && unit(self.spectral_match)
            && unit(self.geometric_quality)
    }
}

/// Candidate window with its confidence breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredWindow {
    #[serde(flatten)]
    pub candidate: CandidateWindow,
    pub asset_type: AssetType,
    /// Composite confidence (0-100)
    pub confidence_score: f64,
    pub resolution_score: f64,
    pub detection_score: f64,
    pub coverage_score: f64,
    pub spectral_score: f64,
}

impl ScoredWindow {
    pub fn strip_id(&self) -> StripId {
        self.candidate.strip_id
    }

    pub fn overlaps(&self, other: &ScoredWindow) -> bool {
        self.candidate.overlaps(&other.candidate)
    }
}

/// Window accepted by the conflict resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedWindow {
    #[serde(flatten)]
    pub window: ScoredWindow,
    /// Conflicting lower-ranked windows this one displaced
    pub displaced: usize,
}

// ============================================================================
// Collection plan
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Draft,
    Processing,
    Optimized,
    Failed,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Optimized | PlanStatus::Failed)
    }

    /// DRAFT → PROCESSING → OPTIMIZED | FAILED
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        matches!(
            (self, next),
            (PlanStatus::Draft, PlanStatus::Processing)
                | (PlanStatus::Processing, PlanStatus::Optimized)
                | (PlanStatus::Processing, PlanStatus::Failed)
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanStatus::Draft => "DRAFT",
            PlanStatus::Processing => "PROCESSING",
            PlanStatus::Optimized => "OPTIMIZED",
            PlanStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub asset_type: AssetType,
    pub confidence_score: f64,
}

/// Oracle failure that left a strip without candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripAccessFailure {
    pub strip_id: StripId,
    pub code: String,
    pub message: String,
}

/// Why a plan ended FAILED
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFailure {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsatisfied_strips: Vec<StripId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access_failures: Vec<StripAccessFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPlan {
    pub id: Uuid,
    pub search_id: String,
    pub asset_id: String,
    pub status: PlanStatus,
    pub window: TemporalWindow,
    /// Requirements the plan was created with, kept for downstream export
    #[serde(default)]
    pub requirements: SearchRequirements,
    /// Ordered by start time, ties by strip id
    pub collection_windows: Vec<SelectedWindow>,
    /// Coverage-weighted mean of selected window confidence (0-100)
    pub confidence_score: f64,
    pub capability_matrix: Vec<CapabilityEntry>,
    pub strip_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PlanFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionPlan {
    /// Move to `next`; terminal plans never change again
    pub(crate) fn transition(&mut self, next: PlanStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(PlannerError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn square(lon: f64, lat: f64, size_deg: f64) -> Geometry {
        Geometry::Polygon(vec![
            Coordinate::new(lon, lat),
            Coordinate::new(lon + size_deg, lat),
            Coordinate::new(lon + size_deg, lat + size_deg),
            Coordinate::new(lon, lat + size_deg),
            Coordinate::new(lon, lat),
        ])
    }

    #[test]
    fn test_area_of_interest_derives_area_and_bbox() {
        let aoi = AreaOfInterest::new(square(10.0, 0.0, 1.0)).unwrap();
        // ~111.19 km on a side at the equator
        assert!((aoi.area_km2() - 12_364.0).abs() < 50.0, "{}", aoi.area_km2());
        assert_eq!(aoi.bounding_box().max_lon, 11.0);
        assert!(!aoi.is_point());
    }

    #[test]
    fn test_area_of_interest_deserializes_through_validation() {
        let ok = r#"{"type":"Point","coordinates":{"lon":12.5,"lat":41.9}}"#;
        let aoi: AreaOfInterest = serde_json::from_str(ok).unwrap();
        assert!(aoi.is_point());

        let bad = r#"{"type":"Point","coordinates":{"lon":200.0,"lat":41.9}}"#;
        assert!(serde_json::from_str::<AreaOfInterest>(bad).is_err());
    }

    #[test]
    fn test_requirement_units_and_ranges() {
        assert!(SearchRequirement::new(RequirementParameter::Spatial, 5.0, "meters")
            .validate()
            .is_ok());
        // 2 km exceeds the 1000 m ceiling
        assert!(SearchRequirement::new(RequirementParameter::Spatial, 2.0, "kilometers")
            .validate()
            .is_err());
        assert!(SearchRequirement::new(RequirementParameter::Temporal, 5.0, "meters")
            .validate()
            .is_err());
        assert!(SearchRequirement::new(RequirementParameter::Radiometric, 4096.0, "levels")
            .validate()
            .is_ok());
        assert!(SearchRequirement::new(RequirementParameter::Spatial, -1.0, "meters")
            .validate()
            .is_err());
    }

    #[test]
    fn test_duplicate_requirements_rejected() {
        let reqs = vec![
            SearchRequirement::new(RequirementParameter::Spatial, 5.0, "meters"),
            SearchRequirement::new(RequirementParameter::Spatial, 3.0, "meters"),
        ];
        assert!(matches!(
            SearchRequirements::new(reqs),
            Err(PlannerError::Validation(_))
        ));

        // Same parameter, different unit is allowed
        let reqs = vec![
            SearchRequirement::new(RequirementParameter::Spatial, 5.0, "meters"),
            SearchRequirement::new(RequirementParameter::Spatial, 0.003, "kilometers"),
        ];
        let reqs = SearchRequirements::new(reqs).unwrap();
        assert!((reqs.resolution_target_m().unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_pass_duration() {
        let reqs = SearchRequirements::new(vec![SearchRequirement::new(
            RequirementParameter::Temporal,
            10.0,
            "minutes",
        )])
        .unwrap();
        assert_eq!(reqs.max_pass_duration(), Some(Duration::minutes(10)));
        assert_eq!(SearchRequirements::default().max_pass_duration(), None);
    }

    #[test]
    fn test_temporal_window_bounds() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert!(TemporalWindow::new(start, start).is_err());

        let config = TemporalConfig::default();
        let short = TemporalWindow::new(start, start + Duration::hours(6)).unwrap();
        assert!(short.validate_range(&config).is_err());

        let ok = TemporalWindow::new(start, start + Duration::days(7)).unwrap();
        assert!(ok.validate_range(&config).is_ok());
        assert_eq!(ok.center(), start + Duration::hours(84));

        let long = TemporalWindow::new(start, start + Duration::days(400)).unwrap();
        assert!(long.validate_range(&config).is_err());
    }

    #[test]
    fn test_plan_status_machine() {
        assert!(PlanStatus::Draft.can_transition_to(PlanStatus::Processing));
        assert!(PlanStatus::Processing.can_transition_to(PlanStatus::Optimized));
        assert!(PlanStatus::Processing.can_transition_to(PlanStatus::Failed));
        assert!(!PlanStatus::Draft.can_transition_to(PlanStatus::Optimized));
        assert!(!PlanStatus::Optimized.can_transition_to(PlanStatus::Processing));
        assert!(!PlanStatus::Failed.can_transition_to(PlanStatus::Optimized));
        assert!(PlanStatus::Failed.is_terminal());
    }

    #[test]
    fn test_candidate_overlap_is_half_open() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let a = CandidateWindow {
            strip_id: StripId(0),
            resource_id: "sat-a".into(),
            start_time: t0,
            end_time: t0 + Duration::minutes(10),
            achieved_resolution_m: 3.0,
            coverage_fraction: 1.0,
            spectral_match: 1.0,
            geometric_quality: 1.0,
            ground_distance_km: 0.0,
        };
        let mut b = a.clone();
        b.start_time = a.end_time;
        b.end_time = a.end_time + Duration::minutes(10);
        assert!(!a.overlaps(&b));

        b.start_time = a.end_time - Duration::seconds(1);
        assert!(a.overlaps(&b));
        assert!(a.is_well_formed());
    }
}
