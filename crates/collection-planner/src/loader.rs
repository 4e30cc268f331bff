//! Data loading from JSON / GeoJSON files and plan export

use crate::access::PassRecord;
use crate::model::{
    AreaOfInterest, AssetCapability, CollectionPlan, Coordinate, Geometry, SearchRequirement,
    SearchRequirements, Strip,
};
use crate::{PlannerError, Result};
use orbital_mechanics::Satellite;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Accept either a bare array or an object holding the array under `field`
fn array_or_field<T: DeserializeOwned>(raw: serde_json::Value, field: &str) -> Result<Vec<T>> {
    if let Some(inner) = raw.get(field) {
        Ok(serde_json::from_value(inner.clone())?)
    } else if raw.is_array() {
        Ok(serde_json::from_value(raw)?)
    } else {
        Err(PlannerError::Validation(format!(
            "expected a JSON array or an object with a '{}' array",
            field
        )))
    }
}

fn position(pos: &[f64]) -> Result<Coordinate> {
    match pos {
        [lon, lat, ..] => Ok(Coordinate::new(*lon, *lat)),
        _ => Err(PlannerError::Geometry(
            "positions need at least two values".to_string(),
        )),
    }
}

fn area_from_geometry(geometry: &geojson::Geometry) -> Result<AreaOfInterest> {
    let geometry = match &geometry.value {
        geojson::Value::Point(p) => Geometry::Point(position(p)?),
        geojson::Value::Polygon(rings) => {
            if rings.len() > 1 {
                warn!("Ignoring {} interior ring(s)", rings.len() - 1);
            }
            let exterior = rings
                .first()
                .ok_or_else(|| PlannerError::Geometry("polygon has no rings".to_string()))?;
            let ring = exterior
                .iter()
                .map(|p| position(p))
                .collect::<Result<Vec<_>>>()?;
            Geometry::Polygon(ring)
        }
        other => {
            let kind = match other {
                geojson::Value::MultiPoint(_) => "MultiPoint",
                geojson::Value::LineString(_) => "LineString",
                geojson::Value::MultiLineString(_) => "MultiLineString",
                geojson::Value::MultiPolygon(_) => "MultiPolygon",
                _ => "GeometryCollection",
            };
            return Err(PlannerError::Geometry(format!(
                "unsupported geometry type {}; expected Polygon or Point",
                kind
            )));
        }
    };
    AreaOfInterest::new(geometry)
}

/// Parse an AOI from GeoJSON text.
///
/// Accepts a bare geometry, a Feature, or a FeatureCollection (first feature
/// wins). Only Polygon and Point geometries are supported.
pub fn parse_area(text: &str) -> Result<AreaOfInterest> {
    let geojson: geojson::GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| PlannerError::Geometry(e.to_string()))?;

    let geometry = match &geojson {
        geojson::GeoJson::Geometry(g) => Some(g),
        geojson::GeoJson::Feature(f) => f.geometry.as_ref(),
        geojson::GeoJson::FeatureCollection(fc) => {
            if fc.features.len() > 1 {
                warn!(
                    "FeatureCollection has {} features; using the first",
                    fc.features.len()
                );
            }
            fc.features.first().and_then(|f| f.geometry.as_ref())
        }
    };

    let geometry = geometry
        .ok_or_else(|| PlannerError::Geometry("GeoJSON carries no geometry".to_string()))?;
    area_from_geometry(geometry)
}

/// Load an AOI from a GeoJSON file
pub fn load_area(path: impl AsRef<Path>) -> Result<AreaOfInterest> {
    let path = path.as_ref();
    info!("Loading AOI from {:?}", path);
    let text = std::fs::read_to_string(path)?;
    let area = parse_area(&text)?;
    info!("AOI area: {:.1} km²", area.area_km2());
    Ok(area)
}

/// Load asset capabilities (array or `{"assets": [...]}`)
pub fn load_assets(path: impl AsRef<Path>) -> Result<Vec<AssetCapability>> {
    let path = path.as_ref();
    info!("Loading asset capabilities from {:?}", path);
    let assets: Vec<AssetCapability> = array_or_field(read_json(path)?, "assets")?;
    Ok(assets)
}

/// Load search requirements (array or `{"requirements": [...]}`)
pub fn load_requirements(path: impl AsRef<Path>) -> Result<SearchRequirements> {
    let path = path.as_ref();
    info!("Loading search requirements from {:?}", path);
    let raw: Vec<SearchRequirement> = array_or_field(read_json(path)?, "requirements")?;
    SearchRequirements::new(raw)
}

/// Load a pass table (array or `{"passes": [...]}`).
///
/// Rows with an inverted interval or out-of-range fractions are skipped.
pub fn load_pass_table(path: impl AsRef<Path>) -> Result<Vec<PassRecord>> {
    let path = path.as_ref();
    info!("Loading pass table from {:?}", path);
    let rows: Vec<PassRecord> = array_or_field(read_json(path)?, "passes")?;

    let total = rows.len();
    let records: Vec<PassRecord> = rows
        .into_iter()
        .filter(|r| {
            r.end_time > r.start_time
                && r.achieved_resolution_m > 0.0
                && (0.0..=1.0).contains(&r.coverage_fraction)
        })
        .collect();

    info!(
        "Loaded {} passes ({} skipped as malformed)",
        records.len(),
        total - records.len()
    );
    Ok(records)
}

/// Load TLE satellites (array or `{"satellites": [...]}`)
pub fn load_satellites(path: impl AsRef<Path>) -> Result<Vec<Satellite>> {
    let path = path.as_ref();
    info!("Loading satellites from {:?}", path);
    let satellites: Vec<Satellite> = array_or_field(read_json(path)?, "satellites")?;
    info!("Loaded {} satellites", satellites.len());
    Ok(satellites)
}

/// Strips as a FeatureCollection annotated with the plan's windows
pub fn to_geojson(plan: &CollectionPlan, strips: &[Strip]) -> serde_json::Value {
    let mut per_strip: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for w in &plan.collection_windows {
        per_strip.entry(w.window.strip_id()).or_default().push(w);
    }

    let features: Vec<serde_json::Value> = strips
        .iter()
        .map(|strip| {
            let windows = per_strip.get(&strip.id).map(Vec::as_slice).unwrap_or(&[]);
            let best = windows
                .iter()
                .map(|w| w.window.confidence_score)
                .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));

            serde_json::json!({
                "type": "Feature",
                "geometry": strip_geometry(strip),
                "properties": {
                    "strip_id": strip.id.to_string(),
                    "sequence_index": strip.sequence_index,
                    "scan_direction": strip.scan_direction,
                    "area_km2": strip.area_km2,
                    "covered": !windows.is_empty(),
                    "best_confidence": best,
                    "windows": windows.iter().map(|w| serde_json::json!({
                        "resource_id": w.window.candidate.resource_id,
                        "start_time": w.window.candidate.start_time,
                        "end_time": w.window.candidate.end_time,
                        "confidence_score": w.window.confidence_score,
                    })).collect::<Vec<_>>()
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
        "metadata": {
            "plan_id": plan.id,
            "search_id": plan.search_id,
            "asset_id": plan.asset_id,
            "status": plan.status,
            "confidence_score": plan.confidence_score,
            "strip_count": plan.strip_count,
            "requirements": plan.requirements,
        }
    })
}

/// Point AOIs decompose to a single-position strip, exported as a Point
fn strip_geometry(strip: &Strip) -> serde_json::Value {
    match strip.polygon.as_slice() {
        ring if ring.len() >= 4 => {
            let ring: Vec<[f64; 2]> = ring.iter().map(|c| [c.lon, c.lat]).collect();
            serde_json::json!({ "type": "Polygon", "coordinates": [ring] })
        }
        _ => serde_json::json!({
            "type": "Point",
            "coordinates": [strip.centroid.lon, strip.centroid.lat]
        }),
    }
}
