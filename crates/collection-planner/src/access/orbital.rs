//! SGP4-backed access oracle
//!
//! Propagates each satellite's sub-satellite point across the window once,
//! shares that track between every strip of the plan, and reports a pass
//! whenever a strip centroid is within the sensor's off-nadir reach.
//! Propagation and scanning run on the blocking pool and stop as soon as
//! the awaiting future is dropped (timeout or plan cancellation).

use super::{AccessOracle, OracleError};
use crate::model::{AssetCapability, CandidateWindow, Strip, TemporalWindow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use orbital_mechanics::geodesy::{ground_reach_km, haversine_km, off_nadir_deg};
use orbital_mechanics::{GroundTrackSample, OrbitalError, Satellite};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Windows whose tracks are kept; older windows are dropped wholesale
const MAX_TRACKED_WINDOWS: usize = 4;

/// Pointing limits shared by every satellite in the constellation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorGeometry {
    pub max_off_nadir_deg: f64,
    pub sample_step_secs: i64,
    /// Bands the sensors carry; empty means "whatever the asset asks for"
    pub bands: BTreeSet<String>,
}

impl SensorGeometry {
    fn step(&self) -> Duration {
        Duration::seconds(self.sample_step_secs.max(1))
    }
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self {
            max_off_nadir_deg: 30.0,
            sample_step_secs: 30,
            bands: BTreeSet::new(),
        }
    }
}

/// Sampled ground track of one satellite
struct SatelliteTrack {
    id: String,
    samples: Vec<GroundTrackSample>,
}

type Tracks = Arc<Vec<SatelliteTrack>>;

pub struct OrbitalAccessOracle {
    satellites: Arc<Vec<Satellite>>,
    sensor: Arc<SensorGeometry>,
    tracks: Mutex<HashMap<TemporalWindow, Arc<OnceCell<Tracks>>>>,
    /// Blocking jobs currently running
    active_jobs: Arc<AtomicUsize>,
    propagations: AtomicUsize,
}

impl OrbitalAccessOracle {
    pub fn new(satellites: Vec<Satellite>, sensor: SensorGeometry) -> Self {
        Self {
            satellites: Arc::new(satellites),
            sensor: Arc::new(sensor),
            tracks: Mutex::new(HashMap::new()),
            active_jobs: Arc::new(AtomicUsize::new(0)),
            propagations: AtomicUsize::new(0),
        }
    }

    pub fn satellite_count(&self) -> usize {
        self.satellites.len()
    }

    /// Tracks for `window`, propagated by the first caller and shared after
    async fn tracks_for(&self, window: &TemporalWindow) -> Result<Tracks, OracleError> {
        let cell = {
            let mut tracks = self.tracks.lock().await;
            if tracks.len() >= MAX_TRACKED_WINDOWS && !tracks.contains_key(window) {
                debug!("Dropping {} cached ground-track windows", tracks.len());
                tracks.clear();
            }
            Arc::clone(tracks.entry(*window).or_default())
        };
        cell.get_or_try_init(|| self.propagate(*window))
            .await
            .map(Arc::clone)
    }

    async fn propagate(&self, window: TemporalWindow) -> Result<Tracks, OracleError> {
        self.propagations.fetch_add(1, Ordering::Relaxed);
        let satellites = Arc::clone(&self.satellites);
        let step = self.sensor.step();
        let stop = StopOnDrop::new();
        let flag = stop.flag();
        let active = Arc::clone(&self.active_jobs);

        let tracks = tokio::task::spawn_blocking(move || {
            let _job = ActiveJob::enter(&active);
            propagate_tracks(&satellites, &window, step, &flag)
        })
        .await
        .map_err(|e| OracleError::Transient(format!("propagation task failed: {}", e)))??;

        info!(
            "Propagated {} ground tracks over {} to {}",
            tracks.len(),
            window.start,
            window.end
        );
        Ok(Arc::new(tracks))
    }
}

#[async_trait]
impl AccessOracle for OrbitalAccessOracle {
    fn name(&self) -> &str {
        "sgp4"
    }

    async fn passes(
        &self,
        strip: &Strip,
        capability: &AssetCapability,
        window: &TemporalWindow,
    ) -> Result<Vec<CandidateWindow>, OracleError> {
        let tracks = self.tracks_for(window).await?;
        let sensor = Arc::clone(&self.sensor);
        let strip = strip.clone();
        let capability = capability.clone();
        let stop = StopOnDrop::new();
        let flag = stop.flag();
        let active = Arc::clone(&self.active_jobs);

        let passes = tokio::task::spawn_blocking(move || {
            let _job = ActiveJob::enter(&active);
            let mut passes = Vec::new();
            for track in tracks.iter() {
                if flag.load(Ordering::Relaxed) {
                    return None;
                }
                passes.extend(track_passes(track, &strip, &capability, &sensor));
            }
            debug!("{} passes over {}", passes.len(), strip.id);
            Some(passes)
        })
        .await
        .map_err(|e| OracleError::Transient(format!("pass scan task failed: {}", e)))?;

        passes.ok_or_else(|| OracleError::Transient("pass scan stopped".into()))
    }
}

/// Raises its flag when dropped, telling the paired blocking job to stop
struct StopOnDrop(Arc<AtomicBool>);

impl StopOnDrop {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

struct ActiveJob(Arc<AtomicUsize>);

impl ActiveJob {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn propagate_tracks(
    satellites: &[Satellite],
    window: &TemporalWindow,
    step: Duration,
    stop: &AtomicBool,
) -> Result<Vec<SatelliteTrack>, OracleError> {
    let mut tracks = Vec::new();
    for satellite in satellites.iter().filter(|s| s.status.is_available()) {
        match sample_track(satellite, window, step, stop) {
            Ok(Some(samples)) => tracks.push(SatelliteTrack {
                id: satellite.id.clone(),
                samples,
            }),
            Ok(None) => {
                debug!("Propagation stopped at satellite {}", satellite.id);
                return Err(OracleError::Transient("propagation stopped".into()));
            }
            Err(OrbitalError::InvalidTle(msg)) => {
                return Err(OracleError::Permanent(format!(
                    "satellite {}: {}",
                    satellite.id, msg
                )));
            }
            Err(e) => warn!("Skipping satellite {}: {}", satellite.id, e),
        }
    }
    Ok(tracks)
}

/// `None` once `stop` is raised
fn sample_track(
    satellite: &Satellite,
    window: &TemporalWindow,
    step: Duration,
    stop: &AtomicBool,
) -> orbital_mechanics::Result<Option<Vec<GroundTrackSample>>> {
    let propagator = satellite.propagator()?;
    let mut samples = Vec::new();
    for sample in propagator.ground_track(window.start, window.end, step)? {
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        samples.push(sample?);
    }
    Ok(Some(samples))
}

/// One visible sample: time, off-nadir angle, ground distance
type Sighting = (DateTime<Utc>, f64, f64);

fn track_passes(
    track: &SatelliteTrack,
    strip: &Strip,
    capability: &AssetCapability,
    sensor: &SensorGeometry,
) -> Vec<CandidateWindow> {
    let target = strip.centroid;
    let mut passes = Vec::new();
    let mut run: Vec<Sighting> = Vec::new();

    for sample in &track.samples {
        let pos = sample.position;
        let distance = haversine_km(pos.latitude, pos.longitude, target.lat, target.lon);
        let reach = ground_reach_km(sensor.max_off_nadir_deg, pos.altitude_km);
        if distance <= reach {
            run.push((sample.time, off_nadir_deg(distance, pos.altitude_km), distance));
        } else if !run.is_empty() {
            passes.push(build_pass(&track.id, &run, strip, capability, sensor));
            run.clear();
        }
    }
    if !run.is_empty() {
        passes.push(build_pass(&track.id, &run, strip, capability, sensor));
    }
    passes
}

fn build_pass(
    resource_id: &str,
    run: &[Sighting],
    strip: &Strip,
    capability: &AssetCapability,
    sensor: &SensorGeometry,
) -> CandidateWindow {
    let start = run[0].0;
    let mut end = run[run.len() - 1].0;
    if end <= start {
        end = start + sensor.step();
    }
    // closest approach
    let (_, off_nadir, distance) = run
        .iter()
        .copied()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or(run[0]);
    let cos = off_nadir.to_radians().cos().max(1e-3);

    // Ground sample distance grows roughly with 1/cos² off nadir
    let achieved_resolution_m = capability.resolution_m / (cos * cos);
    let coverage_fraction = if strip.width_km > 0.0 {
        (capability.swath_width_km / cos / strip.width_km).min(1.0)
    } else {
        1.0
    };
    let geometric_quality = (1.0 - off_nadir / sensor.max_off_nadir_deg).clamp(0.0, 1.0);

    CandidateWindow {
        strip_id: strip.id,
        resource_id: resource_id.to_string(),
        start_time: start,
        end_time: end,
        achieved_resolution_m,
        coverage_fraction,
        spectral_match: spectral_match(&sensor.bands, &capability.spectral_bands),
        geometric_quality,
        ground_distance_km: distance,
    }
}

fn spectral_match(sensor: &BTreeSet<String>, wanted: &BTreeSet<String>) -> f64 {
    if sensor.is_empty() || wanted.is_empty() {
        return 1.0;
    }
    sensor.intersection(wanted).count() as f64 / wanted.len() as f64
}
