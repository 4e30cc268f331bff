//! Orbital Mechanics Library
//!
//! SGP4 propagation, Earth-fixed coordinate transforms and sub-satellite
//! ground-track sampling for the collection planner's built-in access oracle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Invalid sampling interval: {0}")]
    InvalidInterval(String),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Satellite {
    pub id: String,
    pub norad_id: u32,
    pub name: String,
    pub tle_line1: String,
    pub tle_line2: String,
    #[serde(default = "SatelliteStatus::operational")]
    pub status: SatelliteStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SatelliteStatus {
    Operational,
    Degraded,
    Offline,
}

impl SatelliteStatus {
    fn operational() -> Self {
        SatelliteStatus::Operational
    }

    /// Whether the satellite can be tasked for collection
    pub fn is_available(&self) -> bool {
        !matches!(self, SatelliteStatus::Offline)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateVector {
    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub epoch: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeodeticPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

impl Satellite {
    /// Parse the TLE once for repeated propagation
    pub fn propagator(&self) -> Result<propagation::Propagator> {
        propagation::Propagator::from_tle(&self.tle_line1, &self.tle_line2)
    }
}

pub mod propagation {
    use super::*;

    /// Parsed SGP4 model for one satellite
    pub struct Propagator {
        constants: sgp4::Constants,
        epoch: DateTime<Utc>,
    }

    impl Propagator {
        pub fn from_tle(tle_line1: &str, tle_line2: &str) -> Result<Self> {
            let elements =
                sgp4::Elements::from_tle(None, tle_line1.as_bytes(), tle_line2.as_bytes())
                    .map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))?;

            let constants = sgp4::Constants::from_elements(&elements)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            let epoch = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);

            Ok(Self { constants, epoch })
        }

        pub fn state_at(&self, time: DateTime<Utc>) -> Result<StateVector> {
            let duration = time.signed_duration_since(self.epoch);
            let minutes_since_epoch = duration.num_milliseconds() as f64 / 60_000.0;

            let prediction = self
                .constants
                .propagate(minutes_since_epoch)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            Ok(StateVector {
                position_x: prediction.position[0],
                position_y: prediction.position[1],
                position_z: prediction.position[2],
                velocity_x: prediction.velocity[0],
                velocity_y: prediction.velocity[1],
                velocity_z: prediction.velocity[2],
                epoch: time,
            })
        }

        pub fn sub_satellite_point(&self, time: DateTime<Utc>) -> Result<GeodeticPosition> {
            let state = self.state_at(time)?;
            transforms::eci_to_geodetic(
                state.position_x,
                state.position_y,
                state.position_z,
                time,
            )
        }

        /// Sample the sub-satellite point over `[start, end]` at a fixed step.
        ///
        /// Samples are propagated lazily as the track is iterated. The final
        /// sample is always taken at `end` so short windows are not silently
        /// skipped.
        pub fn ground_track(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            step: Duration,
        ) -> Result<GroundTrack<'_>> {
            if step <= Duration::zero() {
                return Err(OrbitalError::InvalidInterval(format!(
                    "step must be positive, got {}s",
                    step.num_seconds()
                )));
            }
            if end < start {
                return Err(OrbitalError::InvalidInterval(format!(
                    "end {} precedes start {}",
                    end, start
                )));
            }

            Ok(GroundTrack {
                propagator: self,
                next: Some(start),
                end,
                step,
            })
        }
    }

    /// Lazy iterator over a sampled ground track
    pub struct GroundTrack<'a> {
        propagator: &'a Propagator,
        next: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
        step: Duration,
    }

    impl Iterator for GroundTrack<'_> {
        type Item = Result<GroundTrackSample>;

        fn next(&mut self) -> Option<Self::Item> {
            let time = self.next?;
            self.next = (time < self.end).then(|| (time + self.step).min(self.end));
            Some(
                self.propagator
                    .sub_satellite_point(time)
                    .map(|position| GroundTrackSample { time, position }),
            )
        }
    }
}

/// One sub-satellite point on a sampled ground track
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GroundTrackSample {
    pub time: DateTime<Utc>,
    pub position: GeodeticPosition,
}

pub mod transforms {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    pub const EARTH_RADIUS_KM: f64 = 6378.137;
    pub const EARTH_FLATTENING: f64 = 1.0 / 298.257223563;

    const J2000_JULIAN_DATE: f64 = 2451545.0;
    const UNIX_EPOCH_JULIAN_DATE: f64 = 2440587.5;

    /// Julian date of a UTC instant
    pub fn julian_date(time: DateTime<Utc>) -> f64 {
        time.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JULIAN_DATE
    }

    /// Greenwich mean sidereal time in radians, normalised to [0, 2π)
    pub fn gmst_rad(time: DateTime<Utc>) -> f64 {
        let d = julian_date(time) - J2000_JULIAN_DATE;
        let t = d / 36525.0;
        let deg = 280.46061837 + 360.98564736629 * d + 0.000387933 * t * t
            - t * t * t / 38_710_000.0;
        deg.rem_euclid(360.0).to_radians()
    }

    /// Rotate an ECI (TEME) position into the Earth-fixed frame
    pub fn eci_to_ecef(x: f64, y: f64, z: f64, time: DateTime<Utc>) -> (f64, f64, f64) {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), -gmst_rad(time));
        let ecef = rotation * Vector3::new(x, y, z);
        (ecef.x, ecef.y, ecef.z)
    }

    pub fn eci_to_geodetic(x: f64, y: f64, z: f64, time: DateTime<Utc>) -> Result<GeodeticPosition> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "non-finite position ({}, {}, {})",
                x, y, z
            )));
        }
        let (x, y, z) = eci_to_ecef(x, y, z, time);
        ecef_to_geodetic(x, y, z)
    }

    /// WGS84 geodetic position of an Earth-fixed point
    pub fn ecef_to_geodetic(x: f64, y: f64, z: f64) -> Result<GeodeticPosition> {
        let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);
        let p = (x * x + y * y).sqrt();
        if p == 0.0 && z == 0.0 {
            return Err(OrbitalError::InvalidCoordinates(
                "position at Earth centre".to_string(),
            ));
        }

        let longitude = y.atan2(x).to_degrees();
        let mut lat = z.atan2(p * (1.0 - e2));
        let mut altitude_km = 0.0;
        for _ in 0..5 {
            let n = EARTH_RADIUS_KM / (1.0 - e2 * lat.sin().powi(2)).sqrt();
            altitude_km = if lat.cos().abs() > 1e-10 {
                p / lat.cos() - n
            } else {
                z.abs() - n * (1.0 - e2)
            };
            lat = z.atan2(p * (1.0 - e2 * n / (n + altitude_km)));
        }

        Ok(GeodeticPosition {
            latitude: lat.to_degrees(),
            longitude,
            altitude_km,
        })
    }

    pub fn geodetic_to_ecef(pos: &GeodeticPosition) -> Result<(f64, f64, f64)> {
        if !(-90.0..=90.0).contains(&pos.latitude) || !(-180.0..=180.0).contains(&pos.longitude) {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "lat {} lon {} out of range",
                pos.latitude, pos.longitude
            )));
        }
        let lat_rad = pos.latitude.to_radians();
        let lon_rad = pos.longitude.to_radians();
        let alt = pos.altitude_km;

        let e2 = EARTH_FLATTENING * (2.0 - EARTH_FLATTENING);
        let n = EARTH_RADIUS_KM / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();

        let x = (n + alt) * lat_rad.cos() * lon_rad.cos();
        let y = (n + alt) * lat_rad.cos() * lon_rad.sin();
        let z = (n * (1.0 - e2) + alt) * lat_rad.sin();

        Ok((x, y, z))
    }
}

pub mod geodesy {
    /// Mean Earth radius used for surface distances (km)
    pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

    /// Haversine distance between two points in km
    pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let dlat = (lat2 - lat1).to_radians();
        let dlon = (lon2 - lon1).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_MEAN_RADIUS_KM * c
    }

    /// Sensor off-nadir angle (deg) needed to view a ground point
    /// `ground_distance_km` away from the sub-satellite point.
    pub fn off_nadir_deg(ground_distance_km: f64, altitude_km: f64) -> f64 {
        let r = EARTH_MEAN_RADIUS_KM;
        let central = ground_distance_km.max(0.0) / r;
        let numerator = r * central.sin();
        let denominator = r + altitude_km - r * central.cos();
        numerator.atan2(denominator).to_degrees()
    }

    /// Ground distance (km) reachable at a given off-nadir angle; inverse of
    /// [`off_nadir_deg`] on a spherical Earth.
    pub fn ground_reach_km(off_nadir_deg: f64, altitude_km: f64) -> f64 {
        let r = EARTH_MEAN_RADIUS_KM;
        let eta = off_nadir_deg.to_radians();
        let ratio = ((r + altitude_km) / r) * eta.sin();
        if ratio >= 1.0 {
            // Beyond the horizon: clamp to the tangent point
            let horizon = (r / (r + altitude_km)).acos();
            return horizon * r;
        }
        let epsilon = ratio.acos();
        let central = std::f64::consts::FRAC_PI_2 - eta - epsilon;
        central.max(0.0) * r
    }
}
