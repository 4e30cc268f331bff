//! Collection Planner
//!
//! Turns an area of interest, a temporal window and an asset capability
//! profile into a confidence-ranked set of non-conflicting satellite
//! collection windows.
//!
//! # Pipeline
//!
//! ```text
//! AreaOfInterest ─► geometry::decompose ─► Vec<Strip>
//!                                            │  (one worker task per strip)
//!                                            ▼
//!                     access::AccessWindowGenerator ─► Vec<CandidateWindow>
//!                                            ▼
//!                               scorer::Scorer ─► Vec<ScoredWindow>
//!                                            │  (fan-in barrier)
//!                                            ▼
//!                             selector::select ─► Vec<SelectedWindow>
//!                                            ▼
//!                           assembler::assemble ─► CollectionPlan
//! ```
//!
//! # Scoring Model (4-Factor)
//!
//! ```text
//! Confidence(w) = 100 · (w₁·R + w₂·D + w₃·C + w₄·S)
//! ```
//!
//! | Factor | Weight | Description |
//! |--------|--------|-------------|
//! | R      | 0.30   | Resolution adequacy (target / achieved, capped at 1) |
//! | D      | 0.30   | Detection adequacy (pixels across the smallest target) |
//! | C      | 0.25   | Strip coverage fraction |
//! | S      | 0.15   | Spectral band match |

use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

pub mod access;
pub mod assembler;
pub mod catalog;
pub mod config;
pub mod geometry;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod scorer;
pub mod selector;

pub use access::{AccessOracle, AccessWindowGenerator, OracleError};
pub use catalog::{AssetRegistry, CapabilityCatalog};
pub use config::PlannerConfig;
pub use metrics::{MetricsSnapshot, PlannerMetrics};
pub use model::*;
pub use pipeline::{CancelToken, CollectionPlanner, PlanRequest};
pub use registry::PlanRegistry;

/// Passes covering less than this fraction of a strip are discarded
pub const MIN_USABLE_COVERAGE: f64 = 0.1;

/// Pixels required across the smallest detectable target
pub const DETECTION_FACTOR: f64 = 2.5;

/// Upper bound of every confidence score
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Temporal window bounds in days
pub const MIN_DATE_RANGE_DAYS: i64 = 1;
pub const MAX_DATE_RANGE_DAYS: i64 = 365;

/// Largest window count the exact selector handles under `Auto`
pub const EXACT_SELECTION_MAX_WINDOWS: usize = 200;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Geometry error: {0}")]
    Geometry(String),
    #[error("Capability not found for asset {0}")]
    CapabilityNotFound(String),
    #[error("Access oracle timed out for {strip} after {attempts} attempts")]
    AccessOracleTimeout { strip: StripId, attempts: u32 },
    #[error("Access oracle failed for {strip}: {message}")]
    Oracle { strip: StripId, message: String },
    #[error("Insufficient coverage: no collection window for {}", join_strips(.strips))]
    InsufficientCoverage { strips: Vec<StripId> },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Plan {0} not found")]
    PlanNotFound(Uuid),
    #[error("Invalid plan transition from {from} to {to}")]
    InvalidTransition { from: PlanStatus, to: PlanStatus },
    #[error("Planning cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Geometry(_) => "geometry_error",
            Self::CapabilityNotFound(_) => "capability_not_found",
            Self::AccessOracleTimeout { .. } => "access_oracle_timeout",
            Self::Oracle { .. } => "access_oracle_error",
            Self::InsufficientCoverage { .. } => "insufficient_coverage",
            Self::Validation(_) => "validation_error",
            Self::PlanNotFound(_) => "plan_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }

    /// Structured detail naming the offending strip, asset or plan
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::CapabilityNotFound(asset_id) => Some(json!({ "asset_id": asset_id })),
            Self::AccessOracleTimeout { strip, attempts } => {
                Some(json!({ "strip_id": strip, "attempts": attempts }))
            }
            Self::Oracle { strip, .. } => Some(json!({ "strip_id": strip })),
            Self::InsufficientCoverage { strips } => Some(json!({ "unsatisfied_strips": strips })),
            Self::PlanNotFound(id) => Some(json!({ "plan_id": id })),
            Self::InvalidTransition { from, to } => Some(json!({ "from": from, "to": to })),
            Self::Cancelled => Some(json!({ "cancelled": true })),
            _ => None,
        }
    }

    /// Whether the caller can fix the request and resubmit
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::Geometry(_) | Self::Validation(_))
    }
}

fn join_strips(strips: &[StripId]) -> String {
    strips
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
