//! Access Window Generator
//!
//! The [`AccessOracle`] trait is the seam to whatever knows when satellites
//! can see the ground: a local SGP4 propagator ([`OrbitalAccessOracle`]), a
//! pre-computed pass table ([`PassTableOracle`]) or a remote simulator
//! ([`RemoteAccessOracle`]). [`AccessWindowGenerator`] wraps an oracle with
//! per-attempt timeouts, exponential-backoff retries, result filtering and an
//! optional TTL cache.

mod cache;
mod orbital;
mod remote;
mod table;

pub use cache::{AccessCache, CacheKey};
pub use orbital::{OrbitalAccessOracle, SensorGeometry};
pub use remote::RemoteAccessOracle;
pub use table::{PassRecord, PassTableOracle};

use crate::config::AccessConfig;
use crate::model::{AssetCapability, CandidateWindow, Strip, TemporalWindow};
use crate::{PlannerError, Result};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Failure reported by an access oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle request timed out")]
    Timeout,
    #[error("transient oracle failure: {0}")]
    Transient(String),
    #[error("oracle rejected request: {0}")]
    Permanent(String),
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OracleError::Permanent(_))
    }
}

/// Source of satellite passes over a strip
///
/// Implementations must be deterministic for identical strip, capability
/// and window inputs.
#[async_trait]
pub trait AccessOracle: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn passes(
        &self,
        strip: &Strip,
        capability: &AssetCapability,
        window: &TemporalWindow,
    ) -> std::result::Result<Vec<CandidateWindow>, OracleError>;
}

pub struct AccessWindowGenerator {
    oracle: Arc<dyn AccessOracle>,
    config: AccessConfig,
    cache: Option<AccessCache>,
}

impl AccessWindowGenerator {
    pub fn new(oracle: Arc<dyn AccessOracle>, config: AccessConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| AccessCache::new(config.cache_ttl(), config.cache_capacity));
        Self {
            oracle,
            config,
            cache,
        }
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn cache(&self) -> Option<&AccessCache> {
        self.cache.as_ref()
    }

    /// Usable candidate windows for one strip, ordered by start time.
    ///
    /// An empty list means no pass exists in the window. Transient oracle
    /// failures are retried; exhausting the retries yields
    /// [`PlannerError::AccessOracleTimeout`] or [`PlannerError::Oracle`].
    #[instrument(skip_all, fields(strip = %strip.id, oracle = self.oracle.name()))]
    pub async fn generate(
        &self,
        strip: &Strip,
        capability: &AssetCapability,
        window: &TemporalWindow,
    ) -> Result<Vec<CandidateWindow>> {
        let key = CacheKey::new(strip, capability, window);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                debug!("Access cache hit ({} windows)", hit.len());
                return Ok(hit);
            }
        }

        let raw = self.query_with_retry(strip, capability, window).await?;
        let total = raw.len();
        let candidates = self.filter(strip, window, raw);
        debug!("{} of {} passes usable", candidates.len(), total);

        if let Some(cache) = &self.cache {
            cache.insert(key, candidates.clone()).await;
        }
        Ok(candidates)
    }

    async fn query_with_retry(
        &self,
        strip: &Strip,
        capability: &AssetCapability,
        window: &TemporalWindow,
    ) -> Result<Vec<CandidateWindow>> {
        let attempts = self.config.max_attempts.max(1);
        let mut last = OracleError::Timeout;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.config.backoff(attempt - 1);
                debug!("Retrying {} in {:?} (attempt {}/{})", strip.id, delay, attempt, attempts);
                tokio::time::sleep(delay).await;
            }

            let outcome = tokio::time::timeout(
                self.config.timeout(),
                self.oracle.passes(strip, capability, window),
            )
            .await;

            match outcome {
                Ok(Ok(passes)) => return Ok(passes),
                Ok(Err(OracleError::Permanent(message))) => {
                    warn!("Oracle rejected {}: {}", strip.id, message);
                    return Err(PlannerError::Oracle {
                        strip: strip.id,
                        message,
                    });
                }
                Ok(Err(err)) => {
                    warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, strip.id, err);
                    last = err;
                }
                Err(_) => {
                    warn!(
                        "Attempt {}/{} for {} timed out after {:?}",
                        attempt,
                        attempts,
                        strip.id,
                        self.config.timeout()
                    );
                    last = OracleError::Timeout;
                }
            }
        }

        Err(match last {
            OracleError::Timeout => PlannerError::AccessOracleTimeout {
                strip: strip.id,
                attempts,
            },
            other => PlannerError::Oracle {
                strip: strip.id,
                message: other.to_string(),
            },
        })
    }

    /// Drop malformed or negligible passes and clip the rest to `window`
    fn filter(
        &self,
        strip: &Strip,
        window: &TemporalWindow,
        raw: Vec<CandidateWindow>,
    ) -> Vec<CandidateWindow> {
        let mut candidates: Vec<CandidateWindow> = raw
            .into_iter()
            .filter(|c| c.is_well_formed())
            .filter(|c| c.coverage_fraction >= self.config.min_usable_coverage)
            .filter_map(|mut c| {
                c.strip_id = strip.id;
                c.start_time = c.start_time.max(window.start);
                c.end_time = c.end_time.min(window.end);
                (c.start_time < c.end_time).then_some(c)
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.resource_id.cmp(&b.resource_id))
                .then_with(|| a.end_time.cmp(&b.end_time))
        });
        candidates
    }
}

/// Cap every pass at `max` around its midpoint
pub fn clip_pass_duration(candidates: Vec<CandidateWindow>, max: Duration) -> Vec<CandidateWindow> {
    candidates
        .into_iter()
        .map(|mut c| {
            if c.duration() > max {
                let start = c.midpoint() - max / 2;
                c.start_time = start;
                c.end_time = start + max;
            }
            c
        })
        .collect()
}
