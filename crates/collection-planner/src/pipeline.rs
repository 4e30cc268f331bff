//! Planning pipeline
//!
//! Decompose → (per strip, on a bounded worker pool) generate + score →
//! fan-in → select → assemble. Strips never share mutable state; the
//! selector is the only synchronisation point. A [`CancelToken`] aborts
//! every in-flight worker and no plan is produced.

use crate::access::{clip_pass_duration, AccessOracle, AccessWindowGenerator};
use crate::assembler;
use crate::catalog::CapabilityCatalog;
use crate::config::PlannerConfig;
use crate::geometry;
use crate::metrics::{MetricsSnapshot, PlannerMetrics};
use crate::model::{
    AreaOfInterest, AssetCapability, CollectionPlan, ScoredWindow, SearchRequirements,
    StripAccessFailure, StripId, TemporalWindow,
};
use crate::scorer::Scorer;
use crate::selector::{self, SelectionPolicy};
use crate::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Cancellation signal shared by one pipeline invocation
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a plan is computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub search_id: String,
    pub asset_id: String,
    pub area: AreaOfInterest,
    pub window: TemporalWindow,
    #[serde(default)]
    pub requirements: SearchRequirements,
}

/// Result of one strip worker
type StripOutcome = (StripId, Result<Vec<ScoredWindow>>);

pub struct CollectionPlanner {
    config: Arc<PlannerConfig>,
    catalog: Arc<dyn CapabilityCatalog>,
    generator: Arc<AccessWindowGenerator>,
    metrics: PlannerMetrics,
}

impl CollectionPlanner {
    /// Fails with [`PlannerError::Config`] when `config` does not validate
    pub fn new(
        config: PlannerConfig,
        catalog: Arc<dyn CapabilityCatalog>,
        oracle: Arc<dyn AccessOracle>,
    ) -> Result<Self> {
        config.validate()?;
        let generator = AccessWindowGenerator::new(oracle, config.access.clone());
        Ok(Self {
            config: Arc::new(config),
            catalog,
            generator: Arc::new(generator),
            metrics: PlannerMetrics::new(),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn CapabilityCatalog> {
        &self.catalog
    }

    pub fn generator(&self) -> &AccessWindowGenerator {
        &self.generator
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let cache = self
            .generator
            .cache()
            .map(|c| c.counters())
            .unwrap_or((0, 0));
        self.metrics.snapshot(cache)
    }

    /// Pre-pipeline checks: window bounds and capability lookup
    pub async fn validate(&self, request: &PlanRequest) -> Result<AssetCapability> {
        if request.search_id.trim().is_empty() {
            return Err(PlannerError::Validation("search_id must not be empty".into()));
        }
        request.window.validate_range(&self.config.temporal)?;
        let capability = self.catalog.resolve(&request.asset_id).await?;
        capability.validate()?;
        Ok(capability)
    }

    /// Validate and open a plan in PROCESSING
    pub async fn create(&self, request: &PlanRequest) -> Result<CollectionPlan> {
        self.validate(request).await?;
        let mut plan = assembler::draft(
            &request.search_id,
            &request.asset_id,
            request.window,
            request.requirements.clone(),
        );
        assembler::submit(&mut plan)?;
        info!("Plan {} created for search {}", plan.id, plan.search_id);
        Ok(plan)
    }

    /// Create and optimize in one go
    pub async fn plan(&self, request: &PlanRequest, cancel: &CancelToken) -> Result<CollectionPlan> {
        let plan = self.create(request).await?;
        self.optimize(plan, request, cancel).await
    }

    /// Run the pipeline for a PROCESSING plan.
    ///
    /// Returns the terminal plan, or [`PlannerError::Cancelled`] with no plan
    /// if `cancel` fires first.
    #[instrument(skip_all, fields(plan = %plan.id, asset = %request.asset_id))]
    pub async fn optimize(
        &self,
        plan: CollectionPlan,
        request: &PlanRequest,
        cancel: &CancelToken,
    ) -> Result<CollectionPlan> {
        let started = Instant::now();
        let outcome = self.run(plan, request, cancel).await;
        self.metrics.record(&outcome, started.elapsed());
        outcome
    }

    async fn run(
        &self,
        plan: CollectionPlan,
        request: &PlanRequest,
        cancel: &CancelToken,
    ) -> Result<CollectionPlan> {
        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }
        let capability = self.validate(request).await?;

        let strips = match geometry::decompose_with(
            &request.area,
            capability.swath_width_km,
            &self.config.decomposer,
        ) {
            Ok(strips) => strips,
            Err(err) => return assembler::fail(plan, &err),
        };
        info!("Decomposed AOI into {} strips", strips.len());

        let workers = self.config.pipeline.effective_workers();
        let semaphore = Arc::new(Semaphore::new(workers));
        let capability = Arc::new(capability);
        let requirements = Arc::new(request.requirements.clone());
        let mut tasks: JoinSet<StripOutcome> = JoinSet::new();

        for strip in strips.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let generator = Arc::clone(&self.generator);
            let config = Arc::clone(&self.config);
            let capability = Arc::clone(&capability);
            let requirements = Arc::clone(&requirements);
            let window = request.window;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (strip.id, Err(PlannerError::Cancelled));
                };
                let outcome = generator
                    .generate(&strip, &capability, &window)
                    .await
                    .map(|candidates| {
                        let candidates = match requirements.max_pass_duration() {
                            Some(max) => clip_pass_duration(candidates, max),
                            None => candidates,
                        };
                        Scorer::new(&capability, &requirements, &config.scoring).score_all(&candidates)
                    });
                (strip.id, outcome)
            });
        }

        let mut scored: Vec<ScoredWindow> = Vec::new();
        let mut failures: Vec<StripAccessFailure> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!("Plan {} cancelled; discarding partial results", plan.id);
                    return Err(PlannerError::Cancelled);
                }
                next = tasks.join_next() => match next {
                    None => break,
                    Some(Ok((strip, Ok(windows)))) => {
                        debug!("{} produced {} scored windows", strip, windows.len());
                        scored.extend(windows);
                    }
                    Some(Ok((strip, Err(err)))) => {
                        warn!("{} contributes no candidates: {}", strip, err);
                        failures.push(StripAccessFailure {
                            strip_id: strip,
                            code: err.code().to_string(),
                            message: err.to_string(),
                        });
                    }
                    Some(Err(join_err)) => {
                        error!("Strip worker aborted: {}", join_err);
                    }
                },
            }
        }
        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }
        failures.sort_by_key(|f| f.strip_id);

        let policy = SelectionPolicy::from_config(&self.config.selection, Some(request.window.center()));
        let selected = selector::select(scored, &policy);
        let strip_ids: Vec<StripId> = strips.iter().map(|s| s.id).collect();
        assembler::assemble(plan, &strip_ids, selected, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::{t0, test_capability, ScriptedOracle};
    use crate::access::{OracleError, PassRecord, PassTableOracle};
    use crate::catalog::AssetRegistry;
    use crate::geometry::tests::rectangle_km;
    use crate::model::{Coordinate, PlanStatus, RequirementParameter, SearchRequirement};
    use chrono::Duration;

    fn catalog() -> Arc<dyn CapabilityCatalog> {
        let mut registry = AssetRegistry::new();
        registry.insert(test_capability()).unwrap();
        Arc::new(registry)
    }

    fn request() -> PlanRequest {
        PlanRequest {
            search_id: "search-42".into(),
            asset_id: test_capability().asset_id,
            area: rectangle_km(Coordinate::new(0.0, 0.0), 500.0, 50.0),
            window: TemporalWindow::new(t0(), t0() + Duration::days(7)).unwrap(),
            requirements: SearchRequirements::default(),
        }
    }

    fn record(strip: Option<u32>, start_h: i64, minutes: i64) -> PassRecord {
        PassRecord {
            strip_id: strip.map(StripId),
            resource_id: format!("sat-{}", start_h % 3),
            start_time: t0() + Duration::hours(start_h),
            end_time: t0() + Duration::hours(start_h) + Duration::minutes(minutes),
            achieved_resolution_m: 2.0,
            coverage_fraction: 0.8,
            spectral_match: 1.0,
            geometric_quality: 0.9,
            ground_distance_km: 0.0,
        }
    }

    fn planner(oracle: Arc<dyn AccessOracle>) -> CollectionPlanner {
        let mut config = PlannerConfig::default();
        config.pipeline.workers = 2;
        CollectionPlanner::new(config, catalog(), oracle).unwrap()
    }

    #[tokio::test]
    async fn test_full_coverage_optimizes() {
        let oracle = Arc::new(PassTableOracle::new(vec![
            record(None, 30, 8),
            record(None, 10, 8),
            record(None, 12, 8),
        ]));
        let plan = planner(oracle)
            .plan(&request(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(plan.status, PlanStatus::Optimized);
        assert_eq!(plan.strip_count, 5);
        // every strip gets all three non-overlapping passes
        assert_eq!(plan.collection_windows.len(), 15);
        assert!(plan
            .collection_windows
            .windows(2)
            .all(|p| p[0].window.candidate.start_time <= p[1].window.candidate.start_time));
        assert!(plan.confidence_score > 0.0 && plan.confidence_score <= 100.0);
        assert_eq!(plan.capability_matrix.len(), 1);
    }

    #[tokio::test]
    async fn test_scenario_2_uncovered_strip_fails_plan() {
        let records = (0..4).map(|s| record(Some(s), 10 + s as i64, 8)).collect();
        let oracle = Arc::new(PassTableOracle::new(records));
        let plan = planner(oracle)
            .plan(&request(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(plan.status, PlanStatus::Failed);
        let failure = plan.failure.unwrap();
        assert_eq!(failure.unsatisfied_strips, vec![StripId(4)]);
        assert!(failure.message.contains("strip-004"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_failures_degrade_to_failed_plan() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Err(OracleError::Transient(
            "simulator down".into(),
        ))]));
        let plan = planner(oracle)
            .plan(&request(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(plan.status, PlanStatus::Failed);
        let failure = plan.failure.unwrap();
        assert_eq!(failure.unsatisfied_strips.len(), 5);
        assert_eq!(failure.access_failures.len(), 5);
        assert_eq!(failure.access_failures[0].strip_id, StripId(0));
        assert_eq!(failure.access_failures[0].code, "access_oracle_error");
    }

    #[tokio::test]
    async fn test_scenario_5_cancellation_returns_no_plan() {
        let planner = Arc::new(planner(Arc::new(ScriptedOracle::hanging())));
        let cancel = CancelToken::new();

        let handle = {
            let planner = Arc::clone(&planner);
            let cancel = cancel.clone();
            tokio::spawn(async move { planner.plan(&request(), &cancel).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("pipeline did not stop promptly")
            .unwrap();
        assert!(matches!(result, Err(PlannerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token() {
        let planner = planner(Arc::new(PassTableOracle::new(vec![])));
        let cancel = CancelToken::new();
        cancel.cancel();
        let plan = planner.create(&request()).await.unwrap();
        assert!(matches!(
            planner.optimize(plan, &request(), &cancel).await,
            Err(PlannerError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_plan() {
        let planner = planner(Arc::new(PassTableOracle::new(vec![])));

        let mut short = request();
        short.window = TemporalWindow::new(t0(), t0() + Duration::hours(3)).unwrap();
        assert!(matches!(
            planner.create(&short).await,
            Err(PlannerError::Validation(_))
        ));

        let mut unknown = request();
        unknown.asset_id = "ghost".into();
        assert!(matches!(
            planner.create(&unknown).await,
            Err(PlannerError::CapabilityNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_temporal_requirement_caps_pass_length() {
        let oracle = Arc::new(PassTableOracle::new(vec![record(None, 10, 30)]));
        let mut req = request();
        req.requirements = SearchRequirements::new(vec![SearchRequirement::new(
            RequirementParameter::Temporal,
            5.0,
            "minutes",
        )])
        .unwrap();

        let plan = planner(oracle).plan(&req, &CancelToken::new()).await.unwrap();
        assert_eq!(plan.status, PlanStatus::Optimized);
        assert!(plan
            .collection_windows
            .iter()
            .all(|w| w.window.candidate.duration() == Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_requirements_carried_onto_plan() {
        let oracle = Arc::new(PassTableOracle::new(vec![record(None, 10, 8)]));
        let mut req = request();
        req.requirements = SearchRequirements::new(vec![
            SearchRequirement::new(RequirementParameter::Spectral, 550.0, "nanometers"),
            SearchRequirement::new(RequirementParameter::Radiometric, 12.0, "bits"),
        ])
        .unwrap();

        let planner = planner(oracle);
        let created = planner.create(&req).await.unwrap();
        assert_eq!(created.requirements, req.requirements);

        let plan = planner.optimize(created, &req, &CancelToken::new()).await.unwrap();
        assert_eq!(plan.status, PlanStatus::Optimized);
        assert_eq!(plan.requirements.len(), 2);

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["requirements"][0]["parameter"], "SPECTRAL");
        assert_eq!(json["requirements"][1]["unit"], "bits");
    }

    #[tokio::test]
    async fn test_metrics_count_runs_and_cache_hits() {
        let planner = planner(Arc::new(PassTableOracle::new(vec![record(None, 10, 8)])));
        planner.plan(&request(), &CancelToken::new()).await.unwrap();
        planner.plan(&request(), &CancelToken::new()).await.unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let plan = planner.create(&request()).await.unwrap();
        assert!(planner.optimize(plan, &request(), &cancel).await.is_err());

        let metrics = planner.metrics();
        assert_eq!(metrics.total_optimizations, 3);
        assert_eq!(metrics.optimized, 2);
        assert_eq!(metrics.cancelled, 1);
        // second run is served from the access cache
        assert_eq!(metrics.cache_misses, 5);
        assert_eq!(metrics.cache_hits, 5);
    }

    #[tokio::test]
    async fn test_pipeline_is_deterministic() {
        let records = vec![record(None, 10, 8), record(None, 10, 12), record(Some(2), 40, 8)];
        let planner = planner(Arc::new(PassTableOracle::new(records)));
        let a = planner.plan(&request(), &CancelToken::new()).await.unwrap();
        let b = planner.plan(&request(), &CancelToken::new()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.collection_windows, b.collection_windows);
        assert_eq!(a.confidence_score.to_bits(), b.confidence_score.to_bits());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = PlannerConfig::default();
        config.decomposer.strip_overlap = 1.0;
        let oracle = Arc::new(PassTableOracle::new(vec![]));
        assert!(matches!(
            CollectionPlanner::new(config, catalog(), oracle),
            Err(PlannerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        assert!(!token.is_cancelled());
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }
}
