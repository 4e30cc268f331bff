//! In-memory plan lifecycle store
//!
//! Holds each plan with the request it was created from and, while an
//! optimize run is in flight, the run's [`CancelToken`]. At most one run per
//! plan; terminal plans are never overwritten.

use crate::assembler;
use crate::model::{CollectionPlan, PlanStatus};
use crate::pipeline::{CancelToken, PlanRequest};
use crate::{PlannerError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct PlanRecord {
    plan: CollectionPlan,
    request: PlanRequest,
    in_flight: Option<CancelToken>,
}

#[derive(Default)]
pub struct PlanRegistry {
    plans: RwLock<HashMap<Uuid, PlanRecord>>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, plan: CollectionPlan, request: PlanRequest) {
        debug!("Registering plan {} ({})", plan.id, plan.status);
        self.plans.write().await.insert(
            plan.id,
            PlanRecord {
                plan,
                request,
                in_flight: None,
            },
        );
    }

    pub async fn get(&self, id: Uuid) -> Result<CollectionPlan> {
        self.plans
            .read()
            .await
            .get(&id)
            .map(|r| r.plan.clone())
            .ok_or(PlannerError::PlanNotFound(id))
    }

    pub async fn status(&self, id: Uuid) -> Result<PlanStatus> {
        self.plans
            .read()
            .await
            .get(&id)
            .map(|r| r.plan.status)
            .ok_or(PlannerError::PlanNotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.plans.read().await.is_empty()
    }

    /// Claim a PROCESSING plan for an optimize run.
    ///
    /// Fails with [`PlannerError::InvalidTransition`] when the plan is not
    /// PROCESSING or another run already holds it.
    pub async fn begin_optimize(&self, id: Uuid) -> Result<(CollectionPlan, PlanRequest, CancelToken)> {
        let mut plans = self.plans.write().await;
        let record = plans.get_mut(&id).ok_or(PlannerError::PlanNotFound(id))?;

        if record.plan.status != PlanStatus::Processing || record.in_flight.is_some() {
            return Err(PlannerError::InvalidTransition {
                from: record.plan.status,
                to: PlanStatus::Optimized,
            });
        }

        let token = CancelToken::new();
        record.in_flight = Some(token.clone());
        Ok((record.plan.clone(), record.request.clone(), token))
    }

    /// Store the outcome of a run started with [`begin_optimize`](Self::begin_optimize).
    ///
    /// Cancelled runs leave the plan PROCESSING so it can be optimized
    /// again; any other error fails the plan.
    pub async fn finish_optimize(&self, id: Uuid, outcome: Result<CollectionPlan>) -> Result<PlanStatus> {
        let mut plans = self.plans.write().await;
        let Some(record) = plans.get_mut(&id) else {
            // deleted while the run was in flight
            debug!("Discarding result for deleted plan {}", id);
            return Err(PlannerError::PlanNotFound(id));
        };
        record.in_flight = None;

        match outcome {
            Ok(plan) => {
                info!("Plan {} finished {}", id, plan.status);
                record.plan = plan;
            }
            Err(PlannerError::Cancelled) => {
                info!("Plan {} optimize cancelled; still {}", id, record.plan.status);
            }
            Err(err) => {
                warn!("Plan {} optimize errored: {}", id, err);
                record.plan = assembler::fail(record.plan.clone(), &err)?;
            }
        }
        Ok(record.plan.status)
    }

    /// Signal the in-flight run, if any. Returns whether one was running.
    pub async fn cancel(&self, id: Uuid) -> Result<bool> {
        let plans = self.plans.read().await;
        let record = plans.get(&id).ok_or(PlannerError::PlanNotFound(id))?;
        match &record.in_flight {
            Some(token) => {
                token.cancel();
                info!("Cancellation requested for plan {}", id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a plan, cancelling any in-flight run
    pub async fn delete(&self, id: Uuid) -> Result<CollectionPlan> {
        let record = self
            .plans
            .write()
            .await
            .remove(&id)
            .ok_or(PlannerError::PlanNotFound(id))?;
        if let Some(token) = record.in_flight {
            token.cancel();
        }
        info!("Deleted plan {}", id);
        Ok(record.plan)
    }
}
