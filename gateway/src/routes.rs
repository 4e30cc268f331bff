use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use collection_planner::{
    loader, AssetCapability, CapabilityEntry, CollectionPlan, MetricsSnapshot, PlanFailure,
    PlanRequest, PlanStatus, PlannerError, SearchRequirement, SearchRequirements, SelectedWindow,
    TemporalWindow,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    pub search_id: String,
    pub asset_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub requirements: Vec<SearchRequirement>,
    /// GeoJSON Polygon or Point (bare geometry or Feature)
    pub area: serde_json::Value,
}

impl CreatePlanRequest {
    fn into_plan_request(self) -> Result<PlanRequest, PlannerError> {
        Ok(PlanRequest {
            area: loader::parse_area(&self.area.to_string())?,
            window: TemporalWindow::new(self.start_time, self.end_time)?,
            requirements: SearchRequirements::new(self.requirements)?,
            search_id: self.search_id,
            asset_id: self.asset_id,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: Uuid,
    pub search_id: String,
    pub asset_id: String,
    pub status: PlanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub requirements: SearchRequirements,
    pub confidence_score: f64,
    pub collection_windows: Vec<SelectedWindow>,
    pub capability_matrix: Vec<CapabilityEntry>,
    pub strip_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<PlanFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CollectionPlan> for PlanResponse {
    fn from(plan: CollectionPlan) -> Self {
        Self {
            id: plan.id,
            search_id: plan.search_id,
            asset_id: plan.asset_id,
            status: plan.status,
            start_time: plan.window.start,
            end_time: plan.window.end,
            requirements: plan.requirements,
            confidence_score: plan.confidence_score,
            collection_windows: plan.collection_windows,
            capability_matrix: plan.capability_matrix,
            strip_count: plan.strip_count,
            failure: plan.failure,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub status: PlanStatus,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: Uuid,
    pub cancelled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptimizeQuery {
    /// Block until the run finishes
    #[serde(default)]
    pub wait: bool,
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(body): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<PlanResponse>), ApiError> {
    let request = body.into_plan_request()?;
    let plan = state.planner.create(&request).await?;
    state.registry.insert(plan.clone(), request).await;
    Ok((StatusCode::CREATED, Json(plan.into())))
}

/// Start an optimize run in the background (or wait for it with `?wait=true`)
pub async fn optimize_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OptimizeQuery>,
) -> Result<(StatusCode, Json<PlanResponse>), ApiError> {
    let (plan, request, cancel) = state.registry.begin_optimize(id).await?;
    info!("Optimizing plan {}", id);

    let run = {
        let state = state.clone();
        tokio::spawn(async move {
            let outcome = state.planner.optimize(plan, &request, &cancel).await;
            let cancelled = matches!(outcome, Err(PlannerError::Cancelled));
            let stored = state.registry.finish_optimize(id, outcome).await;
            (cancelled, stored)
        })
    };

    if query.wait {
        let (cancelled, stored) = run
            .await
            .map_err(|e| ApiError::internal(format!("optimize task failed: {}", e)))?;
        if cancelled {
            return Err(PlannerError::Cancelled.into());
        }
        stored?;
    }

    let plan = state.registry.get(id).await?;
    Ok((StatusCode::ACCEPTED, Json(plan.into())))
}

pub async fn cancel_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state.registry.cancel(id).await?;
    Ok(Json(CancelResponse { id, cancelled }))
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanResponse>, ApiError> {
    Ok(Json(state.registry.get(id).await?.into()))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.registry.status(id).await?;
    Ok(Json(StatusResponse { id, status }))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_assets(State(state): State<AppState>) -> Result<Json<Vec<AssetCapability>>, ApiError> {
    Ok(Json(state.planner.catalog().list().await?))
}

/// Optimize outcome counters and access cache hit rates
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.planner.metrics())
}
