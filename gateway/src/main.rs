use anyhow::Result;
use axum::{
    routing::{get, post},
    Json, Router,
};
use collection_planner::access::{
    OrbitalAccessOracle, PassTableOracle, RemoteAccessOracle, SensorGeometry,
};
use collection_planner::{
    loader, AccessOracle, AssetRegistry, CapabilityCatalog, CollectionPlanner, PlanRegistry,
    PlannerConfig,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod routes;

#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<CollectionPlanner>,
    pub registry: Arc<PlanRegistry>,
}

pub fn app(state: AppState) -> Router {
    let plan_routes = Router::new()
        .route("/", post(routes::create_plan))
        .route("/:id", get(routes::get_plan).delete(routes::delete_plan))
        .route("/:id/status", get(routes::get_status))
        .route("/:id/optimize", post(routes::optimize_plan))
        .route("/:id/cancel", post(routes::cancel_plan));

    let api_routes = Router::new()
        .nest("/plans", plan_routes)
        .route("/assets", get(routes::list_assets))
        .route("/metrics", get(routes::metrics))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn env_path(name: &str) -> Option<std::path::PathBuf> {
    std::env::var(name).ok().map(std::path::PathBuf::from)
}

fn build_oracle(config: &PlannerConfig) -> Result<Arc<dyn AccessOracle>> {
    if let Some(path) = env_path("PLANNER_PASS_TABLE") {
        return Ok(Arc::new(PassTableOracle::new(loader::load_pass_table(path)?)));
    }
    if let Some(path) = env_path("PLANNER_TLE") {
        return Ok(Arc::new(OrbitalAccessOracle::new(
            loader::load_satellites(path)?,
            SensorGeometry::default(),
        )));
    }
    if let Ok(url) = std::env::var("PLANNER_ORACLE_URL") {
        let api_key = std::env::var("PLANNER_ORACLE_API_KEY").ok();
        return Ok(Arc::new(RemoteAccessOracle::new(
            &url,
            api_key,
            config.access.timeout(),
        )?));
    }
    tracing::warn!("   No access oracle configured; every plan will lack candidates");
    Ok(Arc::new(PassTableOracle::new(Vec::new())))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "planning_gateway=debug,collection_planner=info,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match env_path("PLANNER_CONFIG") {
        Some(path) => PlannerConfig::from_file(&path)?,
        None => PlannerConfig::default(),
    };

    let catalog: Arc<dyn CapabilityCatalog> = match env_path("PLANNER_CATALOG") {
        Some(path) => Arc::new(AssetRegistry::from_file(&path)?),
        None => Arc::new(AssetRegistry::with_reference_assets()),
    };
    tracing::info!("   Catalog: {} assets", catalog.list().await?.len());

    let oracle = build_oracle(&config)?;
    tracing::info!("   Access oracle: {}", oracle.name());

    let state = AppState {
        planner: Arc::new(CollectionPlanner::new(config, catalog, oracle)?),
        registry: Arc::new(PlanRegistry::new()),
    };

    let port = std::env::var("PLANNING_GATEWAY_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "18610".to_string());
    let addr = format!("0.0.0.0:{}", port);

    tracing::info!("Planning Gateway starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "planning-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
