//! Collection Planning CLI
//!
//! Plans collection windows for one AOI and one asset.
//!
//! Usage:
//!   plan-collection --aoi data/aoi.geojson --asset custom-01 \
//!                   --passes data/passes.json \
//!                   --start 2025-06-01T00:00:00Z --end 2025-06-08T00:00:00Z \
//!                   --output collection_plan.json --geojson

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use collection_planner::access::{
    OrbitalAccessOracle, PassTableOracle, RemoteAccessOracle, SensorGeometry,
};
use collection_planner::{
    geometry, loader, AccessOracle, AssetRegistry, CancelToken, CapabilityCatalog,
    CollectionPlanner, PlanRequest, PlanStatus, PlannerConfig, SearchRequirements,
    TemporalWindow,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "plan-collection",
    about = "Plan satellite collection windows over an area of interest"
)]
struct Args {
    /// AOI as GeoJSON (Polygon or Point)
    #[arg(short = 'a', long)]
    aoi: PathBuf,

    /// Asset id to plan for
    #[arg(long)]
    asset: String,

    /// Asset catalog JSON (defaults to the built-in reference assets)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Pre-computed pass table JSON
    #[arg(short = 'p', long, conflicts_with_all = ["tle", "oracle_url"])]
    passes: Option<PathBuf>,

    /// Satellites JSON with TLEs, propagated with SGP4
    #[arg(long, conflicts_with = "oracle_url")]
    tle: Option<PathBuf>,

    /// Remote access oracle base URL
    #[arg(long)]
    oracle_url: Option<String>,

    /// Bearer token for the remote oracle
    /// (falls back to PLANNER_ORACLE_API_KEY)
    #[arg(long)]
    oracle_api_key: Option<String>,

    /// Maximum sensor off-nadir angle for the SGP4 oracle, degrees
    #[arg(long, default_value_t = 30.0)]
    max_off_nadir: f64,

    /// Window start (RFC 3339)
    #[arg(long)]
    start: DateTime<Utc>,

    /// Window end (RFC 3339)
    #[arg(long)]
    end: DateTime<Utc>,

    /// Search requirements JSON
    #[arg(short = 'r', long)]
    requirements: Option<PathBuf>,

    /// Search id recorded on the plan
    #[arg(long, default_value = "cli")]
    search_id: String,

    /// Planner configuration JSON
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Worker tasks (0 = available cores)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Output JSON file
    #[arg(short, long, default_value = "collection_plan.json")]
    output: PathBuf,

    /// Also output GeoJSON
    #[arg(long)]
    geojson: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn build_oracle(args: &Args, config: &PlannerConfig) -> Result<Arc<dyn AccessOracle>> {
    if let Some(path) = &args.passes {
        return Ok(Arc::new(PassTableOracle::new(loader::load_pass_table(path)?)));
    }
    if let Some(path) = &args.tle {
        let sensor = SensorGeometry {
            max_off_nadir_deg: args.max_off_nadir,
            ..SensorGeometry::default()
        };
        return Ok(Arc::new(OrbitalAccessOracle::new(
            loader::load_satellites(path)?,
            sensor,
        )));
    }
    if let Some(url) = &args.oracle_url {
        return Ok(Arc::new(RemoteAccessOracle::new(
            url,
            args.oracle_api_key
                .clone()
                .or_else(|| std::env::var("PLANNER_ORACLE_API_KEY").ok()),
            config.access.timeout(),
        )?));
    }
    bail!("one of --passes, --tle or --oracle-url is required")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Collection Planner");
    info!("{}", "=".repeat(60));

    let mut config = match &args.config {
        Some(path) => PlannerConfig::from_file(path)?,
        None => PlannerConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }

    let catalog: Arc<dyn CapabilityCatalog> = match &args.catalog {
        Some(path) => Arc::new(AssetRegistry::from_file(path)?),
        None => Arc::new(AssetRegistry::with_reference_assets()),
    };

    let request = PlanRequest {
        search_id: args.search_id.clone(),
        asset_id: args.asset.clone(),
        area: loader::load_area(&args.aoi)?,
        window: TemporalWindow::new(args.start, args.end)?,
        requirements: match &args.requirements {
            Some(path) => loader::load_requirements(path)?,
            None => SearchRequirements::default(),
        },
    };

    let oracle = build_oracle(&args, &config)?;
    info!("Access oracle: {}", oracle.name());
    let decomposer = config.decomposer.clone();
    let planner = CollectionPlanner::new(config, Arc::clone(&catalog), oracle)?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling");
                cancel.cancel();
            }
        });
    }

    let plan = planner
        .plan(&request, &cancel)
        .await
        .context("planning did not produce a plan")?;

    // Write output
    info!("Writing plan to {:?}", args.output);
    let file = File::create(&args.output)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &plan)?;

    // Write GeoJSON if requested
    if args.geojson {
        let capability = catalog.resolve(&request.asset_id).await?;
        let strips =
            geometry::decompose_with(&request.area, capability.swath_width_km, &decomposer)?;
        let geojson_path = args.output.with_extension("geojson");
        info!("Writing GeoJSON to {:?}", geojson_path);
        let file = File::create(&geojson_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &loader::to_geojson(&plan, &strips))?;
    }

    // Summary
    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Plan {}: {}", plan.id, plan.status);
    info!("Strips: {}", plan.strip_count);
    info!("Windows: {}", plan.collection_windows.len());
    info!("Confidence: {:.1}", plan.confidence_score);
    for entry in &plan.capability_matrix {
        info!("  {:?}: {:.1}", entry.asset_type, entry.confidence_score);
    }
    if let Some(failure) = &plan.failure {
        warn!("{}: {}", failure.code, failure.message);
    }

    if plan.status == PlanStatus::Failed {
        std::process::exit(2);
    }
    Ok(())
}
