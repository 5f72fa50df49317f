//! Navipack service binary — HTTP façade plus queue workers in one process
//!
//! ## Environment variables
//!
//! | Variable             | Required | Description                              |
//! |----------------------|----------|------------------------------------------|
//! | `QUEUE_BROKER_URL`   | Yes      | Postgres DSN of the job store            |
//! | `SPATIAL_DB_*`       | Yes      | Spatial store host/port/name/user/pass   |
//! | `PACKS_ROOT`         | No       | Pack directory root (default `/packs`)   |
//! | `ROUTING_BASE`       | No       | Route solver base URL                    |
//! | `NARRATION_BASE`     | No       | Narration engine base URL                |
//! | `SYNTH_BASE`         | No       | Speech engine base URL                   |
//! | `NAV_WORKERS`        | No       | Worker tasks on the nav queue (default 2)|

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use navipack::api::{build_router, ApiState};
use navipack::db;
use navipack::engines::{HttpNarrationEngine, HttpRouteSolver, HttpSpeechEngine};
use navipack::jobs::{queue::QUEUE_NAV, reaper, run_worker, WorkerContext};
use navipack::spatial::PgSpatialStore;
use navipack::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "navipack", about = "Navipack — sightseeing navigation pack planner")]
struct CliArgs {
    /// Postgres DSN of the job queue store
    #[arg(long, env = "QUEUE_BROKER_URL")]
    queue_broker_url: Option<String>,

    /// Port to listen on (default: 9100)
    #[arg(long, short)]
    port: Option<u16>,

    /// Bind address (overrides --port)
    #[arg(long)]
    bind_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,navipack=debug")),
        )
        .init();

    let args = CliArgs::parse();
    let config = AppConfig::from_env(args.queue_broker_url, args.bind_address, args.port)?;

    if config.queue_broker_url.is_empty() {
        anyhow::bail!(
            "QUEUE_BROKER_URL must be set via --queue-broker-url or the QUEUE_BROKER_URL env var"
        );
    }

    info!(bind = %config.bind_address, "Starting navipack");
    let config = Arc::new(config);

    // ── Stores ───────────────────────────────────────────────────────────
    let queue_pool = db::create_pool(&config.queue_broker_url).await?;
    db::run_migrations(&queue_pool).await?;

    let spatial_pool = db::create_pool(&config.spatial_db_url).await?;
    let spatial_store = Arc::new(PgSpatialStore::new(spatial_pool));

    // ── Engine clients ───────────────────────────────────────────────────
    let solver = Arc::new(HttpRouteSolver::new(
        &config.routing_base,
        config.routing_timeout_secs,
    )?);
    let narration = Arc::new(HttpNarrationEngine::new(
        &config.narration_base,
        config.narration_timeout_secs,
    )?);
    let speech = Arc::new(HttpSpeechEngine::new(
        &config.synth_base,
        config.synth_timeout_secs,
    )?);

    // ── Workers ──────────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    let ctx = Arc::new(WorkerContext {
        queue_pool: queue_pool.clone(),
        spatial: spatial_store,
        solver,
        narration,
        speech,
        config: Arc::clone(&config),
    });

    for worker_id in 0..config.nav_workers.max(1) {
        tracker.spawn(run_worker(
            Arc::clone(&ctx),
            QUEUE_NAV.to_string(),
            worker_id,
            cancel.clone(),
        ));
    }
    tracker.spawn(reaper::run_reaper(
        queue_pool.clone(),
        config.job_ttl_secs,
        cancel.clone(),
    ));

    // ── HTTP façade ──────────────────────────────────────────────────────
    let state = Arc::new(ApiState {
        queue_pool: queue_pool.clone(),
        config: Arc::clone(&config),
    });
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(addr = %config.bind_address, "Submit/poll façade listening");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    let server_cancel = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    // Drain workers before exiting so in-flight jobs finish cleanly.
    cancel.cancel();
    tracker.close();
    tracker.wait().await;
    info!("Navipack stopped");

    Ok(())
}
