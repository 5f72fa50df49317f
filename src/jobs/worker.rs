//! Worker loop and the plan pipeline.
//!
//! A worker task claims one job at a time from its queue (prefetch = 1 by
//! construction: nothing else is held while a job runs), executes the
//! pipeline stages in order, and records the outcome. Stage errors are
//! classified by kind; retryable ones re-queue the job with backoff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::{self, AudioSettings};
use crate::config::AppConfig;
use crate::corridor;
use crate::engines::narration::NarrationEngine;
use crate::engines::routing::RouteSolver;
use crate::engines::speech::SpeechEngine;
use crate::error::PlanError;
use crate::jobs::queue::{claim_job, complete_job, fail_job};
use crate::narration;
use crate::pack;
use crate::route::{stitch, RouteBuilder};
use crate::spatial::SpatialStore;
use crate::types::{Coord, Manifest, PlanRequest, SpotRef};

/// Waypoint ids that stand for the caller's live position. They must be
/// resolved to coordinates upstream; the pipeline rejects them.
const SENTINEL_IDS: [&str; 3] = ["current", "here", "me"];

/// Everything a worker needs: the queue store, the spatial store, and
/// the three engine clients. Pools and clients are created once at
/// startup and shared across workers.
pub struct WorkerContext {
    pub queue_pool: sqlx::PgPool,
    pub spatial: Arc<dyn SpatialStore>,
    pub solver: Arc<dyn RouteSolver>,
    pub narration: Arc<dyn NarrationEngine>,
    pub speech: Arc<dyn SpeechEngine>,
    pub config: Arc<AppConfig>,
}

/// Run one worker until cancelled. Polls the queue on a fixed cadence
/// and processes at most one job per tick.
pub async fn run_worker(
    ctx: Arc<WorkerContext>,
    queue: String,
    worker_id: usize,
    cancel: CancellationToken,
) {
    info!(queue = %queue, worker_id, "Plan worker started");

    let mut interval =
        tokio::time::interval(Duration::from_secs(ctx.config.worker_poll_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(queue = %queue, worker_id, "Plan worker stopping");
                break;
            }
            _ = interval.tick() => {
                match run_one_job(&ctx, &queue).await {
                    Ok(Some(job_id)) => {
                        info!(job_id = %job_id, "Plan job completed successfully");
                    }
                    Ok(None) => {
                        debug!(queue = %queue, "No runnable plan jobs");
                    }
                    Err(e) => {
                        error!(error = %e, "Plan job processing error");
                    }
                }
            }
        }
    }
}

/// Claim and process one job. Returns the job id on success, `None` when
/// the queue is empty.
async fn run_one_job(ctx: &WorkerContext, queue: &str) -> anyhow::Result<Option<String>> {
    let job = match claim_job(&ctx.queue_pool, queue).await? {
        Some(j) => j,
        None => return Ok(None),
    };

    info!(
        job_id = %job.id,
        pack_id = %job.pack_id,
        retry = job.retry_count,
        "Claimed plan job"
    );

    let request: PlanRequest = match serde_json::from_value(job.request.clone()) {
        Ok(r) => r,
        Err(e) => {
            let err = PlanError::Validation(format!("undecodable plan request: {e}"));
            fail_job(&ctx.queue_pool, &job, err.kind(), &err.to_string(), false, 0).await?;
            return Err(err.into());
        }
    };

    match execute_plan(ctx, job.pack_id, &request).await {
        Ok(manifest) => {
            let result = serde_json::to_value(&manifest)?;
            complete_job(&ctx.queue_pool, &job.id, &result).await?;
            Ok(Some(job.id))
        }
        Err(e) => {
            warn!(
                job_id = %job.id,
                pack_id = %job.pack_id,
                error_kind = e.kind(),
                error = %e,
                "Plan job failed"
            );
            fail_job(
                &ctx.queue_pool,
                &job,
                e.kind(),
                &e.to_string(),
                e.is_retryable(),
                e.retry_budget(),
            )
            .await?;
            Err(e.into())
        }
    }
}

/// The plan pipeline: resolve spots, build and stitch the route, find
/// corridor POIs, generate narrations, fan out synthesis, assemble and
/// commit the pack. Public so scenario tests can drive it directly
/// against fake seams.
pub async fn execute_plan(
    ctx: &WorkerContext,
    pack_id: Uuid,
    request: &PlanRequest,
) -> Result<Manifest, PlanError> {
    let language = request.language;

    // ── Validation ───────────────────────────────────────────────────────
    let planned_ids: Vec<String> = request
        .waypoints
        .iter()
        .map(|w| w.spot_id.trim().to_string())
        .collect();
    if planned_ids.is_empty() {
        return Err(PlanError::Validation("at least one waypoint is required".into()));
    }
    for id in &planned_ids {
        if id.is_empty() {
            return Err(PlanError::Validation("waypoint spot_id must not be empty".into()));
        }
        if SENTINEL_IDS.contains(&id.to_lowercase().as_str()) {
            return Err(PlanError::Validation(format!(
                "dynamic spot_id '{id}' must be resolved upstream"
            )));
        }
    }

    let mut unique_ids: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for id in &planned_ids {
        if seen.insert(id.as_str()) {
            unique_ids.push(id.clone());
        }
    }

    // ── C1: resolve planned spots ────────────────────────────────────────
    let spots = ctx.spatial.resolve_spots(&unique_ids, language).await?;
    let missing: Vec<&String> = unique_ids.iter().filter(|id| !spots.contains_key(*id)).collect();
    if !missing.is_empty() {
        return Err(PlanError::Validation(format!("spot_id not found: {missing:?}")));
    }

    // ── C2: build and stitch the route ───────────────────────────────────
    let mut points: Vec<Coord> = Vec::with_capacity(planned_ids.len() + 2);
    points.push(request.origin);
    for id in &planned_ids {
        let spot = spots
            .get(id)
            .ok_or_else(|| PlanError::Internal(format!("resolved spot '{id}' vanished")))?;
        points.push(Coord::new(spot.lat, spot.lon));
    }
    if request.return_to_origin {
        points.push(request.origin);
    }

    let builder = RouteBuilder::new(
        ctx.solver.as_ref(),
        ctx.spatial.as_ref(),
        ctx.config.car_arrival_tolerance_m,
    );
    let legs = builder.build_legs(&points).await?;
    let plan = stitch(legs);
    info!(
        pack_id = %pack_id,
        legs = plan.legs.len(),
        vertices = plan.polyline.len(),
        "Route stitched"
    );

    // ── C3: along-route POIs ─────────────────────────────────────────────
    let (car_m, foot_m) = match request.buffer {
        Some(b) => (b.car_m, b.foot_m),
        None => (ctx.config.buffer_car_m, ctx.config.buffer_foot_m),
    };
    let (car_line, foot_line) = corridor::mode_multilines(&plan.polyline, &plan.segments);
    let hits = if car_line.is_none() && foot_line.is_none() {
        Vec::new()
    } else {
        ctx.spatial
            .pois_near_route(car_line.as_ref(), foot_line.as_ref(), car_m, foot_m)
            .await?
    };
    let excluded: HashSet<String> = unique_ids.iter().cloned().collect();
    let along_pois = corridor::reduce(hits, &plan.polyline, &excluded);
    info!(pack_id = %pack_id, along_pois = along_pois.len(), "Corridor POIs reduced");

    // ── C4: narration ────────────────────────────────────────────────────
    let requests = narration::plan_requests(&unique_ids, &along_pois);

    // Along-route hits may be absent from the planned resolution; give
    // them a minimal SpotRef from the corridor row so narration still
    // covers them.
    let mut narration_spots: HashMap<String, SpotRef> = spots.clone();
    for poi in &along_pois {
        narration_spots
            .entry(poi.spot_id.clone())
            .or_insert_with(|| SpotRef {
                spot_id: poi.spot_id.clone(),
                name: poi.name.clone(),
                description: String::new(),
                md_slug: None,
                lat: poi.lat,
                lon: poi.lon,
                kind: poi.kind,
            });
    }

    let items =
        narration::generate(ctx.narration.as_ref(), language, &narration_spots, &requests).await?;
    info!(pack_id = %pack_id, narrations = items.len(), "Narration batch complete");

    // ── C5: audio fan-out ────────────────────────────────────────────────
    let settings = AudioSettings {
        packs_root: ctx.config.packs_root.clone(),
        preferred_format: ctx.config.voice_format,
        bitrate_kbps: ctx.config.voice_bitrate_kbps,
        save_text: ctx.config.voice_save_text,
    };
    let audio_map =
        audio::synthesize_all(ctx.speech.as_ref(), &settings, pack_id, language, &items).await?;
    let synthesized = audio_map.len();
    if synthesized < items.iter().filter(|i| !i.text.is_empty()).count() {
        warn!(
            pack_id = %pack_id,
            synthesized,
            requested = items.len(),
            "Partial synthesis: some assets will carry text only"
        );
    }

    // ── C6: assemble and commit ──────────────────────────────────────────
    let assets = pack::join_assets(&items, audio_map);
    let final_legs = pack::finalize_legs(&plan)?;
    let waypoints_info = pack::waypoints_info(&unique_ids, &spots, &plan);

    let manifest = pack::compose_manifest(
        pack_id,
        language,
        plan,
        final_legs,
        waypoints_info,
        along_pois,
        assets,
    );
    let path = pack::write_manifest(&ctx.config.packs_root, &manifest).await?;
    info!(pack_id = %pack_id, path = %path.display(), "Pack manifest committed");

    Ok(manifest)
}
