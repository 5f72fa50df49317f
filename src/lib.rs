//! Navipack: multilingual sightseeing navigation pack planner
//!
//! A durable, asynchronous workflow that turns an origin plus an ordered
//! list of destination spots into a persisted "navigation pack": a
//! stitched multi-modal route, along-route points of interest, generated
//! narration per spot and situational variant, synthesized audio, and a
//! manifest committed under the pack directory.
//!
//! ## Architecture
//!
//! - **api** — HTTP submit/poll façade
//! - **jobs** — Postgres-backed job queue, worker loop, TTL reaper
//! - **route** — leg construction with car/foot switching, stitching
//! - **corridor** — along-route POI discovery
//! - **narration / audio / pack** — narration fan-out, synthesis fan-out,
//!   pack assembly and the atomic manifest commit
//! - **spatial / engines** — the external collaborators behind seams

pub mod api;
pub mod audio;
pub mod config;
pub mod corridor;
pub mod db;
pub mod engines;
pub mod error;
pub mod geo;
pub mod jobs;
pub mod narration;
pub mod pack;
pub mod route;
pub mod spatial;
pub mod types;

// Re-export the configuration and error types used at every layer.
pub use config::AppConfig;
pub use error::PlanError;

// Re-export commonly used domain types.
pub use types::{
    AlongPoi, Asset, Audio, AudioFormat, Coord, Language, Leg, Manifest, NarrationItem,
    PlanRequest, RouteLeg, RoutePlan, Segment, SpotRef, TravelMode, Variant,
};

// Re-export the workflow entry points.
pub use jobs::{execute_plan, run_worker, WorkerContext};
