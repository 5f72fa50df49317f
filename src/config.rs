//! Service configuration — environment variables, CLI overrides, defaults

use std::path::PathBuf;

use tracing::warn;

use crate::types::AudioFormat;

/// Navipack configuration, assembled from environment variables with CLI
/// overrides (CLI wins).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address for the submit/poll façade (e.g. "0.0.0.0:9100").
    pub bind_address: String,
    /// Filesystem root for pack directories.
    pub packs_root: PathBuf,
    /// Base URL of the OSRM-shaped per-profile route solver.
    pub routing_base: String,
    /// Base URL of the narration engine.
    pub narration_base: String,
    /// Base URL of the speech-synthesis engine.
    pub synth_base: String,
    /// Postgres DSN of the job queue store.
    pub queue_broker_url: String,
    /// Postgres DSN of the read-only spatial store.
    pub spatial_db_url: String,
    /// Preferred synthesis format (WAV is the transcode fallback).
    pub voice_format: AudioFormat,
    /// MP3 bitrate used for synthesis and duration estimation.
    pub voice_bitrate_kbps: u32,
    /// Whether the speech engine saves sidecar text files.
    pub voice_save_text: bool,
    /// Maximum distance between a routed car endpoint and the intended
    /// destination before the access-point fallback triggers (meters).
    pub car_arrival_tolerance_m: f64,
    /// Default corridor widths when the request omits them (meters).
    pub buffer_car_m: f64,
    pub buffer_foot_m: f64,
    /// Worker tasks consuming the `nav` queue.
    pub nav_workers: usize,
    /// Claim poll cadence when the queue is idle (seconds).
    pub worker_poll_interval_secs: u64,
    /// Per-call budgets (seconds).
    pub routing_timeout_secs: u64,
    pub narration_timeout_secs: u64,
    pub synth_timeout_secs: u64,
    /// Terminal jobs older than this are reaped (seconds).
    pub job_ttl_secs: u64,
    /// Default retry ceiling for newly enqueued jobs.
    pub max_retries: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9100".to_string(),
            packs_root: PathBuf::from("/packs"),
            routing_base: "http://routing:5000".to_string(),
            narration_base: "http://narration:9103".to_string(),
            synth_base: "http://speech:9104".to_string(),
            queue_broker_url: String::new(),
            spatial_db_url: String::new(),
            voice_format: AudioFormat::Mp3,
            voice_bitrate_kbps: 64,
            voice_save_text: true,
            car_arrival_tolerance_m: 50.0,
            buffer_car_m: 300.0,
            buffer_foot_m: 10.0,
            nav_workers: 2,
            worker_poll_interval_secs: 1,
            routing_timeout_secs: 30,
            narration_timeout_secs: 180,
            synth_timeout_secs: 300,
            job_ttl_secs: 3600,
            max_retries: 3,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(key) {
        match v.parse() {
            Ok(n) => *slot = n,
            Err(_) => warn!(key, value = %v, "Ignoring unparseable environment value"),
        }
    }
}

fn env_string(key: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(key) {
        if !v.is_empty() {
            *slot = v;
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with CLI overrides.
    ///
    /// The queue broker DSN is mandatory; callers should fail startup when
    /// it is empty after both sources are consulted.
    pub fn from_env(
        queue_broker_url: Option<String>,
        bind_address: Option<String>,
        port: Option<u16>,
    ) -> anyhow::Result<Self> {
        let mut config = Self::default();

        config.queue_broker_url = queue_broker_url
            .or_else(|| std::env::var("QUEUE_BROKER_URL").ok())
            .unwrap_or_default();

        // The teacher store keeps results on the job row itself, so a
        // separate result backend collapses into the broker store.
        if let Ok(backend) = std::env::var("QUEUE_RESULT_BACKEND") {
            if !backend.is_empty() && backend != config.queue_broker_url {
                warn!(
                    "QUEUE_RESULT_BACKEND differs from the broker; results are \
                     stored on the job rows in the broker store"
                );
            }
        }

        if let Some(addr) = bind_address {
            config.bind_address = addr;
        } else if let Some(p) = port {
            config.bind_address = format!("0.0.0.0:{}", p);
        } else {
            env_string("BIND_ADDRESS", &mut config.bind_address);
        }

        if let Ok(root) = std::env::var("PACKS_ROOT") {
            if !root.is_empty() {
                config.packs_root = PathBuf::from(root);
            }
        }

        env_string("ROUTING_BASE", &mut config.routing_base);
        env_string("NARRATION_BASE", &mut config.narration_base);
        env_string("SYNTH_BASE", &mut config.synth_base);

        config.spatial_db_url = spatial_db_url_from_env();

        if let Ok(v) = std::env::var("VOICE_FORMAT") {
            match v.to_lowercase().as_str() {
                "mp3" => config.voice_format = AudioFormat::Mp3,
                "wav" => config.voice_format = AudioFormat::Wav,
                other => warn!(value = %other, "Ignoring unknown VOICE_FORMAT"),
            }
        }
        env_parse("VOICE_BITRATE_KBPS", &mut config.voice_bitrate_kbps);
        env_parse("VOICE_SAVE_TEXT", &mut config.voice_save_text);
        env_parse("CAR_ARRIVAL_TOLERANCE_M", &mut config.car_arrival_tolerance_m);
        env_parse("BUFFER_CAR_M", &mut config.buffer_car_m);
        env_parse("BUFFER_FOOT_M", &mut config.buffer_foot_m);
        env_parse("NAV_WORKERS", &mut config.nav_workers);
        env_parse("WORKER_POLL_INTERVAL_SECS", &mut config.worker_poll_interval_secs);
        env_parse("ROUTING_TIMEOUT_SECS", &mut config.routing_timeout_secs);
        env_parse("NARRATION_TIMEOUT_SECS", &mut config.narration_timeout_secs);
        env_parse("SYNTH_TIMEOUT_SECS", &mut config.synth_timeout_secs);
        env_parse("JOB_TTL_SECS", &mut config.job_ttl_secs);
        env_parse("MAX_RETRIES", &mut config.max_retries);

        Ok(config)
    }
}

/// Build the spatial store DSN from its `SPATIAL_DB_*` parts.
fn spatial_db_url_from_env() -> String {
    let host = std::env::var("SPATIAL_DB_HOST").unwrap_or_else(|_| "static-db".to_string());
    let port = std::env::var("SPATIAL_DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let name = std::env::var("SPATIAL_DB_NAME").unwrap_or_else(|_| "nav_static".to_string());
    let user = std::env::var("SPATIAL_DB_USER").unwrap_or_else(|_| "nav_static".to_string());
    let password =
        std::env::var("SPATIAL_DB_PASSWORD").unwrap_or_else(|_| "nav_static".to_string());
    format!("postgres://{user}:{password}@{host}:{port}/{name}")
}
