//! Per-profile route solver client (OSRM-shaped HTTP API).
//!
//! The solver distinguishes two failure classes: a *logical* miss (the
//! engine answered but found no route) returns `Ok(None)` and lets the
//! route builder fall back to an access point; transport failures and
//! timeouts surface as retryable upstream errors.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PlanError;
use crate::types::{Coord, TravelMode};

const SERVICE: &str = "routing";

/// One solved route between two points.
#[derive(Debug, Clone)]
pub struct SolvedRoute {
    pub distance_m: f64,
    pub duration_s: f64,
    /// LineString coordinates, `[lon, lat]` per vertex.
    pub geometry: Vec<[f64; 2]>,
}

#[async_trait]
pub trait RouteSolver: Send + Sync {
    /// Solve a single leg. `Ok(None)` means the engine could not route
    /// between the points (not an error — the caller switches modes).
    async fn solve(
        &self,
        mode: TravelMode,
        from: Coord,
        to: Coord,
    ) -> Result<Option<SolvedRoute>, PlanError>;
}

// ─── OSRM wire types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    geometry: Option<OsrmGeometry>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

// ─── HTTP implementation ─────────────────────────────────────────────────────

pub struct HttpRouteSolver {
    http: reqwest::Client,
    base: String,
}

impl HttpRouteSolver {
    pub fn new(base: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: super::http_client(timeout_secs)?,
            base: super::trim_base(base),
        })
    }

    fn profile(mode: TravelMode) -> &'static str {
        match mode {
            TravelMode::Car => "driving",
            TravelMode::Foot => "foot",
        }
    }

    fn url(&self, mode: TravelMode, from: Coord, to: Coord) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson&steps=false&alternatives=0",
            self.base,
            Self::profile(mode),
            from.lon,
            from.lat,
            to.lon,
            to.lat,
        )
    }
}

#[async_trait]
impl RouteSolver for HttpRouteSolver {
    async fn solve(
        &self,
        mode: TravelMode,
        from: Coord,
        to: Coord,
    ) -> Result<Option<SolvedRoute>, PlanError> {
        let url = self.url(mode, from, to);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PlanError::from_reqwest(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            // OSRM answers 400 for unroutable coordinate pairs; that is a
            // logical miss, not a protocol violation.
            if status.is_client_error() {
                return Ok(None);
            }
            return Err(PlanError::from_status(SERVICE, status));
        }

        let body: OsrmResponse = resp.json().await.map_err(|e| PlanError::UpstreamProtocol {
            service: SERVICE,
            message: e.to_string(),
        })?;

        if body.code != "Ok" || body.routes.is_empty() {
            return Ok(None);
        }

        let route = &body.routes[0];
        Ok(Some(SolvedRoute {
            distance_m: route.distance,
            duration_s: route.duration,
            geometry: route
                .geometry
                .as_ref()
                .map(|g| g.coordinates.clone())
                .unwrap_or_default(),
        }))
    }
}
