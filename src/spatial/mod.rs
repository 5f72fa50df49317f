//! Read-only spatial store access (spots, facilities, access points, POIs)
//!
//! The store is an external PostGIS database; this module holds the three
//! queries the pipeline needs. The [`SpatialStore`] trait is the seam the
//! worker pipeline is written against, so scenarios can run against an
//! in-memory fake.

pub mod access_points;
pub mod pois;
pub mod spots;

pub use pois::PoiHit;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::PlanError;
use crate::types::{Coord, Language, SpotRef};

#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Resolve spot identifiers to localized metadata. Unknown ids are
    /// omitted from the result.
    async fn resolve_spots(
        &self,
        ids: &[String],
        language: Language,
    ) -> Result<HashMap<String, SpotRef>, PlanError>;

    /// Nearest drivable approach to an off-road destination, if any.
    async fn nearest_access_point(&self, around: Coord) -> Result<Option<Coord>, PlanError>;

    /// POIs within the mode-specific corridors around the route. The
    /// line arguments are GeoJSON MultiLineStrings per mode.
    async fn pois_near_route(
        &self,
        car_line: Option<&geojson::Geometry>,
        foot_line: Option<&geojson::Geometry>,
        car_m: f64,
        foot_m: f64,
    ) -> Result<Vec<PoiHit>, PlanError>;
}

/// The PostGIS-backed store used in production.
pub struct PgSpatialStore {
    pool: PgPool,
}

impl PgSpatialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpatialStore for PgSpatialStore {
    async fn resolve_spots(
        &self,
        ids: &[String],
        language: Language,
    ) -> Result<HashMap<String, SpotRef>, PlanError> {
        spots::resolve(&self.pool, ids, language)
            .await
            .map_err(|e| PlanError::from_sqlx("spatial-db", e))
    }

    async fn nearest_access_point(&self, around: Coord) -> Result<Option<Coord>, PlanError> {
        access_points::nearest(&self.pool, around)
            .await
            .map_err(|e| PlanError::from_sqlx("spatial-db", e))
    }

    async fn pois_near_route(
        &self,
        car_line: Option<&geojson::Geometry>,
        foot_line: Option<&geojson::Geometry>,
        car_m: f64,
        foot_m: f64,
    ) -> Result<Vec<PoiHit>, PlanError> {
        pois::near_route(&self.pool, car_line, foot_line, car_m, foot_m)
            .await
            .map_err(|e| PlanError::from_sqlx("spatial-db", e))
    }
}
