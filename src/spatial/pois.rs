//! Corridor POI query: POIs within mode-specific geodesic buffers of the
//! route, executed with an indexed geography distance operator.

use sqlx::PgPool;

use crate::types::{PoiKind, TravelMode};

/// A raw corridor hit as reported by the store. `distance_m` is the
/// minimum geodesic distance to either mode line; `source_segment_mode`
/// is the corridor the POI fell within (car takes precedence).
#[derive(Debug, Clone)]
pub struct PoiHit {
    pub spot_id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub kind: PoiKind,
    pub distance_m: Option<f64>,
    pub source_segment_mode: Option<TravelMode>,
}

const NEAR_ROUTE_SQL: &str = r#"
WITH car_line AS (
  SELECT CASE WHEN $1::text IS NOT NULL
              THEN ST_GeomFromGeoJSON($1)::geometry END AS g
),
foot_line AS (
  SELECT CASE WHEN $2::text IS NOT NULL
              THEN ST_GeomFromGeoJSON($2)::geometry END AS g
),
car_geog  AS (SELECT CASE WHEN g IS NOT NULL THEN g::geography END AS gg FROM car_line),
foot_geog AS (SELECT CASE WHEN g IS NOT NULL THEN g::geography END AS gg FROM foot_line)
SELECT
  p.spot_id, p.name, p.lon, p.lat, p.kind,
  LEAST(
    COALESCE(ST_Distance(p.geom::geography, (SELECT gg FROM car_geog)),  1e15),
    COALESCE(ST_Distance(p.geom::geography, (SELECT gg FROM foot_geog)), 1e15)
  ) AS distance_m,
  CASE
    WHEN (SELECT gg FROM car_geog)  IS NOT NULL
     AND ST_DWithin(p.geom::geography, (SELECT gg FROM car_geog),  $3) THEN 'car'
    WHEN (SELECT gg FROM foot_geog) IS NOT NULL
     AND ST_DWithin(p.geom::geography, (SELECT gg FROM foot_geog), $4) THEN 'foot'
    ELSE NULL
  END AS source_segment_mode
FROM poi_features_v p
WHERE
  ( (SELECT gg FROM car_geog)  IS NOT NULL
    AND ST_DWithin(p.geom::geography, (SELECT gg FROM car_geog),  $3) )
  OR
  ( (SELECT gg FROM foot_geog) IS NOT NULL
    AND ST_DWithin(p.geom::geography, (SELECT gg FROM foot_geog), $4) )
"#;

type HitRow = (String, String, f64, f64, String, f64, Option<String>);

/// Query POIs within `car_m` of the car line or `foot_m` of the foot
/// line. Either line may be absent (e.g. a fully drivable route has no
/// foot corridor).
pub async fn near_route(
    pool: &PgPool,
    car_line: Option<&geojson::Geometry>,
    foot_line: Option<&geojson::Geometry>,
    car_m: f64,
    foot_m: f64,
) -> Result<Vec<PoiHit>, sqlx::Error> {
    if car_line.is_none() && foot_line.is_none() {
        return Ok(Vec::new());
    }

    let car_geojson = car_line
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    let foot_geojson = foot_line
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    let rows: Vec<HitRow> = sqlx::query_as(NEAR_ROUTE_SQL)
        .bind(car_geojson)
        .bind(foot_geojson)
        .bind(car_m)
        .bind(foot_m)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(spot_id, name, lon, lat, kind, distance_m, mode)| PoiHit {
            spot_id,
            name,
            lon,
            lat,
            kind: match kind.as_str() {
                "facility" => PoiKind::Facility,
                _ => PoiKind::Spot,
            },
            distance_m: Some(distance_m),
            source_segment_mode: match mode.as_deref() {
                Some("car") => Some(TravelMode::Car),
                Some("foot") => Some(TravelMode::Foot),
                _ => None,
            },
        })
        .collect())
}
