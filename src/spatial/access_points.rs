//! Nearest access point (trailhead parking) lookup.

use sqlx::PgPool;

use crate::types::Coord;

/// KNN over the access_points relation. Returns `None` when the relation
/// is empty; the route builder degrades to an offset point in that case.
pub async fn nearest(pool: &PgPool, around: Coord) -> Result<Option<Coord>, sqlx::Error> {
    let row: Option<(f64, f64)> = sqlx::query_as(
        r#"
        SELECT ST_Y(geom)::float8 AS lat,
               ST_X(geom)::float8 AS lon
        FROM access_points
        ORDER BY geom <-> ST_SetSRID(ST_MakePoint($1, $2), 4326)
        LIMIT 1
        "#,
    )
    .bind(around.lon)
    .bind(around.lat)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(lat, lon)| Coord { lat, lon }))
}
