//! Spot resolution over the union of the spots and facilities relations.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::types::{Language, PoiKind, SpotRef};

/// One indexed query across both relations. When an id exists in both,
/// spots win (stable precedence via the `ord` column). Localized fields
/// fall back `requested language -> en -> empty`.
const RESOLVE_SQL: &str = r#"
WITH target AS (
  SELECT unnest($1::text[]) AS spot_id
),
s AS (
  SELECT t.spot_id,
         COALESCE(sp.official_name->>$2, sp.official_name->>'en', '') AS name,
         COALESCE(sp.description->>$2, sp.description->>'en', '')     AS description,
         sp.md_slug,
         ST_Y(sp.geom)::float8 AS lat,
         ST_X(sp.geom)::float8 AS lon,
         'spot'::text AS kind,
         1 AS ord
  FROM target t
  JOIN spots sp ON sp.spot_id = t.spot_id
),
f AS (
  SELECT t.spot_id,
         COALESCE(fc.official_name->>$2, fc.official_name->>'en', '') AS name,
         COALESCE(fc.description->>$2, fc.description->>'en', '')     AS description,
         fc.md_slug,
         ST_Y(fc.geom)::float8 AS lat,
         ST_X(fc.geom)::float8 AS lon,
         'facility'::text AS kind,
         2 AS ord
  FROM target t
  JOIN facilities fc ON fc.spot_id = t.spot_id
),
u AS (
  SELECT * FROM s
  UNION ALL
  SELECT * FROM f
)
SELECT DISTINCT ON (spot_id)
       spot_id, name, description, md_slug, lat, lon, kind
FROM u
ORDER BY spot_id, ord
"#;

type SpotRow = (
    String,
    String,
    String,
    Option<String>,
    f64,
    f64,
    String,
);

/// Resolve `ids` to localized [`SpotRef`]s. Unknown ids are omitted.
pub async fn resolve(
    pool: &PgPool,
    ids: &[String],
    language: Language,
) -> Result<HashMap<String, SpotRef>, sqlx::Error> {
    let ids: Vec<String> = ids.iter().filter(|s| !s.is_empty()).cloned().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<SpotRow> = sqlx::query_as(RESOLVE_SQL)
        .bind(&ids)
        .bind(language.as_str())
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(spot_id, name, description, md_slug, lat, lon, kind)| {
            let kind = match kind.as_str() {
                "facility" => PoiKind::Facility,
                _ => PoiKind::Spot,
            };
            (
                spot_id.clone(),
                SpotRef { spot_id, name, description, md_slug, lat, lon, kind },
            )
        })
        .collect())
}
