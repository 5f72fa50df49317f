//! Pack assembly: join narration and audio into assets, normalize legs,
//! compute waypoint anchors, and commit the manifest.
//!
//! The manifest write is the commit point of a plan job: a failed job
//! must never leave `manifest.json` behind, so the document is written to
//! a temp sibling, fsynced, and renamed into place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::PlanError;
use crate::geo;
use crate::types::{
    AlongPoi, Asset, Audio, Coord, Language, Leg, Manifest, NarrationItem, RoutePlan, SpotRef,
    Variant,
};

/// Join narrations with their synthesis results on `(spot_id, variant)`.
/// Text is always kept; audio is attached when synthesis succeeded.
pub fn join_assets(
    items: &[NarrationItem],
    mut audio: HashMap<(String, Variant), Audio>,
) -> Vec<Asset> {
    items
        .iter()
        .map(|item| {
            let key = (item.spot_id.clone(), item.variant);
            Asset::from_narration(item, audio.remove(&key))
        })
        .collect()
}

/// Normalize legs for the manifest. Explicit endpoints win; legs that
/// only carry indices resolve them through their segment's polyline
/// range.
pub fn finalize_legs(plan: &RoutePlan) -> Result<Vec<Leg>, PlanError> {
    plan.legs
        .iter()
        .zip(plan.segments.iter())
        .map(|(leg, seg)| {
            let from = match leg.from {
                Some(c) => c,
                None => vertex_coord(&plan.polyline, seg.start_idx)?,
            };
            let to = match leg.to {
                Some(c) => c,
                None => vertex_coord(&plan.polyline, seg.end_idx)?,
            };
            Ok(Leg {
                mode: leg.mode,
                from,
                to,
                distance_m: leg.distance_m,
                duration_s: leg.duration_s,
            })
        })
        .collect()
}

fn vertex_coord(polyline: &[[f64; 2]], idx: usize) -> Result<Coord, PlanError> {
    polyline
        .get(idx)
        .copied()
        .map(Coord::from_lonlat)
        .ok_or_else(|| {
            PlanError::Internal(format!("leg references polyline vertex {idx} out of range"))
        })
}

/// AlongPOI-shaped entries for the planned waypoints themselves, in
/// request order, anchored to the polyline like any corridor hit.
pub fn waypoints_info(
    planned_ids: &[String],
    spots: &HashMap<String, SpotRef>,
    plan: &RoutePlan,
) -> Vec<AlongPoi> {
    if plan.polyline.len() < 2 {
        return Vec::new();
    }

    planned_ids
        .iter()
        .filter_map(|id| spots.get(id))
        .map(|spot| {
            let nearest_idx = geo::nearest_vertex_idx(&plan.polyline, spot.lon, spot.lat);
            AlongPoi {
                spot_id: spot.spot_id.clone(),
                name: spot.name.clone(),
                lon: spot.lon,
                lat: spot.lat,
                kind: spot.kind,
                nearest_idx,
                distance_m: geo::point_to_polyline_m(&plan.polyline, spot.lon, spot.lat),
                source_segment_mode: geo::segment_mode_at(&plan.segments, nearest_idx),
            }
        })
        .collect()
}

/// Compose the manifest document for a finished plan.
#[allow(clippy::too_many_arguments)]
pub fn compose_manifest(
    pack_id: Uuid,
    language: Language,
    plan: RoutePlan,
    legs: Vec<Leg>,
    waypoints_info: Vec<AlongPoi>,
    along_pois: Vec<AlongPoi>,
    assets: Vec<Asset>,
) -> Manifest {
    Manifest {
        pack_id,
        language,
        generated_at: Utc::now(),
        route: plan.feature_collection,
        polyline: plan.polyline,
        segments: plan.segments,
        legs,
        waypoints_info,
        along_pois,
        assets,
    }
}

/// Write `manifest.json` atomically under the pack directory: temp
/// sibling, flush, fsync, rename.
pub async fn write_manifest(packs_root: &Path, manifest: &Manifest) -> Result<PathBuf, PlanError> {
    let pack_dir = packs_root.join(manifest.pack_id.to_string());
    tokio::fs::create_dir_all(&pack_dir)
        .await
        .map_err(|e| PlanError::Storage(format!("create pack dir: {e}")))?;

    let body = serde_json::to_vec_pretty(manifest)
        .map_err(|e| PlanError::Internal(format!("manifest encode: {e}")))?;

    let tmp_path = pack_dir.join(".manifest.json.tmp");
    let final_path = pack_dir.join("manifest.json");

    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .map_err(|e| PlanError::Storage(format!("create manifest: {e}")))?;
    file.write_all(&body)
        .await
        .map_err(|e| PlanError::Storage(format!("write manifest: {e}")))?;
    file.flush()
        .await
        .map_err(|e| PlanError::Storage(format!("flush manifest: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| PlanError::Storage(format!("fsync manifest: {e}")))?;
    drop(file);

    tokio::fs::rename(&tmp_path, &final_path)
        .await
        .map_err(|e| PlanError::Storage(format!("rename manifest: {e}")))?;

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::stitch;
    use crate::types::{AudioFormat, PoiKind, RouteLeg, TravelMode};

    fn narration(spot_id: &str, variant: Variant, text: &str) -> NarrationItem {
        NarrationItem { spot_id: spot_id.into(), variant, text: text.into() }
    }

    fn audio(url: &str) -> Audio {
        Audio {
            url: url.into(),
            size_bytes: 1000,
            duration_sec: 12.0,
            format: AudioFormat::Mp3,
            text_url: None,
        }
    }

    #[test]
    fn assets_keep_text_and_attach_audio_by_key() {
        let items = vec![
            narration("a", Variant::Base, "base a"),
            narration("a", Variant::Weather1, "cloudy a"),
        ];
        let mut map = HashMap::new();
        map.insert(("a".to_string(), Variant::Base), audio("/packs/p/a.ja.mp3"));

        let assets = join_assets(&items, map);
        assert_eq!(assets.len(), 2);
        assert!(assets[0].audio.is_some());
        assert_eq!(assets[0].text, "base a");
        // Partial synthesis: text survives, audio is null.
        assert!(assets[1].audio.is_none());
        assert_eq!(assets[1].text, "cloudy a");
    }

    #[test]
    fn legs_with_explicit_endpoints_pass_through() {
        let plan = stitch(vec![RouteLeg {
            mode: TravelMode::Car,
            from: Some(Coord::new(39.2, 139.9)),
            to: Some(Coord::new(39.21, 139.91)),
            distance_m: 1500.0,
            duration_s: 120.0,
            geometry: vec![[139.9, 39.2], [139.91, 39.21]],
        }]);
        let legs = finalize_legs(&plan).unwrap();
        assert_eq!(legs[0].from, Coord::new(39.2, 139.9));
        assert_eq!(legs[0].to, Coord::new(39.21, 139.91));
    }

    #[test]
    fn index_only_legs_resolve_endpoints_from_polyline() {
        let plan = stitch(vec![RouteLeg {
            mode: TravelMode::Foot,
            from: None,
            to: None,
            distance_m: 300.0,
            duration_s: 240.0,
            geometry: vec![[139.9, 39.2], [139.905, 39.202], [139.91, 39.21]],
        }]);
        let legs = finalize_legs(&plan).unwrap();
        assert_eq!(legs[0].from, Coord::new(39.2, 139.9));
        assert_eq!(legs[0].to, Coord::new(39.21, 139.91));
    }

    #[test]
    fn waypoints_info_preserves_request_order_and_anchors() {
        let plan = stitch(vec![
            RouteLeg {
                mode: TravelMode::Car,
                from: None,
                to: None,
                distance_m: 0.0,
                duration_s: 0.0,
                geometry: vec![[139.90, 39.20], [139.91, 39.20]],
            },
            RouteLeg {
                mode: TravelMode::Foot,
                from: None,
                to: None,
                distance_m: 0.0,
                duration_s: 0.0,
                geometry: vec![[139.91, 39.20], [139.92, 39.20]],
            },
        ]);
        let mut spots = HashMap::new();
        for (id, lon) in [("b", 139.9199), ("a", 139.9001)] {
            spots.insert(
                id.to_string(),
                SpotRef {
                    spot_id: id.into(),
                    name: id.to_uppercase(),
                    description: String::new(),
                    md_slug: None,
                    lat: 39.20,
                    lon,
                    kind: PoiKind::Spot,
                },
            );
        }

        let info = waypoints_info(&["b".into(), "a".into()], &spots, &plan);
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].spot_id, "b");
        assert_eq!(info[0].source_segment_mode, Some(TravelMode::Foot));
        assert_eq!(info[1].spot_id, "a");
        assert_eq!(info[1].source_segment_mode, Some(TravelMode::Car));
        assert!(info[1].nearest_idx < info[0].nearest_idx);
    }

    #[tokio::test]
    async fn manifest_write_is_atomic_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let plan = stitch(vec![RouteLeg {
            mode: TravelMode::Car,
            from: Some(Coord::new(39.2, 139.9)),
            to: Some(Coord::new(39.2, 139.91)),
            distance_m: 900.0,
            duration_s: 60.0,
            geometry: vec![[139.9, 39.2], [139.91, 39.2]],
        }]);
        let legs = finalize_legs(&plan).unwrap();
        let manifest = compose_manifest(
            Uuid::new_v4(),
            Language::En,
            plan,
            legs,
            Vec::new(),
            Vec::new(),
            vec![Asset {
                spot_id: "a".into(),
                variant: Variant::Base,
                text: "hello".into(),
                audio: None,
            }],
        );

        let path = write_manifest(dir.path(), &manifest).await.unwrap();
        assert!(path.ends_with(
            PathBuf::from(manifest.pack_id.to_string()).join("manifest.json")
        ));
        // No temp sibling left behind.
        assert!(!path.with_file_name(".manifest.json.tmp").exists());

        let body = std::fs::read(&path).unwrap();
        let parsed: Manifest = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.pack_id, manifest.pack_id);
        assert_eq!(parsed.assets.len(), 1);
        assert_eq!(parsed.polyline.len(), 2);
    }
}
