//! Corridor POI discovery: per-mode line extraction and hit reduction.
//!
//! The spatial query itself lives in `spatial::pois`; this module builds
//! its MultiLineString inputs from the stitched route and turns raw hits
//! into [`AlongPoi`] records anchored to the polyline.

use std::collections::HashSet;

use geojson::{Geometry, Value};

use crate::geo;
use crate::spatial::PoiHit;
use crate::types::{AlongPoi, Segment, TravelMode};

/// Split the polyline into per-mode line collections. Returns
/// `(car, foot)` GeoJSON MultiLineStrings; a mode with no usable
/// segments yields `None`.
pub fn mode_multilines(
    polyline: &[[f64; 2]],
    segments: &[Segment],
) -> (Option<Geometry>, Option<Geometry>) {
    let mut car_lines: Vec<Vec<Vec<f64>>> = Vec::new();
    let mut foot_lines: Vec<Vec<Vec<f64>>> = Vec::new();

    for seg in segments {
        let coords = geo::slice_polyline(polyline, seg.start_idx, seg.end_idx);
        if coords.len() < 2 {
            continue;
        }
        let line: Vec<Vec<f64>> = coords.iter().map(|p| p.to_vec()).collect();
        match seg.mode {
            TravelMode::Car => car_lines.push(line),
            TravelMode::Foot => foot_lines.push(line),
        }
    }

    let to_geom = |lines: Vec<Vec<Vec<f64>>>| {
        if lines.is_empty() {
            None
        } else {
            Some(Geometry::new(Value::MultiLineString(lines)))
        }
    };

    (to_geom(car_lines), to_geom(foot_lines))
}

/// Reduce raw corridor hits to [`AlongPoi`]s: drop the planned waypoints
/// (they are narrated as waypoints, not as drive-by POIs), anchor each
/// hit to the nearest polyline vertex, and keep the store-reported
/// geodesic distance when present.
pub fn reduce(
    hits: Vec<PoiHit>,
    polyline: &[[f64; 2]],
    excluded_ids: &HashSet<String>,
) -> Vec<AlongPoi> {
    if polyline.len() < 2 {
        return Vec::new();
    }

    hits.into_iter()
        .filter(|h| !excluded_ids.contains(&h.spot_id))
        .map(|h| {
            let nearest_idx = geo::nearest_vertex_idx(polyline, h.lon, h.lat);
            let distance_m = h
                .distance_m
                .unwrap_or_else(|| geo::point_to_polyline_m(polyline, h.lon, h.lat));
            AlongPoi {
                spot_id: h.spot_id,
                name: h.name,
                lon: h.lon,
                lat: h.lat,
                kind: h.kind,
                nearest_idx,
                distance_m,
                source_segment_mode: h.source_segment_mode,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoiKind;

    fn hit(spot_id: &str, lon: f64, lat: f64, mode: TravelMode) -> PoiHit {
        PoiHit {
            spot_id: spot_id.into(),
            name: spot_id.to_uppercase(),
            lon,
            lat,
            kind: PoiKind::Spot,
            distance_m: Some(12.5),
            source_segment_mode: Some(mode),
        }
    }

    #[test]
    fn multilines_split_by_mode() {
        let polyline = vec![
            [139.90, 39.20],
            [139.91, 39.20],
            [139.92, 39.20],
            [139.93, 39.21],
        ];
        let segments = vec![
            Segment { mode: TravelMode::Car, start_idx: 0, end_idx: 2 },
            Segment { mode: TravelMode::Foot, start_idx: 2, end_idx: 3 },
        ];
        let (car, foot) = mode_multilines(&polyline, &segments);
        let car = car.unwrap();
        let foot = foot.unwrap();
        match (car.value, foot.value) {
            (Value::MultiLineString(c), Value::MultiLineString(f)) => {
                assert_eq!(c.len(), 1);
                assert_eq!(c[0].len(), 3);
                assert_eq!(f.len(), 1);
                assert_eq!(f[0].len(), 2);
            }
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn multilines_absent_mode_is_none() {
        let polyline = vec![[139.90, 39.20], [139.91, 39.20]];
        let segments = vec![Segment { mode: TravelMode::Car, start_idx: 0, end_idx: 1 }];
        let (car, foot) = mode_multilines(&polyline, &segments);
        assert!(car.is_some());
        assert!(foot.is_none());
    }

    #[test]
    fn multilines_degenerate_segment_borrows_neighbour_vertex() {
        let polyline = vec![[139.90, 39.20], [139.91, 39.20]];
        let segments = vec![
            Segment { mode: TravelMode::Car, start_idx: 0, end_idx: 1 },
            Segment { mode: TravelMode::Foot, start_idx: 1, end_idx: 1 },
        ];
        let (_, foot) = mode_multilines(&polyline, &segments);
        // The single-vertex foot segment still produces a two-point line.
        match foot.unwrap().value {
            Value::MultiLineString(f) => assert_eq!(f[0].len(), 2),
            other => panic!("unexpected geometry: {other:?}"),
        }
    }

    #[test]
    fn reduce_excludes_planned_waypoints() {
        let polyline = vec![[139.90, 39.20], [139.92, 39.20]];
        let excluded: HashSet<String> = ["spot_a".to_string()].into();
        let out = reduce(
            vec![
                hit("spot_a", 139.905, 39.2001, TravelMode::Car),
                hit("spot_d", 139.915, 39.2001, TravelMode::Car),
            ],
            &polyline,
            &excluded,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].spot_id, "spot_d");
    }

    #[test]
    fn reduce_attaches_nearest_vertex_and_keeps_db_distance() {
        let polyline = vec![[139.90, 39.20], [139.91, 39.20], [139.92, 39.20]];
        let out = reduce(
            vec![hit("spot_d", 139.9195, 39.2001, TravelMode::Foot)],
            &polyline,
            &HashSet::new(),
        );
        assert_eq!(out[0].nearest_idx, 2);
        assert_eq!(out[0].distance_m, 12.5);
        assert_eq!(out[0].source_segment_mode, Some(TravelMode::Foot));
    }

    #[test]
    fn reduce_computes_distance_when_store_omits_it() {
        let polyline = vec![[139.90, 39.20], [139.92, 39.20]];
        let mut h = hit("spot_d", 139.91, 39.2001, TravelMode::Car);
        h.distance_m = None;
        let out = reduce(vec![h], &polyline, &HashSet::new());
        assert!(out[0].distance_m.is_finite());
        assert!(out[0].distance_m > 0.0);
    }

    #[test]
    fn reduce_short_polyline_yields_nothing() {
        let out = reduce(
            vec![hit("spot_d", 139.91, 39.2, TravelMode::Car)],
            &[[139.9, 39.2]],
            &HashSet::new(),
        );
        assert!(out.is_empty());
    }
}
