//! Stitching: concatenate per-leg geometries into one polyline, record
//! per-mode segment index ranges, and emit a GeoJSON view of the route.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};

use crate::types::{RouteLeg, RoutePlan, Segment};

/// Stitch legs in order. The shared join vertex between adjacent legs is
/// deduplicated when coordinates match exactly; legs with empty geometry
/// produce a degenerate segment at the current tail so segment-to-leg
/// parity holds.
pub fn stitch(legs: Vec<RouteLeg>) -> RoutePlan {
    let mut features: Vec<Feature> = Vec::with_capacity(legs.len());
    let mut polyline: Vec<[f64; 2]> = Vec::new();
    let mut segments: Vec<Segment> = Vec::with_capacity(legs.len());

    for leg in &legs {
        if leg.geometry.is_empty() {
            let tail = polyline.len().saturating_sub(1);
            segments.push(Segment { mode: leg.mode, start_idx: tail, end_idx: tail });
            features.push(leg_feature(leg, tail, tail));
            continue;
        }

        let start_idx = if polyline.is_empty() {
            polyline.extend_from_slice(&leg.geometry);
            0
        } else if polyline.last() == leg.geometry.first() {
            let idx = polyline.len() - 1;
            polyline.extend_from_slice(&leg.geometry[1..]);
            idx
        } else {
            let idx = polyline.len();
            polyline.extend_from_slice(&leg.geometry);
            idx
        };

        let end_idx = polyline.len() - 1;
        segments.push(Segment { mode: leg.mode, start_idx, end_idx });
        features.push(leg_feature(leg, start_idx, end_idx));
    }

    RoutePlan {
        feature_collection: FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
        polyline,
        segments,
        legs,
    }
}

fn leg_feature(leg: &RouteLeg, from_idx: usize, to_idx: usize) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("mode".into(), leg.mode.as_str().into());
    properties.insert("from_idx".into(), from_idx.into());
    properties.insert("to_idx".into(), to_idx.into());
    properties.insert("distance".into(), leg.distance_m.into());
    properties.insert("duration".into(), leg.duration_s.into());

    let coordinates: Vec<Vec<f64>> = leg.geometry.iter().map(|p| p.to_vec()).collect();

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coordinates))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
