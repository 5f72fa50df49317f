//! Geodesic and planar helpers shared by the route builder, the corridor
//! finder, and the pack assembler.
//!
//! Geodesic distances (arrival tolerance) use the haversine formula on a
//! spherical earth. Nearest-vertex attachment and point-to-polyline
//! distances use a spherical Web-Mercator projection, which is accurate
//! enough for corridor-scale comparisons.

use geo_types::Coord as XY;

use crate::types::{Coord, Segment, TravelMode};

/// Mean earth radius in meters (spherical model).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two WGS84 points, in meters.
pub fn haversine_m(a: Coord, b: Coord) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Project a `[lon, lat]` position to spherical Web-Mercator meters.
pub fn mercator(p: [f64; 2]) -> XY<f64> {
    let x = EARTH_RADIUS_M * p[0].to_radians();
    // Clamp latitude away from the poles where the projection diverges.
    let lat = p[1].clamp(-89.9, 89.9).to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
    XY { x, y }
}

fn planar_distance(a: XY<f64>, b: XY<f64>) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Distance from `p` to the segment `a`–`b`, all in projected meters.
fn point_segment_distance(p: XY<f64>, a: XY<f64>, b: XY<f64>) -> f64 {
    let ab = XY { x: b.x - a.x, y: b.y - a.y };
    let ap = XY { x: p.x - a.x, y: p.y - a.y };
    let len2 = ab.x * ab.x + ab.y * ab.y;
    if len2 == 0.0 {
        return planar_distance(p, a);
    }
    let t = ((ap.x * ab.x + ap.y * ab.y) / len2).clamp(0.0, 1.0);
    let proj = XY { x: a.x + t * ab.x, y: a.y + t * ab.y };
    planar_distance(p, proj)
}

/// Index of the polyline vertex closest to `(lon, lat)` under the
/// Mercator projection. Returns 0 for an empty polyline.
pub fn nearest_vertex_idx(polyline: &[[f64; 2]], lon: f64, lat: f64) -> usize {
    let pt = mercator([lon, lat]);
    let mut best_idx = 0usize;
    let mut best = f64::INFINITY;
    for (i, v) in polyline.iter().enumerate() {
        let d = planar_distance(pt, mercator(*v));
        if d < best {
            best = d;
            best_idx = i;
        }
    }
    best_idx
}

/// Minimum distance from `(lon, lat)` to the polyline, in projected
/// meters. Returns `f64::INFINITY` for polylines with fewer than one
/// vertex.
pub fn point_to_polyline_m(polyline: &[[f64; 2]], lon: f64, lat: f64) -> f64 {
    let pt = mercator([lon, lat]);
    match polyline.len() {
        0 => f64::INFINITY,
        1 => planar_distance(pt, mercator(polyline[0])),
        _ => polyline
            .windows(2)
            .map(|w| point_segment_distance(pt, mercator(w[0]), mercator(w[1])))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Slice the polyline over an inclusive index range, clamping out-of-range
/// indices and swapping a reversed range. A single-vertex slice borrows the
/// adjacent vertex so the result can always form a line.
pub fn slice_polyline(polyline: &[[f64; 2]], start_idx: usize, end_idx: usize) -> Vec<[f64; 2]> {
    if polyline.is_empty() {
        return Vec::new();
    }
    let last = polyline.len() - 1;
    let mut s = start_idx.min(last);
    let mut e = end_idx.min(last);
    if e < s {
        std::mem::swap(&mut s, &mut e);
    }
    let mut out: Vec<[f64; 2]> = polyline[s..=e].to_vec();
    if out.len() == 1 {
        if s > 0 {
            out = vec![polyline[s - 1], polyline[s]];
        } else if polyline.len() > 1 {
            out = vec![polyline[0], polyline[1]];
        }
    }
    out
}

/// Mode of the segment containing polyline vertex `idx`. Car wins on
/// shared join vertices because segments are scanned in order and car
/// segments are emitted for the drive portion of each hop first.
pub fn segment_mode_at(segments: &[Segment], idx: usize) -> Option<TravelMode> {
    segments
        .iter()
        .find(|s| s.start_idx <= idx && idx <= s.end_idx)
        .map(|s| s.mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKYO: Coord = Coord { lat: 35.6812, lon: 139.7671 };
    const OSAKA: Coord = Coord { lat: 34.7025, lon: 135.4959 };

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(TOKYO, TOKYO), 0.0);
    }

    #[test]
    fn haversine_tokyo_osaka_is_about_400km() {
        let d = haversine_m(TOKYO, OSAKA);
        assert!((395_000.0..410_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_small_offset_along_equator() {
        // One meter of longitude at the equator.
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(0.0, (1.0 / EARTH_RADIUS_M).to_degrees());
        let d = haversine_m(a, b);
        assert!((d - 1.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn nearest_vertex_picks_closest() {
        let polyline = vec![[139.90, 39.20], [139.91, 39.20], [139.92, 39.20]];
        assert_eq!(nearest_vertex_idx(&polyline, 139.9201, 39.2001), 2);
        assert_eq!(nearest_vertex_idx(&polyline, 139.9049, 39.1999), 1);
        assert_eq!(nearest_vertex_idx(&polyline, 139.90, 39.20), 0);
    }

    #[test]
    fn point_to_polyline_hits_segment_interior() {
        // Point due north of the midpoint of a west-east segment: the
        // closest approach is inside the segment, not at a vertex.
        let polyline = vec![[139.90, 39.20], [139.92, 39.20]];
        let d_mid = point_to_polyline_m(&polyline, 139.91, 39.2001);
        let d_vertex = planar_distance(
            mercator([139.91, 39.2001]),
            mercator([139.90, 39.20]),
        );
        assert!(d_mid < d_vertex);
        // ~11m of latitude (Mercator-inflated by 1/cos(39.2)).
        assert!((10.0..20.0).contains(&d_mid), "got {d_mid}");
    }

    #[test]
    fn slice_clamps_and_swaps() {
        let pl = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        assert_eq!(slice_polyline(&pl, 1, 2), vec![[1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(slice_polyline(&pl, 2, 1), vec![[1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(slice_polyline(&pl, 2, 99), vec![[2.0, 0.0], [3.0, 0.0]]);
    }

    #[test]
    fn slice_single_vertex_borrows_neighbour() {
        let pl = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        // Interior single vertex extends backwards.
        assert_eq!(slice_polyline(&pl, 1, 1), vec![[0.0, 0.0], [1.0, 0.0]]);
        // Leading single vertex extends forwards.
        assert_eq!(slice_polyline(&pl, 0, 0), vec![[0.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn segment_mode_lookup() {
        let segments = vec![
            Segment { mode: TravelMode::Car, start_idx: 0, end_idx: 3 },
            Segment { mode: TravelMode::Foot, start_idx: 3, end_idx: 5 },
        ];
        assert_eq!(segment_mode_at(&segments, 0), Some(TravelMode::Car));
        // Shared join vertex resolves to the earlier (car) segment.
        assert_eq!(segment_mode_at(&segments, 3), Some(TravelMode::Car));
        assert_eq!(segment_mode_at(&segments, 5), Some(TravelMode::Foot));
        assert_eq!(segment_mode_at(&segments, 9), None);
    }
}
