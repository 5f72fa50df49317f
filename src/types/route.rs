//! Route geometry types: coordinates, legs, segments

use serde::{Deserialize, Serialize};

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Polyline vertices are stored `[lon, lat]` (GeoJSON position order).
    pub fn from_lonlat(p: [f64; 2]) -> Self {
        Self { lat: p[1], lon: p[0] }
    }

    pub fn to_lonlat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Transport mode of a routed leg or polyline segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Car,
    Foot,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Car => "car",
            TravelMode::Foot => "foot",
        }
    }
}

/// A routed leg as produced by the route builder.
///
/// Engines may deliver endpoints either as explicit coordinates or as
/// indices into the stitched polyline; the pack assembler normalizes
/// whichever form is present (`from`/`to` win when both exist).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLeg {
    pub mode: TravelMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Coord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Coord>,
    pub distance_m: f64,
    pub duration_s: f64,
    /// LineString coordinates, `[lon, lat]` per vertex. May be empty for
    /// degenerate legs (e.g. a failed drive to an access point).
    pub geometry: Vec<[f64; 2]>,
}

/// A leg normalized for the manifest: explicit endpoints, no geometry
/// (the polyline carries the shared geometry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub mode: TravelMode,
    pub from: Coord,
    pub to: Coord,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Inclusive index range over the stitched polyline, tagged with mode.
///
/// Segments are contiguous and cover the polyline exactly; adjacent
/// segments share their join vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub mode: TravelMode,
    pub start_idx: usize,
    pub end_idx: usize,
}

/// The stitched route: one polyline, per-mode segments, a GeoJSON view,
/// and the source legs in order (segment i belongs to leg i).
#[derive(Debug, Clone)]
pub struct RoutePlan {
    pub feature_collection: geojson::FeatureCollection,
    pub polyline: Vec<[f64; 2]>,
    pub segments: Vec<Segment>,
    pub legs: Vec<RouteLeg>,
}
