//! Spot, POI, and narration identity types

use serde::{Deserialize, Serialize};

use super::TravelMode;

/// Whether a record came from the spots or the facilities relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiKind {
    Spot,
    Facility,
}

/// A spot resolved from the spatial store, localized to the request
/// language (with `en` then empty-string fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotRef {
    pub spot_id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md_slug: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub kind: PoiKind,
}

/// A POI attached to the route, or an AlongPOI-shaped view of a planned
/// waypoint (`waypoints_info` entries share this type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlongPoi {
    pub spot_id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub kind: PoiKind,
    /// Index of the closest polyline vertex (Web-Mercator distance).
    pub nearest_idx: usize,
    pub distance_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_segment_mode: Option<TravelMode>,
}

/// Narration variant. `Base` is the plain narration every spot receives;
/// the four situational variants are generated for planned waypoints only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "weather_1")]
    Weather1,
    #[serde(rename = "weather_2")]
    Weather2,
    #[serde(rename = "congestion_1")]
    Congestion1,
    #[serde(rename = "congestion_2")]
    Congestion2,
}

impl Variant {
    /// The four situational variants, in their stable generation order.
    pub const SITUATIONAL: [Variant; 4] = [
        Variant::Weather1,
        Variant::Weather2,
        Variant::Congestion1,
        Variant::Congestion2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Base => "base",
            Variant::Weather1 => "weather_1",
            Variant::Weather2 => "weather_2",
            Variant::Congestion1 => "congestion_1",
            Variant::Congestion2 => "congestion_2",
        }
    }

    /// Wire form toward the narration/speech engines: `base` is carried
    /// as an absent field, everything else by name.
    pub fn to_wire(self) -> Option<Variant> {
        match self {
            Variant::Base => None,
            other => Some(other),
        }
    }

    pub fn from_wire(wire: Option<Variant>) -> Variant {
        wire.unwrap_or(Variant::Base)
    }
}

/// One generated narration, keyed by `(spot_id, variant)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationItem {
    pub spot_id: String,
    pub variant: Variant,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_serializes_with_underscored_names() {
        let v = serde_json::to_value(Variant::Weather1).unwrap();
        assert_eq!(v, serde_json::json!("weather_1"));
        let v = serde_json::to_value(Variant::Congestion2).unwrap();
        assert_eq!(v, serde_json::json!("congestion_2"));
    }

    #[test]
    fn variant_wire_round_trip() {
        assert_eq!(Variant::Base.to_wire(), None);
        assert_eq!(Variant::from_wire(None), Variant::Base);
        assert_eq!(
            Variant::from_wire(Variant::Weather2.to_wire()),
            Variant::Weather2
        );
    }
}
