//! Plan request, assets, and the durable pack manifest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AlongPoi, Coord, Leg, NarrationItem, Segment, Variant};

/// Supported narration languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ja,
    En,
    Zh,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

/// Corridor widths for along-route POI discovery, meters per mode.
///
/// Drivers pass POIs at speed, so the car corridor is much wider than
/// the foot corridor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BufferSpec {
    #[serde(default = "BufferSpec::default_car_m")]
    pub car_m: f64,
    #[serde(default = "BufferSpec::default_foot_m")]
    pub foot_m: f64,
}

impl BufferSpec {
    fn default_car_m() -> f64 {
        300.0
    }

    fn default_foot_m() -> f64 {
        10.0
    }
}

impl Default for BufferSpec {
    fn default() -> Self {
        Self {
            car_m: Self::default_car_m(),
            foot_m: Self::default_foot_m(),
        }
    }
}

/// A planned waypoint, referenced by spot identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointRef {
    pub spot_id: String,
}

/// Immutable plan input as submitted over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub language: Language,
    pub origin: Coord,
    pub waypoints: Vec<WaypointRef>,
    #[serde(default = "default_true")]
    pub return_to_origin: bool,
    /// Corridor override; service defaults apply when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer: Option<BufferSpec>,
}

fn default_true() -> bool {
    true
}

/// Audio output format. MP3 is preferred; WAV is the transcode fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

/// A synthesized audio file under the pack root. `url` is pack-relative
/// (`/packs/{pack_id}/...`), never an absolute URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audio {
    pub url: String,
    pub size_bytes: u64,
    pub duration_sec: f64,
    pub format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_url: Option<String>,
}

/// One narration/audio pair. Text is always present; audio is null when
/// synthesis failed for this item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub spot_id: String,
    pub variant: Variant,
    pub text: String,
    pub audio: Option<Audio>,
}

impl Asset {
    pub fn from_narration(item: &NarrationItem, audio: Option<Audio>) -> Self {
        Self {
            spot_id: item.spot_id.clone(),
            variant: item.variant,
            text: item.text.clone(),
            audio,
        }
    }
}

/// The durable record of a completed plan, written to
/// `{packs_root}/{pack_id}/manifest.json`. Also serves as the successful
/// poll response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub pack_id: Uuid,
    pub language: Language,
    pub generated_at: DateTime<Utc>,
    pub route: geojson::FeatureCollection,
    pub polyline: Vec<[f64; 2]>,
    pub segments: Vec<Segment>,
    pub legs: Vec<Leg>,
    pub waypoints_info: Vec<AlongPoi>,
    pub along_pois: Vec<AlongPoi>,
    pub assets: Vec<Asset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_request_defaults_apply() {
        let req: PlanRequest = serde_json::from_value(serde_json::json!({
            "language": "ja",
            "origin": {"lat": 39.2, "lon": 139.9},
            "waypoints": [{"spot_id": "spot_a"}]
        }))
        .unwrap();
        assert!(req.return_to_origin);
        assert!(req.buffer.is_none());

        let req: PlanRequest = serde_json::from_value(serde_json::json!({
            "language": "ja",
            "origin": {"lat": 39.2, "lon": 139.9},
            "waypoints": [{"spot_id": "spot_a"}],
            "buffer": {"car_m": 500.0}
        }))
        .unwrap();
        let buffer = req.buffer.unwrap();
        assert_eq!(buffer.car_m, 500.0);
        assert_eq!(buffer.foot_m, 10.0);
    }

    #[test]
    fn plan_request_rejects_unknown_language() {
        let res: Result<PlanRequest, _> = serde_json::from_value(serde_json::json!({
            "language": "fr",
            "origin": {"lat": 0.0, "lon": 0.0},
            "waypoints": [{"spot_id": "a"}]
        }));
        assert!(res.is_err());
    }

    #[test]
    fn asset_null_audio_serializes_as_null() {
        let asset = Asset {
            spot_id: "falls".into(),
            variant: Variant::Base,
            text: "narration".into(),
            audio: None,
        };
        let v = serde_json::to_value(&asset).unwrap();
        assert_eq!(v["audio"], serde_json::Value::Null);
    }
}
