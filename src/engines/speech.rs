//! Speech-synthesis engine client (`POST /synthesize_and_save`).
//!
//! The engine writes audio under the shared pack root itself and answers
//! with one item per successfully synthesized narration, echoing the
//! `(spot_id, variant)` identity. Items missing from the response are
//! per-item failures the caller tolerates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlanError;
use crate::types::{AudioFormat, Language, Variant};

const SERVICE: &str = "speech";

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisItem {
    pub spot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    pub pack_id: Uuid,
    pub language: Language,
    pub items: Vec<SynthesisItem>,
    pub preferred_format: AudioFormat,
    pub bitrate_kbps: u32,
    pub save_text: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizedItem {
    pub spot_id: String,
    #[serde(default)]
    pub variant: Option<Variant>,
    pub audio_url: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub duration_sec: f64,
    pub format: AudioFormat,
    #[serde(default)]
    pub text_url: Option<String>,
}

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize_and_save(
        &self,
        request: &SynthesisRequest,
    ) -> Result<Vec<SynthesizedItem>, PlanError>;
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    #[serde(default)]
    items: Vec<SynthesizedItem>,
}

pub struct HttpSpeechEngine {
    http: reqwest::Client,
    base: String,
}

impl HttpSpeechEngine {
    pub fn new(base: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: super::http_client(timeout_secs)?,
            base: super::trim_base(base),
        })
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn synthesize_and_save(
        &self,
        request: &SynthesisRequest,
    ) -> Result<Vec<SynthesizedItem>, PlanError> {
        let resp = self
            .http
            .post(format!("{}/synthesize_and_save", self.base))
            .json(request)
            .send()
            .await
            .map_err(|e| PlanError::from_reqwest(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PlanError::from_status(SERVICE, status));
        }

        let body: SynthesizeResponse =
            resp.json().await.map_err(|e| PlanError::UpstreamProtocol {
                service: SERVICE,
                message: e.to_string(),
            })?;
        Ok(body.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_identity_and_settings() {
        let req = SynthesisRequest {
            pack_id: Uuid::nil(),
            language: Language::Ja,
            items: vec![SynthesisItem {
                spot_id: "falls".into(),
                variant: Some(Variant::Congestion1),
                text: "text".into(),
            }],
            preferred_format: AudioFormat::Mp3,
            bitrate_kbps: 64,
            save_text: true,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["preferred_format"], "mp3");
        assert_eq!(v["items"][0]["variant"], "congestion_1");
        assert_eq!(v["bitrate_kbps"], 64);
    }

    #[test]
    fn response_item_defaults_are_lenient() {
        let item: SynthesizedItem = serde_json::from_str(
            r#"{"spot_id": "a", "audio_url": "/packs/p/a.ja.wav", "format": "wav"}"#,
        )
        .unwrap();
        assert_eq!(item.size_bytes, 0);
        assert_eq!(item.duration_sec, 0.0);
        assert!(item.text_url.is_none());
    }
}
