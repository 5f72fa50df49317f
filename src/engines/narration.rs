//! Narration engine client (`POST /describe`).
//!
//! The batch carries the `(spot_id, variant)` identity on every item so
//! results join without positional assumptions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::types::{Language, Variant};

const SERVICE: &str = "narration";

/// One narration request entry.
#[derive(Debug, Clone, Serialize)]
pub struct NarrationSpot {
    pub spot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md_slug: Option<String>,
    /// Absent for the base narration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
}

/// One generated narration, echoing the identity key.
#[derive(Debug, Clone, Deserialize)]
pub struct NarrationOutput {
    pub spot_id: String,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub text: String,
}

#[async_trait]
pub trait NarrationEngine: Send + Sync {
    async fn describe(
        &self,
        language: Language,
        spots: &[NarrationSpot],
    ) -> Result<Vec<NarrationOutput>, PlanError>;
}

#[derive(Serialize)]
struct DescribeRequest<'a> {
    language: Language,
    spots: &'a [NarrationSpot],
}

#[derive(Deserialize)]
struct DescribeResponse {
    #[serde(default)]
    items: Vec<NarrationOutput>,
}

pub struct HttpNarrationEngine {
    http: reqwest::Client,
    base: String,
}

impl HttpNarrationEngine {
    pub fn new(base: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            http: super::http_client(timeout_secs)?,
            base: super::trim_base(base),
        })
    }
}

#[async_trait]
impl NarrationEngine for HttpNarrationEngine {
    async fn describe(
        &self,
        language: Language,
        spots: &[NarrationSpot],
    ) -> Result<Vec<NarrationOutput>, PlanError> {
        let resp = self
            .http
            .post(format!("{}/describe", self.base))
            .json(&DescribeRequest { language, spots })
            .send()
            .await
            .map_err(|e| PlanError::from_reqwest(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PlanError::from_status(SERVICE, status));
        }

        let body: DescribeResponse =
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
    fn request_omits_base_variant_on_wire() {
        let spots = vec![
            NarrationSpot {
                spot_id: "falls".into(),
                name: Some("Great Falls".into()),
                description: None,
                md_slug: None,
                variant: None,
            },
            NarrationSpot {
                spot_id: "falls".into(),
                name: Some("Great Falls".into()),
                description: None,
                md_slug: None,
                variant: Some(Variant::Weather2),
            },
        ];
        let v = serde_json::to_value(DescribeRequest { language: Language::En, spots: &spots })
            .unwrap();
        assert_eq!(v["language"], "en");
        assert!(v["spots"][0].get("variant").is_none());
        assert_eq!(v["spots"][1]["variant"], "weather_2");
    }

    #[test]
    fn response_items_default_when_missing() {
        let body: DescribeResponse = serde_json::from_str("{}").unwrap();
        assert!(body.items.is_empty());

        let body: DescribeResponse = serde_json::from_str(
            r#"{"items": [{"spot_id": "a", "text": "hello"}]}"#,
        )
        .unwrap();
        assert_eq!(body.items[0].variant, None);
        assert_eq!(body.items[0].text, "hello");
    }
}
