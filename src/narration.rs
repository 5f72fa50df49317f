//! Narration planning: variant coverage, batch dispatch, output cleanup.
//!
//! Every unique spot (planned or along-route) gets one base narration;
//! planned waypoints additionally get the four situational variants. The
//! whole plan goes to the narration engine as a single batch and results
//! join strictly on `(spot_id, variant)` — never on position.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::engines::narration::{NarrationEngine, NarrationSpot};
use crate::error::PlanError;
use crate::types::{AlongPoi, Language, NarrationItem, SpotRef, Variant};

/// Identity keys to request, in stable output order: spots in first-seen
/// union order (planned before along-route), base first, then the
/// situational variants for planned waypoints.
pub fn plan_requests(planned_ids: &[String], along: &[AlongPoi]) -> Vec<(String, Variant)> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut requests: Vec<(String, Variant)> = Vec::new();

    for id in planned_ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        requests.push((id.clone(), Variant::Base));
        for v in Variant::SITUATIONAL {
            requests.push((id.clone(), v));
        }
    }

    for poi in along {
        if !seen.insert(poi.spot_id.as_str()) {
            continue;
        }
        requests.push((poi.spot_id.clone(), Variant::Base));
    }

    requests
}

/// Strip `<think>…</think>` blocks from model output and trim the rest.
/// Unmatched open tags are left alone.
pub fn strip_think(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        match rest.find(OPEN) {
            Some(start) => {
                let after_open = &rest[start + OPEN.len()..];
                match after_open.find(CLOSE) {
                    Some(end) => {
                        out.push_str(&rest[..start]);
                        rest = &after_open[end + CLOSE.len()..];
                    }
                    None => {
                        out.push_str(rest);
                        break;
                    }
                }
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out.trim().to_string()
}

/// Dispatch the batch and join results by identity key. Missing pairs
/// come back with empty text; a response key that matches no request is
/// an invariant violation.
pub async fn generate(
    engine: &dyn NarrationEngine,
    language: Language,
    spots: &HashMap<String, SpotRef>,
    requests: &[(String, Variant)],
) -> Result<Vec<NarrationItem>, PlanError> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let mut batch = Vec::with_capacity(requests.len());
    for (spot_id, variant) in requests {
        let spot = spots.get(spot_id).ok_or_else(|| {
            PlanError::Internal(format!("narration request for unresolved spot '{spot_id}'"))
        })?;
        batch.push(NarrationSpot {
            spot_id: spot.spot_id.clone(),
            name: Some(spot.name.clone()),
            description: Some(spot.description.clone()),
            md_slug: spot.md_slug.clone(),
            variant: variant.to_wire(),
        });
    }

    let outputs = engine.describe(language, &batch).await?;

    let requested: HashSet<(String, Variant)> = requests.iter().cloned().collect();
    let mut by_key: HashMap<(String, Variant), String> = HashMap::new();
    for out in outputs {
        let key = (out.spot_id.clone(), Variant::from_wire(out.variant));
        if !requested.contains(&key) {
            return Err(PlanError::Internal(format!(
                "narration returned unrequested item ({}, {})",
                key.0,
                key.1.as_str()
            )));
        }
        if by_key.insert(key.clone(), strip_think(&out.text)).is_some() {
            warn!(spot_id = %key.0, variant = key.1.as_str(), "Duplicate narration item, keeping the last");
        }
    }

    let missing = requests.len() - by_key.len();
    if missing > 0 {
        warn!(missing, "Narration batch came back incomplete, filling with empty text");
    }

    Ok(requests
        .iter()
        .map(|(spot_id, variant)| NarrationItem {
            spot_id: spot_id.clone(),
            variant: *variant,
            text: by_key.remove(&(spot_id.clone(), *variant)).unwrap_or_default(),
        })
        .collect())
}
