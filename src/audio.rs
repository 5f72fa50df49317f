//! Audio fan-out: batch synthesis, stable filenames, identity-keyed join.
//!
//! The speech engine persists audio itself (it shares the pack root);
//! this module owns the filename contract, submits the batch, and joins
//! the results back onto narration identity keys. Items the engine could
//! not synthesize simply stay absent from the returned map.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::engines::speech::{SpeechEngine, SynthesisItem, SynthesisRequest};
use crate::error::PlanError;
use crate::types::{Audio, AudioFormat, Language, NarrationItem, Variant};

/// Synthesis settings carried from configuration.
#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub packs_root: PathBuf,
    pub preferred_format: AudioFormat,
    pub bitrate_kbps: u32,
    pub save_text: bool,
}

/// Replace characters outside `[A-Za-z0-9_\-.]` with `_`.
pub fn sanitize_component(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File stem for one asset: `{spot_id}` for base, `{spot_id}_{variant}`
/// otherwise, both parts sanitized.
pub fn audio_stem(spot_id: &str, variant: Variant) -> String {
    match variant {
        Variant::Base => sanitize_component(spot_id),
        other => format!(
            "{}_{}",
            sanitize_component(spot_id),
            sanitize_component(other.as_str())
        ),
    }
}

pub fn audio_filename(
    spot_id: &str,
    variant: Variant,
    language: Language,
    format: AudioFormat,
) -> String {
    format!(
        "{}.{}.{}",
        audio_stem(spot_id, variant),
        language.as_str(),
        format.extension()
    )
}

pub fn text_filename(spot_id: &str, variant: Variant, language: Language) -> String {
    format!("{}.{}.txt", audio_stem(spot_id, variant), language.as_str())
}

/// Client-facing path under the static pack mount.
pub fn pack_url(pack_id: Uuid, filename: &str) -> String {
    format!("/packs/{pack_id}/{filename}")
}

/// Duration of a RIFF/WAVE payload from its fmt and data chunks.
pub fn wav_duration_sec(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut byte_rate: Option<f64> = None;
    let mut data_len: Option<f64> = None;

    let mut offset = 12usize;
    while offset + 8 <= bytes.len() {
        let chunk_id = &bytes[offset..offset + 4];
        let chunk_size =
            u32::from_le_bytes([bytes[offset + 4], bytes[offset + 5], bytes[offset + 6], bytes[offset + 7]])
                as usize;
        let body = offset + 8;

        match chunk_id {
            b"fmt " if body + 12 <= bytes.len() => {
                let rate = u32::from_le_bytes([
                    bytes[body + 8],
                    bytes[body + 9],
                    bytes[body + 10],
                    bytes[body + 11],
                ]);
                if rate > 0 {
                    byte_rate = Some(f64::from(rate));
                }
            }
            b"data" => {
                data_len = Some(chunk_size as f64);
            }
            _ => {}
        }

        // Chunks are word-aligned.
        offset = body + chunk_size + (chunk_size & 1);
    }

    match (byte_rate, data_len) {
        (Some(rate), Some(len)) => Some(len / rate),
        _ => None,
    }
}

/// Bitrate-based estimate when no probe is available.
pub fn mp3_duration_estimate(size_bytes: u64, bitrate_kbps: u32) -> f64 {
    if bitrate_kbps == 0 {
        return 0.0;
    }
    (size_bytes as f64) * 8.0 / (f64::from(bitrate_kbps) * 1000.0)
}

/// Submit every non-empty narration as one batch and return the audio
/// records keyed by `(spot_id, variant)`. Failed items are simply absent.
pub async fn synthesize_all(
    engine: &dyn SpeechEngine,
    settings: &AudioSettings,
    pack_id: Uuid,
    language: Language,
    items: &[NarrationItem],
) -> Result<HashMap<(String, Variant), Audio>, PlanError> {
    let to_send: Vec<SynthesisItem> = items
        .iter()
        .filter(|i| !i.text.is_empty())
        .map(|i| SynthesisItem {
            spot_id: i.spot_id.clone(),
            variant: i.variant.to_wire(),
            text: i.text.clone(),
        })
        .collect();

    if to_send.is_empty() {
        return Ok(HashMap::new());
    }

    let submitted: HashSet<(String, Variant)> = to_send
        .iter()
        .map(|i| (i.spot_id.clone(), Variant::from_wire(i.variant)))
        .collect();

    let request = SynthesisRequest {
        pack_id,
        language,
        items: to_send,
        preferred_format: settings.preferred_format,
        bitrate_kbps: settings.bitrate_kbps,
        save_text: settings.save_text,
    };

    let results = engine.synthesize_and_save(&request).await?;

    let probes = results.into_iter().filter_map(|item| {
        let key = (item.spot_id.clone(), Variant::from_wire(item.variant));
        if !submitted.contains(&key) {
            warn!(
                spot_id = %key.0,
                variant = key.1.as_str(),
                "Discarding synthesis result with no narration counterpart"
            );
            return None;
        }

        let filename = audio_filename(&key.0, key.1, language, item.format);
        let url = pack_url(pack_id, &filename);
        if item.audio_url != url {
            warn!(
                engine_url = %item.audio_url,
                expected = %url,
                "Speech engine deviated from the filename contract"
            );
        }

        let path = settings.packs_root.join(pack_id.to_string()).join(&filename);
        let text_url = if settings.save_text {
            Some(pack_url(pack_id, &text_filename(&key.0, key.1, language)))
        } else {
            item.text_url.clone()
        };

        Some(async move {
            let (size_bytes, duration_sec) =
                repair_metrics(&path, item.size_bytes, item.duration_sec, item.format, settings)
                    .await;
            (
                key,
                Audio {
                    url,
                    size_bytes,
                    duration_sec,
                    format: item.format,
                    text_url,
                },
            )
        })
    });

    Ok(futures::future::join_all(probes).await.into_iter().collect())
}

/// Fill in size and duration from the saved file when the engine did not
/// report them: WAV durations parse from the RIFF header, MP3 durations
/// fall back to the bitrate estimate.
async fn repair_metrics(
    path: &Path,
    size_bytes: u64,
    duration_sec: f64,
    format: AudioFormat,
    settings: &AudioSettings,
) -> (u64, f64) {
    if size_bytes > 0 && duration_sec > 0.0 {
        return (size_bytes, duration_sec);
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let size = if size_bytes > 0 { size_bytes } else { bytes.len() as u64 };
            let duration = if duration_sec > 0.0 {
                duration_sec
            } else {
                match format {
                    AudioFormat::Wav => wav_duration_sec(&bytes).unwrap_or(0.0),
                    AudioFormat::Mp3 => mp3_duration_estimate(size, settings.bitrate_kbps),
                }
            };
            (size, duration)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not probe saved audio file");
            (size_bytes, duration_sec)
        }
    }
}
