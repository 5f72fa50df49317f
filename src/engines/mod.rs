//! Clients for the external engines the pipeline coordinates.
//!
//! Each engine sits behind a small async trait so the pipeline can be
//! exercised without a network. The HTTP implementations share the same
//! discipline: per-call timeout from configuration, base URL trimmed of a
//! trailing slash, non-2xx classified through [`crate::error::PlanError`].

pub mod narration;
pub mod routing;
pub mod speech;

pub use narration::{HttpNarrationEngine, NarrationEngine, NarrationOutput, NarrationSpot};
pub use routing::{HttpRouteSolver, RouteSolver, SolvedRoute};
pub use speech::{
    HttpSpeechEngine, SpeechEngine, SynthesisItem, SynthesisRequest, SynthesizedItem,
};

use std::time::Duration;

/// Build a reqwest client with the given per-call budget.
pub(crate) fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Normalize a configured base URL for path concatenation.
pub(crate) fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}
