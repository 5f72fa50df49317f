//! Shared data structures for the navigation pack pipeline
//!
//! - `plan` — plan request, assets, and the durable pack manifest
//! - `route` — coordinates, legs, segments, and the stitched route view
//! - `poi` — resolved spots, along-route POIs, and narration identity keys

mod plan;
mod poi;
mod route;

pub use plan::*;
pub use poi::*;
pub use route::*;
