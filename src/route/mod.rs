//! Route construction: leg building with car/foot mode switching, and
//! stitching per-leg geometries into one polyline with segment metadata.

pub mod builder;
pub mod stitch;

pub use builder::RouteBuilder;
pub use stitch::stitch;
