//! Region capture: turns a detected section map into clipped screenshot
//! artifacts on disk.
//!
//! The full-page shot is the unconditional baseline; header/body/footer clips
//! are best-effort extras captured in a fixed order with per-region failure
//! isolation.

pub mod capture;
pub mod clip;
pub mod errors;
pub mod models;

pub use capture::SectionCapture;
pub use clip::{cap_body_height, sanitize_clip, MAX_BODY_HEIGHT};
pub use errors::CaptureError;
pub use models::{CaptureResult, RegionArtifact};
