//! Section perceiver: infers header/body/footer regions of a rendered page.
//!
//! Header and footer are located by walking fixed priority lists of landmark
//! selectors; the body is the residual band between them. The output is a
//! [`SectionMap`] with document-relative bounds, ready for clipped capture.

pub mod detector;
pub mod errors;
pub mod model;
pub mod ports;
pub mod selectors;

pub use detector::{SectionDetector, BODY_CONFIDENCE, FOUND_CONFIDENCE};
pub use errors::PerceiverError;
pub use model::{
    ConfidenceReport, DetectedSection, RegionBounds, SectionKind, SectionMap, Sections, Viewport,
};
pub use ports::{DriverProbe, ElementProbe, PageMetrics, SectionProbe};
