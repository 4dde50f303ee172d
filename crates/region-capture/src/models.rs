use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One written screenshot. Dimensions are introspected from the encoded
/// bytes and may be absent if the image did not decode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionArtifact {
    pub path: PathBuf,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Artifacts produced by one capture pass. `full` is always present; a
/// region key is absent when the region was not found or its capture failed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureResult {
    pub full: RegionArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<RegionArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<RegionArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<RegionArtifact>,
}

impl CaptureResult {
    pub fn artifact_count(&self) -> usize {
        1 + self.header.is_some() as usize
            + self.body.is_some() as usize
            + self.footer.is_some() as usize
    }
}
