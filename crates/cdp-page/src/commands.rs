//! Command parameter types exposed by the page driver interface.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Options for capturing screenshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    pub clip: Option<ScreenshotClip>,
    pub full_page: bool,
    pub format: ScreenshotFormat,
}

impl ScreenshotOptions {
    /// Capture the entire scrollable document.
    pub fn full_page() -> Self {
        Self {
            clip: None,
            full_page: true,
            format: ScreenshotFormat::Png,
        }
    }

    /// Capture a document-relative rectangle.
    pub fn clipped(clip: ScreenshotClip) -> Self {
        Self {
            clip: Some(clip),
            full_page: false,
            format: ScreenshotFormat::Png,
        }
    }

    /// Build the `Page.captureScreenshot` parameter object.
    pub fn to_params(&self) -> Value {
        let mut params = serde_json::Map::new();
        params.insert("format".into(), Value::String(self.format.as_str().into()));
        if let ScreenshotFormat::Jpeg { quality: Some(q) } = self.format {
            params.insert("quality".into(), Value::Number(q.into()));
        }
        // Clips are document-relative and may extend past the visible
        // viewport, so both modes need captureBeyondViewport.
        if self.full_page || self.clip.is_some() {
            params.insert("captureBeyondViewport".into(), Value::Bool(true));
        }
        if let Some(clip) = &self.clip {
            params.insert(
                "clip".into(),
                json!({
                    "x": clip.x,
                    "y": clip.y,
                    "width": clip.width,
                    "height": clip.height,
                    "scale": clip.scale,
                }),
            );
        }
        Value::Object(params)
    }
}

/// Document-relative clip rectangle for `Page.captureScreenshot`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotClip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum ScreenshotFormat {
    Png,
    Jpeg { quality: Option<u8> },
}

impl ScreenshotFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotFormat::Png => "png",
            ScreenshotFormat::Jpeg { .. } => "jpeg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_page_params_request_beyond_viewport() {
        let params = ScreenshotOptions::full_page().to_params();
        assert_eq!(params["format"], "png");
        assert_eq!(params["captureBeyondViewport"], true);
        assert!(params.get("clip").is_none());
    }

    #[test]
    fn clipped_params_carry_the_rectangle() {
        let clip = ScreenshotClip {
            x: 0.0,
            y: 500.0,
            width: 1280.0,
            height: 3000.0,
            scale: 1.0,
        };
        let params = ScreenshotOptions::clipped(clip).to_params();
        assert_eq!(params["clip"]["y"], 500.0);
        assert_eq!(params["clip"]["height"], 3000.0);
        assert_eq!(params["captureBeyondViewport"], true);
    }
}
