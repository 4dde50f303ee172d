use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rendered-page dimensions: visible width and total scrollable height.
/// Snapshotted once per detection pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Axis-aligned pixel rectangle. Vertical coordinates are document-relative
/// (scroll offset folded in at detection time); `x`/`width` stay
/// viewport-relative since horizontal scrolling is not modeled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub top: i32,
    pub bottom: i32,
}

impl RegionBounds {
    pub fn from_parts(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            top: y,
            bottom: y + height,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Header,
    Body,
    Footer,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::Body => "body",
            SectionKind::Footer => "footer",
        }
    }
}

/// One region's detection outcome. `bounds` and `selector_used` are present
/// only when `found`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedSection {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<RegionBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector_used: Option<String>,
    pub confidence: f32,
}

impl DetectedSection {
    pub fn matched(bounds: RegionBounds, selector: &str, confidence: f32) -> Self {
        Self {
            found: true,
            bounds: Some(bounds),
            selector_used: Some(selector.to_string()),
            confidence,
        }
    }

    pub fn residual(bounds: RegionBounds, confidence: f32) -> Self {
        Self {
            found: true,
            bounds: Some(bounds),
            selector_used: None,
            confidence,
        }
    }

    pub fn missing() -> Self {
        Self {
            found: false,
            bounds: None,
            selector_used: None,
            confidence: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sections {
    pub header: DetectedSection,
    pub body: DetectedSection,
    pub footer: DetectedSection,
}

/// Fixed heuristic scores, not evidence-derived. Callers must not read these
/// as calibrated probabilities.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub header: f32,
    pub body: f32,
    pub footer: f32,
}

/// The full detection result for one page at one instant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMap {
    pub viewport: Viewport,
    pub sections: Sections,
    pub confidence: ConfidenceReport,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_derives_top_and_bottom() {
        let bounds = RegionBounds::from_parts(0, 500, 1200, 3500);
        assert_eq!(bounds.top, 500);
        assert_eq!(bounds.bottom, 4000);
    }

    #[test]
    fn missing_section_serializes_without_bounds() {
        let value = serde_json::to_value(DetectedSection::missing()).unwrap();
        assert_eq!(value["found"], false);
        assert!(value.get("bounds").is_none());
        assert!(value.get("selectorUsed").is_none());
    }

    #[test]
    fn section_map_uses_camel_case_keys() {
        let map = SectionMap {
            viewport: Viewport {
                width: 1280,
                height: 5000,
            },
            sections: Sections {
                header: DetectedSection::matched(
                    RegionBounds::from_parts(0, 0, 1280, 80),
                    "header",
                    0.9,
                ),
                body: DetectedSection::residual(RegionBounds::from_parts(0, 80, 1280, 4920), 1.0),
                footer: DetectedSection::missing(),
            },
            confidence: ConfidenceReport {
                header: 0.9,
                body: 1.0,
                footer: 0.0,
            },
            detected_at: Utc::now(),
        };
        let value = serde_json::to_value(&map).unwrap();
        assert!(value.get("detectedAt").is_some());
        assert_eq!(value["sections"]["header"]["selectorUsed"], "header");
    }
}
