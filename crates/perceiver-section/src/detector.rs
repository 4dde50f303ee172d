//! Header/body/footer inference over a [`SectionProbe`].

use chrono::Utc;
use tracing::debug;

use crate::errors::PerceiverError;
use crate::model::{
    ConfidenceReport, DetectedSection, RegionBounds, SectionMap, Sections, Viewport,
};
use crate::ports::{PageMetrics, SectionProbe};
use crate::selectors::{FOOTER_SELECTORS, HEADER_SELECTORS};

/// Fixed score for a region located via its selector list.
pub const FOUND_CONFIDENCE: f32 = 0.9;
/// The body is residual, never queried, so it is always "certain".
pub const BODY_CONFIDENCE: f32 = 1.0;

pub struct SectionDetector<P> {
    probe: P,
}

impl<P> SectionDetector<P>
where
    P: SectionProbe,
{
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Detect the section layout of the page behind the probe.
    ///
    /// Pure with respect to the page: nothing is mutated, and the result is
    /// a snapshot valid only as long as the page layout is unchanged. Probe
    /// failures propagate unmodified; an unmatched region is a routine
    /// `found: false`, not an error.
    pub async fn detect(&self) -> Result<SectionMap, PerceiverError> {
        let metrics = self.probe.page_metrics().await?;

        let header = self.find_first(HEADER_SELECTORS, &metrics).await?;
        let footer = self.find_first(FOOTER_SELECTORS, &metrics).await?;

        let viewport = Viewport {
            width: metrics.viewport_width.round() as u32,
            height: metrics.scroll_height.round() as u32,
        };
        let body = Self::residual_body(&header, &footer, viewport);

        debug!(
            target: "perceiver-section",
            header = header.found,
            footer = footer.found,
            body_height = body.bounds.map(|b| b.height),
            "sections detected"
        );

        let confidence = ConfidenceReport {
            header: header.confidence,
            body: body.confidence,
            footer: footer.confidence,
        };

        Ok(SectionMap {
            viewport,
            sections: Sections {
                header,
                body,
                footer,
            },
            confidence,
            detected_at: Utc::now(),
        })
    }

    /// Walk a priority list; the first visible match wins. Invisible or
    /// absent matches fall through to the next pattern.
    async fn find_first(
        &self,
        selectors: &[&str],
        metrics: &PageMetrics,
    ) -> Result<DetectedSection, PerceiverError> {
        for selector in selectors {
            match self.probe.query_selector(selector).await? {
                Some(el) if el.visible => {
                    let bounds = Self::fold_scroll(el, metrics.scroll_y);
                    return Ok(DetectedSection::matched(bounds, selector, FOUND_CONFIDENCE));
                }
                _ => continue,
            }
        }
        Ok(DetectedSection::missing())
    }

    /// Convert viewport-relative element geometry to document-relative
    /// bounds: the scroll offset is folded into the vertical coordinates
    /// only, then everything is rounded to whole pixels.
    fn fold_scroll(el: crate::ports::ElementProbe, scroll_y: f64) -> RegionBounds {
        RegionBounds {
            x: el.x.round() as i32,
            y: (el.y + scroll_y).round() as i32,
            width: el.width.round() as i32,
            height: el.height.round() as i32,
            top: (el.top + scroll_y).round() as i32,
            bottom: (el.bottom + scroll_y).round() as i32,
        }
    }

    /// The body is whatever vertical band is left between header bottom and
    /// footer top (or the document edges when either is missing).
    fn residual_body(
        header: &DetectedSection,
        footer: &DetectedSection,
        viewport: Viewport,
    ) -> DetectedSection {
        let y = header.bounds.map(|b| b.bottom).unwrap_or(0);
        let lower = footer
            .bounds
            .map(|b| b.top)
            .unwrap_or(viewport.height as i32);
        let bounds = RegionBounds::from_parts(0, y, viewport.width as i32, lower - y);
        DetectedSection::residual(bounds, BODY_CONFIDENCE)
    }
}
