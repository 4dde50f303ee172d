//! Probe port between the detector and a live page.
//!
//! The detector only ever needs two capabilities: "first element matching a
//! selector, with geometry and visibility" and "page scroll metrics". Keeping
//! that behind a trait lets the detection logic run against fakes in tests
//! while `DriverProbe` scripts a real page through any [`PageDriver`].

use std::sync::Arc;

use async_trait::async_trait;
use cdp_page::PageDriver;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::PerceiverError;

/// Viewport-relative geometry and computed visibility of one element.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ElementProbe {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub bottom: f64,
    pub visible: bool,
}

/// Scroll state of the document at probe time.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub scroll_y: f64,
    pub scroll_height: f64,
    pub viewport_width: f64,
}

#[async_trait]
pub trait SectionProbe: Send + Sync {
    /// Geometry of the first element matching `selector`, or `None` when
    /// nothing matches.
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementProbe>, PerceiverError>;

    async fn page_metrics(&self) -> Result<PageMetrics, PerceiverError>;
}

/// `SectionProbe` backed by script evaluation on a live page.
pub struct DriverProbe<D> {
    driver: Arc<D>,
}

impl<D> DriverProbe<D>
where
    D: PageDriver,
{
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }

    fn element_script(selector: &str) -> Result<String, PerceiverError> {
        // serde_json string quoting doubles as JS string quoting here.
        let quoted = serde_json::to_string(selector)
            .map_err(|err| PerceiverError::internal(format!("unencodable selector: {err}")))?;
        Ok(format!(
            r#"(() => {{
                const el = document.querySelector({quoted});
                if (!el) return null;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return {{
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    top: rect.top,
                    bottom: rect.bottom,
                    visible: style.display !== 'none' && style.visibility !== 'hidden',
                }};
            }})()"#
        ))
    }

    fn metrics_script() -> &'static str {
        r#"(() => ({
            scrollY: window.scrollY,
            scrollHeight: document.documentElement.scrollHeight,
            viewportWidth: window.innerWidth,
        }))()"#
    }
}

#[async_trait]
impl<D> SectionProbe for DriverProbe<D>
where
    D: PageDriver,
{
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementProbe>, PerceiverError> {
        let script = Self::element_script(selector)?;
        let value = self.driver.evaluate(&script).await?;
        if value.is_null() {
            return Ok(None);
        }
        let probe: ElementProbe = serde_json::from_value(value)
            .map_err(|err| PerceiverError::payload(format!("element probe: {err}")))?;
        Ok(Some(probe))
    }

    async fn page_metrics(&self) -> Result<PageMetrics, PerceiverError> {
        let value: Value = self.driver.evaluate(Self::metrics_script()).await?;
        serde_json::from_value(value)
            .map_err(|err| PerceiverError::payload(format!("page metrics: {err}")))
    }
}
