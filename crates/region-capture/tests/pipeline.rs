//! Detection-to-capture pipeline exercised end to end against fakes.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cdp_page::{DriverError, PageDriver, ScreenshotOptions};
use perceiver_section::{ElementProbe, PageMetrics, PerceiverError, SectionDetector, SectionProbe};
use region_capture::SectionCapture;
use serde_json::Value;
use tempfile::tempdir;

struct StaticProbe {
    elements: HashMap<&'static str, ElementProbe>,
}

#[async_trait]
impl SectionProbe for StaticProbe {
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementProbe>, PerceiverError> {
        Ok(self.elements.get(selector).copied())
    }

    async fn page_metrics(&self) -> Result<PageMetrics, PerceiverError> {
        Ok(PageMetrics {
            scroll_y: 0.0,
            scroll_height: 4800.0,
            viewport_width: 1280.0,
        })
    }
}

struct PngDriver {
    calls: Mutex<Vec<ScreenshotOptions>>,
}

impl PngDriver {
    fn png() -> Vec<u8> {
        let img = image::RgbaImage::new(1, 1);
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }
}

#[async_trait]
impl PageDriver for PngDriver {
    async fn navigate(&self, _url: &str, _deadline: Duration) -> Result<(), DriverError> {
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> Result<Value, DriverError> {
        Ok(Value::Null)
    }

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>, DriverError> {
        self.calls.lock().unwrap().push(options);
        Ok(Self::png())
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn band(y: f64, height: f64) -> ElementProbe {
    ElementProbe {
        x: 0.0,
        y,
        width: 1280.0,
        height,
        top: y,
        bottom: y + height,
        visible: true,
    }
}

#[tokio::test]
async fn detected_sections_become_clipped_artifacts() {
    let probe = StaticProbe {
        elements: HashMap::from([("header", band(0.0, 96.0)), ("footer", band(4400.0, 400.0))]),
    };
    let map = SectionDetector::new(probe).detect().await.unwrap();

    let driver = Arc::new(PngDriver {
        calls: Mutex::new(Vec::new()),
    });
    let out = tempdir().unwrap();
    let result = SectionCapture::new(driver.clone())
        .capture(&map, out.path())
        .await
        .unwrap();

    assert_eq!(result.artifact_count(), 4);
    for artifact in [
        &result.full,
        result.header.as_ref().unwrap(),
        result.body.as_ref().unwrap(),
        result.footer.as_ref().unwrap(),
    ] {
        assert!(artifact.path.exists());
    }

    let calls = driver.calls.lock().unwrap();
    assert!(calls[0].full_page);
    // body band runs from the header bottom to the footer top
    let body_clip = calls[2].clip.unwrap();
    assert_eq!(body_clip.y, 96.0);
    assert_eq!(body_clip.height, 4304.0);
}
