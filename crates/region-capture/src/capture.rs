//! Capture pass: full page first, then the found regions in a fixed order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cdp_page::{PageDriver, ScreenshotClip, ScreenshotOptions};
use chrono::Utc;
use perceiver_section::{SectionKind, SectionMap};
use tracing::{debug, warn};

use crate::clip::{cap_body_height, sanitize_clip, MAX_BODY_HEIGHT};
use crate::errors::CaptureError;
use crate::models::{CaptureResult, RegionArtifact};

pub struct SectionCapture<D> {
    driver: Arc<D>,
    max_body_height: i32,
}

impl<D> SectionCapture<D>
where
    D: PageDriver,
{
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            max_body_height: MAX_BODY_HEIGHT,
        }
    }

    pub fn with_max_body_height(mut self, max_body_height: i32) -> Self {
        self.max_body_height = max_body_height;
        self
    }

    /// Capture one full-page artifact plus one clipped artifact per found
    /// region, writing `screenshot-<region>-<timestamp>.png` files under
    /// `out_dir` with one shared timestamp.
    ///
    /// The full-page capture is load-bearing and its failure aborts the
    /// call. Region captures are isolated: a failed region is logged and its
    /// key left absent, the remaining regions still run. Captures are strictly
    /// sequential, one page cannot render two screenshots at once.
    pub async fn capture(
        &self,
        map: &SectionMap,
        out_dir: &Path,
    ) -> Result<CaptureResult, CaptureError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let stamp = Utc::now().timestamp_millis();

        let full = self
            .capture_artifact(out_dir, "full", stamp, ScreenshotOptions::full_page())
            .await?;

        let header = match &map.sections.header {
            section if section.found => match section.bounds {
                Some(bounds) => {
                    let clip = sanitize_clip(&bounds, map.viewport);
                    self.capture_region(SectionKind::Header, out_dir, stamp, clip)
                        .await
                }
                None => None,
            },
            _ => None,
        };

        let body = match map.sections.body.bounds {
            Some(bounds) if map.sections.body.found => {
                let capped = cap_body_height(&bounds, self.max_body_height);
                let clip = sanitize_clip(&capped, map.viewport);
                self.capture_region(SectionKind::Body, out_dir, stamp, clip)
                    .await
            }
            _ => None,
        };

        let footer = match &map.sections.footer {
            section if section.found => match section.bounds {
                Some(bounds) => {
                    let clip = sanitize_clip(&bounds, map.viewport);
                    self.capture_region(SectionKind::Footer, out_dir, stamp, clip)
                        .await
                }
                None => None,
            },
            _ => None,
        };

        Ok(CaptureResult {
            full,
            header,
            body,
            footer,
        })
    }

    /// Baseline-only capture for crawls that skip section detection.
    pub async fn capture_full(&self, out_dir: &Path) -> Result<RegionArtifact, CaptureError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let stamp = Utc::now().timestamp_millis();
        self.capture_artifact(out_dir, "full", stamp, ScreenshotOptions::full_page())
            .await
    }

    async fn capture_region(
        &self,
        kind: SectionKind,
        out_dir: &Path,
        stamp: i64,
        clip: ScreenshotClip,
    ) -> Option<RegionArtifact> {
        let options = ScreenshotOptions::clipped(clip);
        match self
            .capture_artifact(out_dir, kind.as_str(), stamp, options)
            .await
        {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                warn!(
                    target: "region-capture",
                    region = kind.as_str(),
                    %err,
                    "region capture failed, continuing with remaining regions"
                );
                None
            }
        }
    }

    async fn capture_artifact(
        &self,
        out_dir: &Path,
        region: &str,
        stamp: i64,
        options: ScreenshotOptions,
    ) -> Result<RegionArtifact, CaptureError> {
        let bytes = self.driver.screenshot(options).await?;
        let path = artifact_path(out_dir, region, stamp);
        tokio::fs::write(&path, &bytes).await?;

        let dimensions = probe_dimensions(&bytes);
        debug!(
            target: "region-capture",
            region,
            path = %path.display(),
            bytes = bytes.len(),
            "artifact written"
        );

        Ok(RegionArtifact {
            path,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        })
    }
}

fn artifact_path(out_dir: &Path, region: &str, stamp: i64) -> PathBuf {
    out_dir.join(format!("screenshot-{region}-{stamp}.png"))
}

/// Best-effort dimension introspection; `None` when the bytes do not decode
/// as an image.
fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    use image::io::Reader as ImageReader;
    use std::io::Cursor;

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .decode()
        .ok()?;
    Some((img.width(), img.height()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use cdp_page::DriverError;
    use perceiver_section::{
        ConfidenceReport, DetectedSection, RegionBounds, Sections, Viewport,
    };
    use serde_json::Value;
    use tempfile::tempdir;

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// Records every screenshot request; an entry in `fail_calls` makes that
    /// call (1-based, in request order) fail.
    struct ScriptedDriver {
        calls: Mutex<Vec<ScreenshotOptions>>,
        fail_calls: Vec<usize>,
        payload: Vec<u8>,
    }

    impl ScriptedDriver {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_calls: Vec::new(),
                payload: png_bytes(2, 3),
            }
        }

        fn failing_on(mut self, call: usize) -> Self {
            self.fail_calls.push(call);
            self
        }

        fn recorded(&self) -> Vec<ScreenshotOptions> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedDriver {
        async fn navigate(&self, _url: &str, _deadline: Duration) -> Result<(), DriverError> {
            Ok(())
        }

        async fn evaluate(&self, _expression: &str) -> Result<Value, DriverError> {
            Ok(Value::Null)
        }

        async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>, DriverError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(options);
            if self.fail_calls.contains(&calls.len()) {
                return Err(DriverError::new(cdp_page::DriverErrorKind::CdpIo)
                    .with_hint("scripted failure"));
            }
            Ok(self.payload.clone())
        }

        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    fn full_map() -> SectionMap {
        SectionMap {
            viewport: Viewport {
                width: 1200,
                height: 5000,
            },
            sections: Sections {
                header: DetectedSection::matched(
                    RegionBounds::from_parts(0, 0, 1200, 500),
                    "header",
                    0.9,
                ),
                body: DetectedSection::residual(RegionBounds::from_parts(0, 500, 1200, 3500), 1.0),
                footer: DetectedSection::matched(
                    RegionBounds::from_parts(0, 4000, 1200, 800),
                    "footer",
                    0.9,
                ),
            },
            confidence: ConfidenceReport {
                header: 0.9,
                body: 1.0,
                footer: 0.9,
            },
            detected_at: Utc::now(),
        }
    }

    fn headerless_map() -> SectionMap {
        let mut map = full_map();
        map.sections.footer = DetectedSection::missing();
        map.confidence.footer = 0.0;
        map
    }

    #[tokio::test]
    async fn captures_full_then_regions_in_fixed_order() {
        let driver = Arc::new(ScriptedDriver::new());
        let out = tempdir().unwrap();

        let result = SectionCapture::new(driver.clone())
            .capture(&full_map(), out.path())
            .await
            .unwrap();

        assert_eq!(result.artifact_count(), 4);

        let calls = driver.recorded();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].full_page && calls[0].clip.is_none());
        // header -> body -> footer, recognizable by their y coordinates
        assert_eq!(calls[1].clip.unwrap().y, 0.0);
        assert_eq!(calls[2].clip.unwrap().y, 500.0);
        assert_eq!(calls[3].clip.unwrap().y, 4000.0);
    }

    #[tokio::test]
    async fn artifacts_share_one_timestamp_and_decode() {
        let driver = Arc::new(ScriptedDriver::new());
        let out = tempdir().unwrap();

        let result = SectionCapture::new(driver)
            .capture(&full_map(), out.path())
            .await
            .unwrap();

        let stamp_of = |artifact: &RegionArtifact| {
            let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
            name.trim_end_matches(".png")
                .rsplit('-')
                .next()
                .unwrap()
                .to_string()
        };
        let full_stamp = stamp_of(&result.full);
        assert_eq!(stamp_of(result.header.as_ref().unwrap()), full_stamp);
        assert_eq!(stamp_of(result.body.as_ref().unwrap()), full_stamp);
        assert_eq!(stamp_of(result.footer.as_ref().unwrap()), full_stamp);

        assert!(result.full.path.exists());
        assert_eq!(result.full.width, Some(2));
        assert_eq!(result.full.height, Some(3));
    }

    #[tokio::test]
    async fn missing_region_key_is_absent() {
        let driver = Arc::new(ScriptedDriver::new());
        let out = tempdir().unwrap();

        let result = SectionCapture::new(driver.clone())
            .capture(&headerless_map(), out.path())
            .await
            .unwrap();

        assert!(result.footer.is_none());
        assert_eq!(result.artifact_count(), 3);
        assert_eq!(driver.recorded().len(), 3);
    }

    #[tokio::test]
    async fn body_clip_is_height_capped() {
        let driver = Arc::new(ScriptedDriver::new());
        let out = tempdir().unwrap();
        let mut map = full_map();
        map.sections.body =
            DetectedSection::residual(RegionBounds::from_parts(0, 500, 1200, 10_000), 1.0);

        SectionCapture::new(driver.clone())
            .capture(&map, out.path())
            .await
            .unwrap();

        let calls = driver.recorded();
        assert_eq!(calls[2].clip.unwrap().height, 3000.0);
    }

    #[tokio::test]
    async fn one_failed_region_does_not_stop_the_rest() {
        // call 2 is the header clip
        let driver = Arc::new(ScriptedDriver::new().failing_on(2));
        let out = tempdir().unwrap();

        let result = SectionCapture::new(driver.clone())
            .capture(&full_map(), out.path())
            .await
            .unwrap();

        assert!(result.header.is_none());
        assert!(result.body.is_some());
        assert!(result.footer.is_some());
        assert_eq!(driver.recorded().len(), 4);
    }

    #[tokio::test]
    async fn full_page_failure_aborts_the_capture() {
        let driver = Arc::new(ScriptedDriver::new().failing_on(1));
        let out = tempdir().unwrap();

        let err = SectionCapture::new(driver)
            .capture(&full_map(), out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Driver(_)));
    }

    #[tokio::test]
    async fn capture_full_writes_only_the_baseline() {
        let driver = Arc::new(ScriptedDriver::new());
        let out = tempdir().unwrap();

        let artifact = SectionCapture::new(driver.clone())
            .capture_full(out.path())
            .await
            .unwrap();

        assert!(artifact.path.exists());
        assert_eq!(driver.recorded().len(), 1);
    }
}
