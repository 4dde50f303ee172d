//! Crawl driver: runs one URL end to end. Navigate, detect sections,
//! capture region artifacts, harvest page metadata, write the meta document.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cdp_page::PageDriver;
use chrono::{DateTime, Utc};
use perceiver_section::{DriverProbe, SectionDetector, SectionMap};
use region_capture::{CaptureResult, SectionCapture, MAX_BODY_HEIGHT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Clone, Debug)]
pub struct CrawlOptions {
    pub url: String,
    pub out_dir: PathBuf,
    /// When false, only the full-page baseline screenshot is taken.
    pub capture_sections: bool,
    pub max_body_height: i32,
    pub navigation_timeout: Duration,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            out_dir: out_dir.into(),
            capture_sections: true,
            max_body_height: MAX_BODY_HEIGHT,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Driver(#[from] cdp_page::DriverError),
    #[error(transparent)]
    Perceiver(#[from] perceiver_section::PerceiverError),
    #[error(transparent)]
    Capture(#[from] region_capture::CaptureError),
    #[error("meta document i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("meta document encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Rendered `<img>` metadata harvested from the page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Everything one crawl produced; also the shape of the meta JSON document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub url: String,
    pub title: Option<String>,
    pub screenshots: CaptureResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_data: Option<SectionMap>,
    pub captured_at: DateTime<Utc>,
    pub images: Vec<ImageRef>,
    pub headers: Vec<String>,
    #[serde(skip)]
    pub meta_path: PathBuf,
}

const IMAGES_SCRIPT: &str = r#"(() =>
    Array.from(document.images).map((img) => ({
        src: img.src,
        alt: img.alt || null,
        width: img.width,
        height: img.height,
    }))
)()"#;

const HEADERS_SCRIPT: &str = r#"(() =>
    Array.from(document.querySelectorAll('h1, h2, h3'))
        .map((h) => h.innerText.trim())
)()"#;

/// Run one crawl against an already-attached driver.
///
/// Backend failures before the baseline screenshot abort the crawl; failed
/// region clips are isolated inside the capture layer and show up as absent
/// keys in the report.
pub async fn crawl<D>(driver: Arc<D>, options: &CrawlOptions) -> Result<CrawlReport, CrawlError>
where
    D: PageDriver,
{
    info!(target: "sectionscout", url = %options.url, "crawl started");
    driver
        .navigate(&options.url, options.navigation_timeout)
        .await?;

    let section_data = if options.capture_sections {
        let probe = DriverProbe::new(Arc::clone(&driver));
        Some(SectionDetector::new(probe).detect().await?)
    } else {
        None
    };

    let capture =
        SectionCapture::new(Arc::clone(&driver)).with_max_body_height(options.max_body_height);
    let screenshots = match &section_data {
        Some(map) => capture.capture(map, &options.out_dir).await?,
        None => CaptureResult {
            full: capture.capture_full(&options.out_dir).await?,
            header: None,
            body: None,
            footer: None,
        },
    };

    let title = driver
        .evaluate("document.title")
        .await?
        .as_str()
        .map(str::to_string);
    let images: Vec<ImageRef> = serde_json::from_value(driver.evaluate(IMAGES_SCRIPT).await?)?;
    let headers: Vec<String> = serde_json::from_value(driver.evaluate(HEADERS_SCRIPT).await?)?;

    let captured_at = Utc::now();
    let mut report = CrawlReport {
        url: options.url.clone(),
        title,
        screenshots,
        section_data,
        captured_at,
        images,
        headers,
        meta_path: PathBuf::new(),
    };

    let meta_path = options
        .out_dir
        .join(format!("meta-{}.json", captured_at.timestamp_millis()));
    tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&report)?).await?;
    report.meta_path = meta_path;

    info!(
        target: "sectionscout",
        url = %options.url,
        artifacts = report.screenshots.artifact_count(),
        images = report.images.len(),
        meta = %report.meta_path.display(),
        "crawl finished"
    );
    Ok(report)
}
