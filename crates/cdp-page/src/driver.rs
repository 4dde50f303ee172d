//! Page driver: one attached tab, driven over a shared transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::commands::ScreenshotOptions;
use crate::config::PageConfig;
use crate::error::{DriverError, DriverErrorKind};
use crate::ids::PageId;
use crate::metrics;
use crate::registry::Registry;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget};

/// The page capability surface higher layers program against. Detection and
/// capture take any `PageDriver`, which keeps them testable with fakes.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait until the DOM is at least interactive.
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), DriverError>;

    /// Evaluate a script in the page, returning its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError>;

    /// Capture a screenshot of the attached page.
    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>, DriverError>;

    /// Close the underlying target.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Chromium-backed `PageDriver`. Owns one target/session pair created at
/// attach time; the transport (and the browser process behind it) is shared
/// and may outlive the driver.
pub struct CdpPageDriver {
    page: PageId,
    cfg: PageConfig,
    registry: Arc<Registry>,
    transport: Arc<dyn CdpTransport>,
}

impl CdpPageDriver {
    /// Launch (or connect to) a browser per `cfg` and attach a fresh tab.
    pub async fn launch(cfg: PageConfig) -> Result<Self, DriverError> {
        let transport: Arc<dyn CdpTransport> = Arc::new(ChromiumTransport::new(cfg.clone()));
        Self::attach_with_transport(cfg, transport).await
    }

    /// Attach a fresh tab over an existing transport. Tests use this with
    /// scripted transports; `launch` uses it with the real one.
    pub async fn attach_with_transport(
        cfg: PageConfig,
        transport: Arc<dyn CdpTransport>,
    ) -> Result<Self, DriverError> {
        let driver = Self {
            page: PageId::new(),
            cfg,
            registry: Arc::new(Registry::new()),
            transport,
        };
        driver.attach().await?;
        Ok(driver)
    }

    pub fn page_id(&self) -> PageId {
        self.page
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    async fn attach(&self) -> Result<(), DriverError> {
        let created = self
            .send_browser_command("Target.createTarget", json!({ "url": "about:blank" }))
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("createTarget missing targetId")
            })?
            .to_string();

        // flatten:true makes the session id come back in the response, so no
        // Target.attachedToTarget event round-trip is needed.
        let attached = self
            .send_browser_command(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("attachToTarget missing sessionId")
            })?
            .to_string();

        self.registry
            .insert_page(self.page, Some(target_id), Some(session_id));

        self.send_page_command(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": self.cfg.viewport_width,
                "height": self.cfg.viewport_height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;

        info!(
            target: "cdp-page",
            page = ?self.page,
            width = self.cfg.viewport_width,
            height = self.cfg.viewport_height,
            "page attached"
        );
        Ok(())
    }

    async fn send_browser_command(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let start = Instant::now();
        metrics::record_command(method);
        match self
            .transport
            .send_command(CommandTarget::Browser, method, params)
            .await
        {
            Ok(value) => {
                metrics::record_command_success(method, start.elapsed());
                Ok(value)
            }
            Err(err) => {
                metrics::record_command_failure(method);
                Err(err)
            }
        }
    }

    async fn send_page_command(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let session = self.registry.get_cdp_session(&self.page).ok_or_else(|| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("missing cdp session for page {:?}", self.page))
        })?;

        let start = Instant::now();
        metrics::record_command(method);
        match self
            .transport
            .send_command(CommandTarget::Session(session), method, params)
            .await
        {
            Ok(value) => {
                metrics::record_command_success(method, start.elapsed());
                Ok(value)
            }
            Err(err) => {
                metrics::record_command_failure(method);
                Err(err)
            }
        }
    }

    async fn wait_for_dom_ready(&self, deadline: Instant) -> Result<(), DriverError> {
        loop {
            if Instant::now() >= deadline {
                return Err(DriverError::new(DriverErrorKind::NavTimeout)
                    .with_hint("dom ready wait timed out"));
            }

            let response = self
                .send_page_command(
                    "Runtime.evaluate",
                    json!({
                        "expression": "document.readyState",
                        "returnByValue": true,
                    }),
                )
                .await?;

            let ready = response
                .get("result")
                .and_then(|v| v.get("value"))
                .and_then(|v| v.as_str())
                .map(|state| matches!(state, "interactive" | "complete"))
                .unwrap_or(false);

            if ready {
                return Ok(());
            }

            sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl PageDriver for CdpPageDriver {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), DriverError> {
        debug!(target: "cdp-page", page = ?self.page, %url, "navigating");
        let response = self
            .send_page_command("Page.navigate", json!({ "url": url }))
            .await?;

        if let Some(error_text) = response.get("errorText").and_then(|v| v.as_str()) {
            if !error_text.is_empty() {
                return Err(DriverError::new(DriverErrorKind::CdpIo)
                    .with_hint(format!("navigation failed: {error_text}"))
                    .retriable(true));
            }
        }

        self.registry.set_recent_url(&self.page, url.to_string());
        self.wait_for_dom_ready(Instant::now() + deadline).await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        let response = self
            .send_page_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            return Err(DriverError::new(DriverErrorKind::Evaluation)
                .with_hint("script raised an exception")
                .with_data(details.clone()));
        }

        Ok(response
            .get("result")
            .and_then(|res| res.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Vec<u8>, DriverError> {
        let response = self
            .send_page_command("Page.captureScreenshot", options.to_params())
            .await?;
        let data = response
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal).with_hint("missing screenshot data")
            })?;
        let bytes = STANDARD
            .decode(data)
            .map_err(|err| DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string()))?;
        metrics::record_screenshot();
        Ok(bytes)
    }

    async fn close(&self) -> Result<(), DriverError> {
        if let Some(target_id) = self.registry.get_target_id(&self.page) {
            self.send_browser_command("Target.closeTarget", json!({ "targetId": target_id }))
                .await?;
        }
        self.registry.remove_page(&self.page);
        Ok(())
    }
}
