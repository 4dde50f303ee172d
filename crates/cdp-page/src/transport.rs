use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::{future::BoxFuture, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PageConfig;
use crate::error::{DriverError, DriverErrorKind};
use crate::resolve_chrome_path;
use crate::util::wait_for_ws_url;

/// Where a protocol command is addressed: the browser endpoint itself, or a
/// flattened page session.
#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError>;
}

/// Transport stand-in for drivers built without a browser behind them.
/// Every command fails; unit tests substitute their own probe fakes instead.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl CdpTransport for NoopTransport {
    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, DriverError> {
        Err(DriverError::new(DriverErrorKind::Internal)
            .with_hint(format!("no transport available for method {method}")))
    }
}

type RuntimeFactory = Arc<
    dyn Fn(PageConfig) -> BoxFuture<'static, Result<Arc<RuntimeState>, DriverError>> + Send + Sync,
>;

/// Lazily-started connection to a Chromium instance. The underlying runtime
/// (websocket loop plus optional child process) is created on first use and
/// recreated transparently if the previous one died.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: PageConfig,
    state: Arc<OnceCell<Mutex<Option<Arc<RuntimeState>>>>>,
    factory: RuntimeFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: PageConfig) -> Self {
        let factory: RuntimeFactory = Arc::new(|cfg: PageConfig| {
            Box::pin(async move {
                let state = RuntimeState::start(cfg).await?;
                Ok(Arc::new(state))
            })
        });

        Self {
            cfg,
            state: Arc::new(OnceCell::new()),
            factory,
        }
    }

    async fn runtime(&self) -> Result<Arc<RuntimeState>, DriverError> {
        let cell = self.state.get_or_init(|| async { Mutex::new(None) }).await;
        let mut guard = cell.lock().await;

        if let Some(rt) = guard.as_ref() {
            if rt.is_alive() {
                return Ok(rt.clone());
            }
        }

        let runtime = (self.factory)(self.cfg.clone()).await?;
        *guard = Some(runtime.clone());
        Ok(runtime)
    }

    #[cfg(test)]
    fn with_factory(cfg: PageConfig, factory: RuntimeFactory) -> Self {
        Self {
            cfg,
            state: Arc::new(OnceCell::new()),
            factory,
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let runtime = self.runtime().await?;
        runtime
            .send_internal(
                target,
                method,
                params,
                Duration::from_millis(self.cfg.default_deadline_ms),
            )
            .await
    }
}

struct ControlMessage {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: oneshot::Sender<Result<Value, DriverError>>,
}

struct RuntimeState {
    command_tx: mpsc::Sender<ControlMessage>,
    loop_task: JoinHandle<()>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl RuntimeState {
    async fn start(cfg: PageConfig) -> Result<Self, DriverError> {
        let (child, ws_url) = if let Some(url) = cfg.websocket_url.clone() {
            (None, url)
        } else {
            let browser_cfg = Self::browser_config(&cfg)?;
            Self::launch_browser(browser_cfg).await?
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(128);

        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = alive.clone();

        let loop_task = tokio::spawn(async move {
            let result = Self::run_loop(conn, command_rx).await;
            loop_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-page", ?err, "transport loop terminated with error");
            }
        });

        info!(target: "cdp-page", url = %ws_url, "chromium connection established");

        Ok(Self {
            command_tx,
            loop_task,
            child: Mutex::new(child),
            alive,
        })
    }

    #[cfg(test)]
    fn test_stub() -> (Arc<Self>, Arc<AtomicBool>) {
        let (command_tx, _command_rx) = mpsc::channel(8);
        let alive = Arc::new(AtomicBool::new(true));
        let loop_alive = alive.clone();
        let loop_task = tokio::spawn(async move {
            futures::future::pending::<()>().await;
            loop_alive.store(false, Ordering::Relaxed);
        });

        (
            Arc::new(Self {
                command_tx,
                loop_task,
                child: Mutex::new(None),
                alive: alive.clone(),
            }),
            alive,
        )
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn send_internal(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, DriverError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        let message = ControlMessage {
            target,
            method: method.to_string(),
            params,
            responder: resp_tx,
        };

        self.command_tx
            .send(message)
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string()))?;

        match tokio::time::timeout(deadline, resp_rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_)) => Err(DriverError::new(DriverErrorKind::CdpIo)
                .with_hint("command response channel closed")),
            Err(_) => Err(DriverError::new(DriverErrorKind::NavTimeout)
                .with_hint(format!("command {method} timed out"))
                .retriable(true)),
        }
    }

    fn browser_config(cfg: &PageConfig) -> Result<BrowserConfig, DriverError> {
        let executable = resolve_chrome_path(cfg).ok_or_else(|| {
            DriverError::new(DriverErrorKind::CdpIo)
                .with_hint("no chrome/chromium executable found")
                .with_data(json!({
                    "hint": "Set SECTIONSCOUT_CHROME to the full path of chrome/chromium, \
                             or pass --ws-url to attach to a running browser."
                }))
        })?;

        let profile_dir = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            let cwd = std::env::current_dir().map_err(|err| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
            })?;
            cwd.join(&cfg.user_data_dir)
        };
        fs::create_dir_all(&profile_dir).map_err(|err| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("failed to ensure user-data-dir: {err}"))
        })?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
            .launch_timeout(Duration::from_secs(20));

        if !cfg.headless {
            builder = builder.with_head();
        }

        if std::env::var("SECTIONSCOUT_DISABLE_SANDBOX")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            builder = builder.no_sandbox();
        }

        let mut args = vec![
            "--disable-background-networking",
            "--disable-background-timer-throttling",
            "--disable-breakpad",
            "--disable-client-side-phishing-detection",
            "--disable-component-update",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-hang-monitor",
            "--disable-popup-blocking",
            "--disable-prompt-on-repost",
            "--disable-sync",
            "--metrics-recording-only",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
            "--use-mock-keychain",
        ];
        if cfg.headless {
            args.push("--headless=new");
            args.push("--hide-scrollbars");
            args.push("--mute-audio");
        }
        builder = builder.args(args);

        builder = builder.chrome_executable(executable);
        builder = builder.user_data_dir(profile_dir);

        builder.build().map_err(|err| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("browser config error: {err}"))
        })
    }

    async fn launch_browser(config: BrowserConfig) -> Result<(Option<Child>, String), DriverError> {
        let mut child = config.launch().map_err(|err| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let ws_url = wait_for_ws_url(&mut child, Duration::from_secs(20))
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string()))?;

        Ok((Some(child), ws_url))
    }

    async fn run_loop(
        mut conn: Connection<CdpEventMessage>,
        mut command_rx: mpsc::Receiver<ControlMessage>,
    ) -> Result<(), DriverError> {
        let mut inflight: HashMap<CallId, oneshot::Sender<Result<Value, DriverError>>> =
            HashMap::new();

        loop {
            tokio::select! {
                Some(cmd) = command_rx.recv() => {
                    Self::handle_command(&mut conn, cmd, &mut inflight)?;
                }
                message = conn.next() => {
                    match message {
                        Some(Ok(Message::Response(resp))) => {
                            Self::handle_response(resp, &mut inflight);
                        }
                        Some(Ok(Message::Event(event))) => {
                            Self::log_event(event);
                        }
                        Some(Err(err)) => {
                            let driver_err = Self::map_cdp_error(err);
                            for (_, sender) in inflight.drain() {
                                let _ = sender.send(Err(driver_err.clone()));
                            }
                            return Err(driver_err);
                        }
                        None => {
                            let err = DriverError::new(DriverErrorKind::CdpIo)
                                .with_hint("cdp connection closed");
                            for (_, sender) in inflight.drain() {
                                let _ = sender.send(Err(err.clone()));
                            }
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn handle_command(
        conn: &mut Connection<CdpEventMessage>,
        cmd: ControlMessage,
        inflight: &mut HashMap<CallId, oneshot::Sender<Result<Value, DriverError>>>,
    ) -> Result<(), DriverError> {
        let session = match cmd.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(session_id) => Some(CdpSessionId::from(session_id)),
        };

        let method_id: MethodId = cmd.method.clone().into();
        match conn.submit_command(method_id, session, cmd.params) {
            Ok(call_id) => {
                inflight.insert(call_id, cmd.responder);
                Ok(())
            }
            Err(err) => {
                let driver_err =
                    DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string());
                let _ = cmd.responder.send(Err(driver_err.clone()));
                Err(driver_err)
            }
        }
    }

    fn handle_response(
        resp: Response,
        inflight: &mut HashMap<CallId, oneshot::Sender<Result<Value, DriverError>>>,
    ) {
        let entry = inflight.remove(&resp.id);
        let result = Self::extract_payload(resp);

        if let Some(sender) = entry {
            let _ = sender.send(result);
        }
    }

    // Nothing subscribes to browser events; they are still useful when
    // tracing a misbehaving crawl at debug level.
    fn log_event(event: CdpEventMessage) {
        match TryInto::<CdpJsonEventMessage>::try_into(event) {
            Ok(raw) => {
                debug!(target: "cdp-page", method = %raw.method, session = ?raw.session_id, "cdp event");
            }
            Err(err) => {
                debug!(target: "cdp-page", ?err, "undecodable cdp event");
            }
        }
    }

    fn extract_payload(resp: Response) -> Result<Value, DriverError> {
        if let Some(result) = resp.result {
            Ok(result)
        } else if let Some(error) = resp.error {
            let retriable = error.code >= 500;
            Err(DriverError::new(DriverErrorKind::CdpIo)
                .with_hint(format!("cdp error {}: {}", error.code, error.message))
                .retriable(retriable))
        } else {
            Err(DriverError::new(DriverErrorKind::Internal).with_hint("empty cdp response"))
        }
    }

    fn map_cdp_error(err: CdpError) -> DriverError {
        let hint = err.to_string();
        match err {
            CdpError::Timeout => DriverError::new(DriverErrorKind::NavTimeout)
                .with_hint(hint)
                .retriable(true),
            CdpError::FrameNotFound(_)
            | CdpError::JavascriptException(_)
            | CdpError::Serde(_) => DriverError::new(DriverErrorKind::Internal).with_hint(hint),
            _ => DriverError::new(DriverErrorKind::CdpIo)
                .with_hint(hint)
                .retriable(true),
        }
    }
}

impl Drop for RuntimeState {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();

        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut child) = guard.take() {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "cdp-page", ?err, "failed to kill chromium child");
                        }
                    });
                } else {
                    debug!(target: "cdp-page", "no tokio runtime available to kill chromium child");
                }
            }
        }
    }
}
