//! Chromium DevTools Protocol page driver.
//!
//! This crate is the rendering-backend boundary of SectionScout: it owns the
//! browser process (or attaches to an existing one over a websocket), keeps
//! the command/response correlation loop alive, and exposes the minimal page
//! capability surface the perceiver and capture layers need: navigate,
//! evaluate, screenshot.

use std::{env, path::PathBuf};

use which::which;

pub mod commands;
pub mod driver;
pub mod metrics;
pub mod registry;
pub mod transport;
pub mod util;

pub use commands::{ScreenshotClip, ScreenshotFormat, ScreenshotOptions};
pub use config::PageConfig;
pub use driver::{CdpPageDriver, PageDriver};
pub use error::{DriverError, DriverErrorKind};
pub use ids::PageId;

pub mod ids {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// Unique identifier for a page/tab managed by the driver.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct PageId(pub Uuid);

    impl PageId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for PageId {
        fn default() -> Self {
            Self::new()
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the driver.
    #[derive(Clone, Debug, Error, Serialize, Deserialize)]
    pub enum DriverErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("script evaluation failed")]
        Evaluation,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct DriverError {
        pub kind: DriverErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for DriverError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for DriverError {}

    impl DriverError {
        pub fn new(kind: DriverErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{
        env,
        path::{Path, PathBuf},
    };

    /// Configuration for launching and tuning the page driver.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct PageConfig {
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        pub default_deadline_ms: u64,
        pub websocket_url: Option<String>,
        /// Emulated viewport applied to each attached page. Detection
        /// geometry is viewport-relative, so a fixed viewport keeps crawls
        /// reproducible across machines.
        pub viewport_width: u32,
        pub viewport_height: u32,
    }

    impl Default for PageConfig {
        fn default() -> Self {
            Self {
                executable: default_chrome_path(),
                user_data_dir: default_profile_dir(),
                headless: resolve_headless_default(),
                default_deadline_ms: 30_000,
                websocket_url: None,
                viewport_width: 1280,
                viewport_height: 720,
            }
        }
    }

    fn resolve_headless_default() -> bool {
        // SECTIONSCOUT_HEADLESS: "0", "false", "no", "off" means headful.
        match env::var("SECTIONSCOUT_HEADLESS") {
            Ok(value) => {
                let lower = value.to_ascii_lowercase();
                !matches!(lower.as_str(), "0" | "false" | "no" | "off")
            }
            Err(_) => true,
        }
    }

    fn default_chrome_path() -> PathBuf {
        detect_chrome_executable().unwrap_or_default()
    }

    fn default_profile_dir() -> PathBuf {
        if let Ok(path) = env::var("SECTIONSCOUT_CHROME_PROFILE") {
            return PathBuf::from(path);
        }

        let default = Path::new("./.sectionscout-profile");
        default.into()
    }
}

/// Locate a usable Chrome/Chromium binary.
///
/// Resolution order: `SECTIONSCOUT_CHROME` override, PATH lookup, then the
/// usual OS install locations (skippable via `SECTIONSCOUT_SKIP_OS_PATHS`).
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("SECTIONSCOUT_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var("SECTIONSCOUT_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);

    if !skip_defaults {
        for candidate in os_specific_chrome_paths() {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "freebsd"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        &["chrome"]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let mut paths = Vec::new();
        for root in windows_search_roots() {
            paths.push(root.join("Google/Chrome/Application/chrome.exe"));
            paths.push(root.join("Chromium/Application/chrome.exe"));
            paths.push(root.join("Microsoft/Edge/Application/msedge.exe"));
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "linux",
        target_os = "freebsd"
    )))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "windows")]
fn windows_search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
        if let Ok(value) = env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                roots.push(PathBuf::from(trimmed));
            }
        }
    }
    roots
}

pub(crate) fn resolve_chrome_path(cfg: &config::PageConfig) -> Option<PathBuf> {
    if !cfg.executable.as_os_str().is_empty() && cfg.executable.exists() {
        return Some(cfg.executable.clone());
    }
    detect_chrome_executable()
}

#[cfg(test)]
mod tests {
    use super::{chrome_executable_names, detect_chrome_executable};
    use std::sync::Mutex;
    use std::{env, fs};
    use tempfile::tempdir;

    // Both tests juggle the same process-wide env vars.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn detects_from_env_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let exe_path = dir.path().join("my-chrome");
        fs::write(&exe_path, b"").unwrap();
        let original = env::var("SECTIONSCOUT_CHROME").ok();
        env::set_var(
            "SECTIONSCOUT_CHROME",
            exe_path.to_string_lossy().to_string(),
        );
        let detected = detect_chrome_executable();
        if let Some(value) = original {
            env::set_var("SECTIONSCOUT_CHROME", value);
        } else {
            env::remove_var("SECTIONSCOUT_CHROME");
        }
        assert_eq!(detected, Some(exe_path));
    }

    #[test]
    fn detects_from_path_entries() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let name = chrome_executable_names()
            .get(0)
            .expect("chrome executable names must not be empty");
        let exe_path = dir.path().join(name);
        fs::write(&exe_path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o755);
            fs::set_permissions(&exe_path, perms).unwrap();
        }
        let original_path = env::var("PATH").ok();
        let original_env = env::var("SECTIONSCOUT_CHROME").ok();
        let skip_flag = env::var("SECTIONSCOUT_SKIP_OS_PATHS").ok();
        env::set_var("SECTIONSCOUT_CHROME", "");
        env::set_var("SECTIONSCOUT_SKIP_OS_PATHS", "1");
        env::set_var("PATH", dir.path());
        let detected = detect_chrome_executable();
        if let Some(value) = original_path {
            env::set_var("PATH", value);
        }
        if let Some(value) = original_env {
            env::set_var("SECTIONSCOUT_CHROME", value);
        } else {
            env::remove_var("SECTIONSCOUT_CHROME");
        }
        if let Some(value) = skip_flag {
            env::set_var("SECTIONSCOUT_SKIP_OS_PATHS", value);
        } else {
            env::remove_var("SECTIONSCOUT_SKIP_OS_PATHS");
        }
        assert_eq!(detected, Some(exe_path));
    }
}
