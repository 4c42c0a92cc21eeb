//! Browser launch using `chromiumoxide`.
//!
//! * Finding a usable browser executable (Chrome, Chromium or Edge).
//! * Building the launch config. The window is visible by default: the QR
//!   login and the slider challenge both need a human looking at it.
//! * Spawning the CDP handler task and wrapping the browser in a
//!   [`CdpContext`].

use anyhow::{anyhow, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Browser;
use futures::StreamExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::cdp::CdpContext;
use crate::features::stealth::DESKTOP_USER_AGENT;

// ── Browser executable discovery ─────────────────────────────────────────────

/// Executable names looked up on `PATH`, most preferred first.
const PATH_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "microsoft-edge",
];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &["/usr/bin/google-chrome", "/snap/bin/chromium"];

/// Find a usable Chromium-family browser: `CHROME_EXECUTABLE`, then `PATH`,
/// then the platform's usual install locations.
pub fn find_chrome_executable() -> Option<String> {
    resolve_executable(
        std::env::var("CHROME_EXECUTABLE").ok().as_deref(),
        std::env::var_os("PATH").as_deref(),
        INSTALL_PATHS,
    )
}

fn resolve_executable(
    explicit: Option<&str>,
    path_var: Option<&OsStr>,
    install_paths: &[&str],
) -> Option<String> {
    if let Some(p) = explicit.filter(|p| Path::new(p).is_file()) {
        return Some(p.to_string());
    }
    let on_path = path_var
        .into_iter()
        .flat_map(|p| std::env::split_paths(p))
        .find_map(|dir| {
            PATH_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|full| full.is_file())
        });
    if let Some(full) = on_path {
        return Some(full.to_string_lossy().into_owned());
    }
    install_paths
        .iter()
        .find(|p| Path::new(p).is_file())
        .map(|p| p.to_string())
}

// ── Launch config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub width: u32,
    pub height: u32,
    /// Dedicated profile directory so the run never touches the user's own.
    pub user_data_dir: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            width: 1440,
            height: 900,
            user_data_dir: None,
        }
    }
}

/// Extra command-line flags passed to the browser.
///
/// `--disable-blink-features=AutomationControlled` hides the
/// `navigator.webdriver` flag at the process level; the init script of
/// [`crate::features::stealth`] covers the rest.
pub fn launch_args(opts: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-crash-reporter".to_string(),
        "--lang=zh-CN".to_string(),
        format!("--user-agent={}", DESKTOP_USER_AGENT),
    ];
    if opts.headless {
        args.push("--disable-gpu".to_string());
        args.push("--no-sandbox".to_string());
    }
    args
}

pub fn build_browser_config(exe: &str, opts: &LaunchOptions) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: opts.width,
            height: opts.height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(opts.width, opts.height);

    if !opts.headless {
        builder = builder.with_head();
    }
    if let Some(dir) = &opts.user_data_dir {
        builder = builder.user_data_dir(dir);
    }
    for arg in launch_args(opts) {
        builder = builder.arg(arg);
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

/// Launch the browser and return it as a browsing context.
pub async fn launch(opts: &LaunchOptions) -> Result<CdpContext> {
    let exe = find_chrome_executable().ok_or_else(|| {
        anyhow!("No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.")
    })?;
    let config = build_browser_config(&exe, opts)?;

    info!(
        "🚀 launching {} ({})",
        exe,
        if opts.headless { "headless" } else { "visible" }
    );
    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| anyhow!("failed to launch browser ({}): {}", exe, e))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                warn!("CDP handler error: {}", e);
            }
        }
    });

    Ok(CdpContext::new(browser, handler_task))
}
