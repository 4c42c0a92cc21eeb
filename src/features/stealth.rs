//! Browser fingerprint hardening for the browsing context.
//!
//! Two pieces, both applied once per context before any site navigation:
//! request headers that match a desktop Chrome on macOS browsing in Chinese,
//! and an init script that removes the automation markers chromedriver-style
//! launches leave on `window` / `navigator` and restores `chrome.runtime`.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::scraping::page::BrowsingContext;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Headers sent with every request of the context.
pub fn stealth_headers(referer: &str) -> Vec<(String, String)> {
    [
        (
            "sec-ch-ua",
            r#""Google Chrome";v="135", "Not-A.Brand";v="8", "Chromium";v="135""#,
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"macOS\""),
        ("accept-language", "zh-CN,zh;q=0.9,en;q=0.8"),
        ("referer", referer),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "same-origin"),
        ("sec-fetch-user", "?1"),
        ("upgrade-insecure-requests", "1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Runs before any page script on every navigation.
pub fn fingerprint_script() -> &'static str {
    r#"
(() => {
    // chromedriver leaves cdc_* globals behind
    for (const key of Object.keys(window)) {
        if (key.startsWith('cdc_adoQpoasnfa76pfcZLmcfl_')) {
            try { delete window[key]; } catch (e) {}
        }
    }

    const proto = Navigator.prototype;
    try {
        Object.defineProperty(proto, 'webdriver', { get: () => undefined, configurable: true });
    } catch (e) {}
    try {
        Object.defineProperty(proto, 'languages', { get: () => ['zh-CN', 'zh'], configurable: true });
    } catch (e) {}
    try {
        Object.defineProperty(proto, 'plugins', { get: () => [1, 2, 3], configurable: true });
    } catch (e) {}

    // headless and automation builds ship without the extension runtime
    const runtime = { runtime: {} };
    try { navigator.chrome = runtime; } catch (e) {}
    try {
        if (!window.chrome) { window.chrome = runtime; }
        else if (!window.chrome.runtime) { window.chrome.runtime = {}; }
    } catch (e) {}
})();
"#
}

/// Applies headers and init script to a context at most once.
#[derive(Debug, Default)]
pub struct Stealth {
    applied: AtomicBool,
}

impl Stealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_applied(&self) -> bool {
        self.applied.load(Ordering::SeqCst)
    }

    /// Returns `false` when the context was already hardened.
    pub async fn apply(&self, ctx: &dyn BrowsingContext, referer: &str) -> Result<bool> {
        if self.is_applied() {
            return Ok(false);
        }
        ctx.set_extra_headers(&stealth_headers(referer)).await?;
        ctx.add_init_script(fingerprint_script()).await?;
        self.applied.store(true, Ordering::SeqCst);
        info!("stealth: 🥷 headers and fingerprint script installed");
        Ok(true)
    }
}
