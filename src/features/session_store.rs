//! Session cookie persistence — the credential bundle.
//!
//! After a successful QR-code login the browser cookies are written to
//! `cookie.json` in the data directory as a raw JSON array (CDP cookie shape).
//! On the next run they are injected into the browsing context before the
//! first navigation so the login step can be skipped.
//!
//! An empty array (or a missing / unreadable file) means "no stored session".

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::scraping::page::BrowsingContext;

// ─────────────────────────────────────────────────────────────────────────────
// Expiry helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Minimum finite cookie expiry (unix seconds) of a raw cookie array.
///
/// CDP cookies carry an `expires` field that is either `-1.0` for session
/// cookies or a positive unix timestamp. Returns `None` when every cookie is
/// session-scoped.
pub fn min_cookie_expiry(raw_cookies: &[serde_json::Value]) -> Option<f64> {
    raw_cookies
        .iter()
        .filter_map(|v| v.get("expires").and_then(|e| e.as_f64()))
        .filter(|&exp| exp > 0.0)
        .reduce(f64::min)
}

/// `true` when some persistent cookie has already expired.
///
/// The site still decides whether the session is valid; this only feeds the
/// start-up log line.
pub fn has_expired_cookie(raw_cookies: &[serde_json::Value]) -> bool {
    let now = chrono::Utc::now().timestamp() as f64;
    min_cookie_expiry(raw_cookies).is_some_and(|exp| exp < now)
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored cookies, or `None` when the file is missing, unreadable, or empty.
    pub fn load_raw(&self) -> Option<Vec<serde_json::Value>> {
        if !self.path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "session_store: failed to read {}: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };
        let cookies: Vec<serde_json::Value> = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "session_store: {} is not a cookie array: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };
        if cookies.is_empty() {
            return None;
        }
        info!(
            "session_store: 🍪 loaded {} cookies ({})",
            cookies.len(),
            self.path.display()
        );
        Some(cookies)
    }

    /// `true` when the stored bundle has at least one cookie.
    pub fn has_stored_session(&self) -> bool {
        self.load_raw().is_some()
    }

    /// Write the bundle atomically (temp file + rename).
    pub fn save(&self, cookies: &[serde_json::Value]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(cookies).context("cookie serialization failed")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!("failed to rename {} → {}", tmp.display(), self.path.display())
        })?;
        info!(
            "session_store: 💾 saved {} cookies to {}",
            cookies.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load stored cookies and inject them into the context.
    ///
    /// Returns `true` when cookies were found and accepted by the browser.
    pub async fn inject_into(&self, ctx: &dyn BrowsingContext) -> bool {
        let Some(raw) = self.load_raw() else {
            return false;
        };
        if has_expired_cookie(&raw) {
            warn!("session_store: stored session contains expired cookies; the site may ask for a new login");
        }
        match ctx.set_cookies(&raw).await {
            Ok(()) => {
                info!("session_store: 💉 injected {} session cookies", raw.len());
                true
            }
            Err(e) => {
                warn!("session_store: failed to inject session cookies: {:#}", e);
                false
            }
        }
    }

    /// Read the context's current cookies and persist them.
    pub async fn capture_from(&self, ctx: &dyn BrowsingContext) -> Result<usize> {
        let cookies = ctx.cookies().await.context("failed to read browser cookies")?;
        self.save(&cookies)?;
        Ok(cookies.len())
    }
}
