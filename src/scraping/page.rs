//! The Page Interface — the narrow browser surface the automation needs.
//!
//! Everything is addressed by CSS selector (plus an index where several
//! elements match), so implementations never hand out element handles that
//! could go stale when the DOM re-renders. [`crate::scraping::cdp`] implements
//! these traits over Chromium DevTools; the integration tests implement them
//! over an in-memory fake site.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One browser tab.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Trimmed visible text of the first match, `None` when nothing matches.
    async fn text(&self, selector: &str) -> Result<Option<String>>;

    /// Trimmed visible text of every match, in document order.
    async fn texts(&self, selector: &str) -> Result<Vec<String>>;

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;

    /// `true` when the first match exists and is rendered.
    async fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Lower-case tag name of the first match.
    async fn tag_name(&self, selector: &str) -> Result<Option<String>>;

    /// Click the `index`-th match. Errors when there is no such element.
    async fn click(&self, selector: &str, index: usize) -> Result<()>;

    /// Set the value of a form control (text area / input).
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Replace the text content of a rich-text (`contenteditable`) container.
    async fn set_inner_text(&self, selector: &str, value: &str) -> Result<()>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    async fn scroll_to_top(&self) -> Result<()>;

    /// Scroll the innermost `selector` match carrying `needle` into view.
    ///
    /// An element whose own text contains `needle` wins over ancestors that
    /// only contain it through their children. `Ok(false)` when no element
    /// carries that text.
    async fn scroll_to_text(&self, selector: &str, needle: &str) -> Result<bool>;

    /// Wait until `selector` matches something. Errors on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// The browser profile shared by all tabs: cookies, headers, init scripts.
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    /// Open a fresh blank tab. Context-wide headers and init scripts apply to it.
    async fn new_page(&self) -> Result<Box<dyn Page>>;

    /// All cookies of the context as raw JSON objects.
    async fn cookies(&self) -> Result<Vec<serde_json::Value>>;

    /// Add cookies. Records the browser cannot represent are skipped.
    async fn set_cookies(&self, cookies: &[serde_json::Value]) -> Result<()>;

    /// Extra headers sent with every request of every tab.
    async fn set_extra_headers(&self, headers: &[(String, String)]) -> Result<()>;

    /// Script evaluated before any page script on every navigation of every tab.
    async fn add_init_script(&self, script: &str) -> Result<()>;
}
