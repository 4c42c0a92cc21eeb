//! Chromium DevTools implementation of the Page Interface.
//!
//! Element queries run as small injected scripts (selectors are embedded as
//! JSON string literals) so a re-rendered DOM never leaves us holding a stale
//! node id. Clicks go through CDP input events on a freshly resolved element.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Browser;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::page::{BrowsingContext, Page};

/// Poll spacing of [`Page::wait_for_selector`].
const SELECTOR_POLL: Duration = Duration::from_millis(200);

fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub struct CdpPage {
    page: chromiumoxide::Page,
}

impl CdpPage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self { page }
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let value = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("script evaluation failed: {}", e))?;
        value
            .into_value::<T>()
            .map_err(|e| anyhow!("unexpected script result: {}", e))
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| anyhow!("failed to navigate to {}: {}", url, e))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| anyhow!("failed to read page url: {}", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js_str(selector)
        ))
        .await
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let text: Option<String> = self
            .eval(format!(
                "(() => {{ const el = document.querySelector({}); return el ? (el.innerText || '') : null; }})()",
                js_str(selector)
            ))
            .await?;
        Ok(text.map(|t| t.trim().to_string()))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>> {
        let texts: Vec<String> = self
            .eval(format!(
                "Array.from(document.querySelectorAll({})).map(el => el.innerText || '')",
                js_str(selector)
            ))
            .await?;
        Ok(texts.into_iter().map(|t| t.trim().to_string()).collect())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            js_str(selector),
            js_str(name)
        ))
        .await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.eval(format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === 'none' || style.visibility === 'hidden') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()"#,
            js_str(selector)
        ))
        .await
    }

    async fn tag_name(&self, selector: &str) -> Result<Option<String>> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.tagName.toLowerCase() : null; }})()",
            js_str(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| anyhow!("failed to query {}: {}", selector, e))?;
        let element = elements
            .get(index)
            .ok_or_else(|| anyhow!("no element #{} for {}", index, selector))?;
        element
            .click()
            .await
            .map_err(|e| anyhow!("failed to click {} #{}: {}", selector, index, e))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        // Native value setter so framework-bound inputs observe the change.
        let ok: bool = self
            .eval(format!(
                r#"(() => {{
                    const el = document.querySelector({});
                    if (!el) return false;
                    el.focus();
                    const proto = Object.getPrototypeOf(el);
                    const setter = Object.getOwnPropertyDescriptor(proto, 'value');
                    if (setter && setter.set) {{ setter.set.call(el, {}); }} else {{ el.value = {}; }}
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }})()"#,
                js_str(selector),
                js_str(value),
                js_str(value)
            ))
            .await?;
        if ok {
            Ok(())
        } else {
            Err(anyhow!("no element to fill for {}", selector))
        }
    }

    async fn set_inner_text(&self, selector: &str, value: &str) -> Result<()> {
        let ok: bool = self
            .eval(format!(
                r#"(() => {{
                    const el = document.querySelector({});
                    if (!el) return false;
                    el.focus();
                    el.innerText = {};
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    return true;
                }})()"#,
                js_str(selector),
                js_str(value)
            ))
            .await?;
        if ok {
            Ok(())
        } else {
            Err(anyhow!("no element to write into for {}", selector))
        }
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
            .map_err(|e| anyhow!("scroll failed: {}", e))?;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, 0);")
            .await
            .map_err(|e| anyhow!("scroll failed: {}", e))?;
        Ok(())
    }

    async fn scroll_to_text(&self, selector: &str, needle: &str) -> Result<bool> {
        // Wrappers also contain the needle in their innerText, so prefer the
        // element holding it in its own text nodes, then the last (deepest)
        // rendered-text match.
        self.eval(format!(
            r#"(() => {{
                const needle = {};
                const els = Array.from(document.querySelectorAll({}));
                const ownText = e => Array.from(e.childNodes)
                    .filter(n => n.nodeType === Node.TEXT_NODE)
                    .map(n => n.textContent)
                    .join('');
                const el = els.find(e => ownText(e).includes(needle))
                    || els.filter(e => (e.innerText || '').includes(needle)).pop();
                if (!el) return false;
                el.scrollIntoView({{ block: 'center' }});
                return true;
            }})()"#,
            js_str(needle),
            js_str(selector)
        ))
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if self.count(selector).await.unwrap_or(0) > 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(anyhow!(
                    "timed out after {}ms waiting for {}",
                    timeout.as_millis(),
                    selector
                ));
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| anyhow!("failed to close tab: {}", e))
    }
}

/// One launched browser plus the context-wide settings applied to each tab.
pub struct CdpContext {
    browser: Mutex<Browser>,
    handler_task: tokio::task::JoinHandle<()>,
    extra_headers: Mutex<Vec<(String, String)>>,
    init_scripts: Mutex<Vec<String>>,
}

impl CdpContext {
    pub fn new(browser: Browser, handler_task: tokio::task::JoinHandle<()>) -> Self {
        Self {
            browser: Mutex::new(browser),
            handler_task,
            extra_headers: Mutex::new(Vec::new()),
            init_scripts: Mutex::new(Vec::new()),
        }
    }

    async fn apply_headers(page: &chromiumoxide::Page, headers: &[(String, String)]) -> Result<()> {
        if headers.is_empty() {
            return Ok(());
        }
        let map: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::Value::Object(map),
        )))
        .await
        .map_err(|e| anyhow!("failed to set extra headers: {}", e))?;
        Ok(())
    }

    async fn apply_script(page: &chromiumoxide::Page, script: &str) -> Result<()> {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
            .await
            .map_err(|e| anyhow!("failed to inject init script: {}", e))?;
        Ok(())
    }

    async fn open_tabs(&self) -> Vec<chromiumoxide::Page> {
        let browser = self.browser.lock().await;
        browser.pages().await.unwrap_or_default()
    }

    /// Close the browser and stop the CDP handler.
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("browser close error (non-fatal): {}", e);
        }
        self.handler_task.abort();
        info!("🛑 browser closed");
    }
}

#[async_trait]
impl BrowsingContext for CdpContext {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| anyhow!("failed to open tab: {}", e))?
        };

        let headers = self.extra_headers.lock().await.clone();
        Self::apply_headers(&page, &headers).await?;
        let scripts = self.init_scripts.lock().await.clone();
        for script in &scripts {
            Self::apply_script(&page, script).await?;
        }
        Ok(Box::new(CdpPage::new(page)))
    }

    async fn cookies(&self) -> Result<Vec<serde_json::Value>> {
        let browser = self.browser.lock().await;
        let cookies = browser
            .get_cookies()
            .await
            .map_err(|e| anyhow!("failed to read cookies: {}", e))?;
        cookies
            .into_iter()
            .map(|c| serde_json::to_value(c).context("cookie serialization failed"))
            .collect()
    }

    async fn set_cookies(&self, cookies: &[serde_json::Value]) -> Result<()> {
        let params: Vec<CookieParam> = cookies
            .iter()
            .filter_map(|v| serde_json::from_value::<CookieParam>(v.clone()).ok())
            .collect();
        if params.is_empty() {
            return Err(anyhow!("no valid cookie records to inject"));
        }
        if params.len() < cookies.len() {
            warn!(
                "cdp: skipped {} malformed cookie records",
                cookies.len() - params.len()
            );
        }
        let browser = self.browser.lock().await;
        browser
            .set_cookies(params)
            .await
            .map_err(|e| anyhow!("failed to set cookies: {}", e))?;
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &[(String, String)]) -> Result<()> {
        *self.extra_headers.lock().await = headers.to_vec();
        for page in self.open_tabs().await {
            Self::apply_headers(&page, headers).await?;
        }
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> Result<()> {
        self.init_scripts.lock().await.push(script.to_string());
        for page in self.open_tabs().await {
            Self::apply_script(&page, script).await?;
        }
        Ok(())
    }
}
