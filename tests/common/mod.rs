//! In-memory stand-in for the job site, driven through the Page Interface.
//!
//! Pages are routed by URL (home, login, search listing, job detail, chat
//! inbox) and answer the default site selectors. Everything the automation
//! does to the site (navigations, clicks, sent messages, tab open/close) is
//! recorded in [`SiteState`] for assertions.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use boss_scout::core::SiteProfile;
use boss_scout::page::{BrowsingContext, Page};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// `"15-25K"` as the site's digit font renders it.
pub const GLYPH_SALARY: &str = "\u{E031}\u{E035}-\u{E032}\u{E035}K";

#[derive(Debug, Clone)]
pub struct FakeJob {
    pub name: String,
    pub salary: String,
    pub tags: Vec<String>,
    pub description: String,
    /// `"<name> <activity>"` as shown in the detail pane header.
    pub recruiter_line: String,
    /// `"<company> · <role>"`.
    pub company_line: String,
    pub href: String,
    pub chat_cta: String,
    pub input_tag: String,
    pub input_ready: bool,
    pub has_send: bool,
}

impl FakeJob {
    pub fn new(id: u32, name: &str, company: &str) -> Self {
        Self {
            name: name.to_string(),
            salary: GLYPH_SALARY.to_string(),
            tags: vec!["上海".into(), "3-5年".into(), "本科".into()],
            description: "负责存储引擎开发".to_string(),
            recruiter_line: "张女士 刚刚活跃".to_string(),
            company_line: format!("{} · HR", company),
            href: format!("/job_detail/job{}.html", id),
            chat_cta: "立即沟通".to_string(),
            input_tag: "div".to_string(),
            input_ready: true,
            has_send: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub job_name: String,
    pub message: String,
    /// `"fill"` for text areas, `"inner_text"` for rich-text inputs.
    pub typed_via: String,
}

/// Make navigation to `url` fail `times` times after letting `skip` through.
#[derive(Debug, Clone)]
pub struct GotoFailure {
    pub url: String,
    pub skip: usize,
    pub times: usize,
}

#[derive(Debug)]
pub struct SiteState {
    pub logged_in: bool,
    /// Injected cookies log the browser in.
    pub stored_cookies_valid: bool,
    pub cookies: Vec<Value>,
    pub headers: Vec<(String, String)>,
    pub init_scripts: Vec<String>,

    pub jobs: Vec<FakeJob>,
    /// Cards rendered per scroll of the listing.
    pub card_batch: usize,
    pub inbox: Vec<(String, String)>,
    pub inbox_batch: usize,
    /// The inbox never shows its "load more" row; only bottom scrolls grow it.
    pub inbox_load_more_hidden: bool,
    /// Every scroll on the inbox errors.
    pub inbox_scroll_fails: bool,
    /// The inbox stops growing here and never shows the end marker.
    pub inbox_growth_cap: Option<usize>,

    pub fail_goto: Option<GotoFailure>,
    /// The session drops on the first navigation whose URL contains this.
    pub logout_on_goto: Option<String>,

    /// QR scan "completes" after this many login polls; `None` never.
    pub login_after_polls: Option<usize>,
    pub login_polls: usize,
    pub probe_fails: bool,
    pub show_interstitial: bool,

    pub gotos: Vec<String>,
    pub clicks: Vec<String>,
    pub sent: Vec<SentMessage>,
    pub pages_opened: usize,
    pub pages_closed: usize,
}

impl Default for SiteState {
    fn default() -> Self {
        Self {
            logged_in: false,
            stored_cookies_valid: true,
            cookies: Vec::new(),
            headers: Vec::new(),
            init_scripts: Vec::new(),
            jobs: Vec::new(),
            card_batch: 30,
            inbox: Vec::new(),
            inbox_batch: 20,
            inbox_load_more_hidden: false,
            inbox_scroll_fails: false,
            inbox_growth_cap: None,
            fail_goto: None,
            logout_on_goto: None,
            login_after_polls: None,
            login_polls: 0,
            probe_fails: false,
            show_interstitial: false,
            gotos: Vec::new(),
            clicks: Vec::new(),
            sent: Vec::new(),
            pages_opened: 0,
            pages_closed: 0,
        }
    }
}

pub fn session_cookie(value: &str) -> Value {
    json!({
        "name": "wt2",
        "value": value,
        "domain": ".zhipin.com",
        "path": "/",
        "expires": -1.0,
        "httpOnly": true,
        "secure": true
    })
}

#[derive(Clone)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
    profile: SiteProfile,
}

impl FakeSite {
    pub fn new(state: SiteState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            profile: SiteProfile::default(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap()
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// A tab that is not counted as opened through the context.
    pub fn page(&self) -> FakePage {
        FakePage {
            site: self.clone(),
            view: Arc::new(Mutex::new(View::default())),
        }
    }

    pub fn gotos_containing(&self, needle: &str) -> usize {
        self.state()
            .gotos
            .iter()
            .filter(|u| u.contains(needle))
            .count()
    }
}

#[async_trait]
impl BrowsingContext for FakeSite {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        self.state().pages_opened += 1;
        Ok(Box::new(self.page()))
    }

    async fn cookies(&self) -> Result<Vec<Value>> {
        Ok(self.state().cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[Value]) -> Result<()> {
        if cookies.is_empty() {
            return Err(anyhow!("no cookies"));
        }
        let mut st = self.state();
        st.cookies = cookies.to_vec();
        if st.stored_cookies_valid {
            st.logged_in = true;
        }
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &[(String, String)]) -> Result<()> {
        self.state().headers = headers.to_vec();
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> Result<()> {
        self.state().init_scripts.push(script.to_string());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct View {
    url: String,
    scrolls: usize,
    detail: Option<usize>,
    chat_open: bool,
    draft: String,
    typed_via: String,
}

#[derive(Debug, Clone)]
struct El {
    text: String,
    href: Option<String>,
    tag: String,
}

impl El {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: None,
            tag: "div".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Home,
    Login,
    Search,
    Detail(usize),
    Inbox,
    Other,
}

#[derive(Clone)]
pub struct FakePage {
    site: FakeSite,
    view: Arc<Mutex<View>>,
}

impl FakePage {
    /// Simulate a redirect (e.g. to or away from the slider challenge).
    pub fn set_url(&self, url: &str) {
        self.view.lock().unwrap().url = url.to_string();
    }

    fn route(&self, url: &str, st: &SiteState) -> Route {
        let p = &self.site.profile;
        let home = p.home_url.trim_end_matches('/');
        if url.starts_with(&p.search_url) {
            return Route::Search;
        }
        if url == p.login_url() {
            return Route::Login;
        }
        if url.starts_with(&p.chat_url) {
            return Route::Inbox;
        }
        if let Some(path) = url.strip_prefix(home) {
            if let Some(i) = st.jobs.iter().position(|j| j.href == path) {
                return Route::Detail(i);
            }
            if path.is_empty() || path == "/" {
                return Route::Home;
            }
        }
        Route::Other
    }

    fn render(&self, selector: &str) -> Vec<El> {
        let st = self.site.state();
        let v = self.view.lock().unwrap();
        let s = &self.site.profile.selectors;
        let m = &self.site.profile.markers;
        let route = self.route(&v.url, &st);

        if st.show_interstitial {
            if selector == s.interstitial_heading {
                return vec![El::text("访问受限")];
            }
            if selector == s.access_denied_login {
                return vec![El::text("登录")];
            }
        }

        match route {
            Route::Home | Route::Search if selector == s.nav_figure => {
                let text = if st.logged_in { "牛人 张三" } else { "登录 | 注册" };
                vec![El::text(text)]
            }
            Route::Login if selector == s.scan_login_switch => vec![El::text("")],
            Route::Login | Route::Search if selector == s.job_list_container => {
                if st.logged_in {
                    vec![El::text("")]
                } else {
                    vec![]
                }
            }
            Route::Search => {
                let shown = st.jobs.len().min(st.card_batch * (v.scrolls + 1));
                let job = v.detail.and_then(|i| st.jobs.get(i));
                if selector == s.job_card {
                    return st.jobs[..shown].iter().map(|j| El::text(&j.name)).collect();
                }
                let Some(job) = job else {
                    return vec![];
                };
                if selector == s.detail_box {
                    vec![El::text("")]
                } else if selector == s.job_name {
                    vec![El::text(&job.name)]
                } else if selector == s.job_salary {
                    vec![El::text(&job.salary)]
                } else if selector == s.job_tags {
                    job.tags.iter().map(El::text).collect()
                } else if selector == s.job_description {
                    vec![El::text(&job.description)]
                } else if selector == s.recruiter_name {
                    vec![El::text(&job.recruiter_line)]
                } else if selector == s.recruiter_attr {
                    vec![El::text(&job.company_line)]
                } else if selector == s.more_info_link {
                    vec![El {
                        text: "查看更多信息".into(),
                        href: Some(job.href.clone()),
                        tag: "a".into(),
                    }]
                } else {
                    vec![]
                }
            }
            Route::Detail(i) => {
                let job = &st.jobs[i];
                if selector == s.chat_button && !job.chat_cta.is_empty() {
                    vec![El::text(&job.chat_cta)]
                } else if selector == s.chat_input && v.chat_open && job.input_ready {
                    vec![El {
                        text: v.draft.clone(),
                        href: None,
                        tag: job.input_tag.clone(),
                    }]
                } else if selector == s.send_button && v.chat_open && job.has_send {
                    vec![El::text("发送")]
                } else {
                    vec![]
                }
            }
            Route::Inbox => {
                let reachable = st.inbox_growth_cap.unwrap_or(usize::MAX);
                let shown = st
                    .inbox
                    .len()
                    .min(st.inbox_batch * (v.scrolls + 1))
                    .min(reachable);
                let rows = &st.inbox[..shown];
                if selector == s.inbox_row {
                    rows.iter().map(|(c, _)| El::text(c)).collect()
                } else if selector == s.inbox_company {
                    rows.iter().map(|(c, _)| El::text(c)).collect()
                } else if selector == s.inbox_last_message {
                    rows.iter().map(|(_, msg)| El::text(msg)).collect()
                } else if selector == s.inbox_finished && shown >= st.inbox.len() {
                    vec![El::text(&m.inbox_end)]
                } else if selector == s.inbox_load_more
                    && shown < st.inbox.len()
                    && !st.inbox_load_more_hidden
                {
                    vec![El::text(&m.inbox_load_more)]
                } else {
                    vec![]
                }
            }
            _ => vec![],
        }
    }

    fn fail_inbox_scroll(&self) -> Result<()> {
        let st = self.site.state();
        let v = self.view.lock().unwrap();
        if st.inbox_scroll_fails && self.route(&v.url, &st) == Route::Inbox {
            return Err(anyhow!("scroll failed: target closed"));
        }
        Ok(())
    }

    /// Scroll rounds taken since the last navigation.
    pub fn scrolls(&self) -> usize {
        self.view.lock().unwrap().scrolls
    }

    fn current_job_name(&self, st: &SiteState, v: &View) -> String {
        match self.route(&v.url, st) {
            Route::Detail(i) => st.jobs[i].name.clone(),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        {
            let mut st = self.site.state();
            st.gotos.push(url.to_string());
            if let Some(f) = st.fail_goto.as_mut().filter(|f| f.url == url) {
                if f.skip > 0 {
                    f.skip -= 1;
                } else if f.times > 0 {
                    f.times -= 1;
                    return Err(anyhow!("net::ERR_CONNECTION_RESET at {}", url));
                }
            }
            if st.logout_on_goto.as_deref().is_some_and(|n| url.contains(n)) {
                st.logout_on_goto = None;
                st.logged_in = false;
            }
        }
        let mut v = self.view.lock().unwrap();
        *v = View {
            url: url.to_string(),
            ..View::default()
        };
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.view.lock().unwrap().url.clone())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.render(selector).len())
    }

    async fn text(&self, selector: &str) -> Result<Option<String>> {
        let probe_fails = self.site.state().probe_fails;
        if probe_fails && selector == self.site.profile.selectors.nav_figure {
            return Err(anyhow!("execution context was destroyed"));
        }
        Ok(self
            .render(selector)
            .first()
            .map(|e| e.text.trim().to_string()))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>> {
        Ok(self
            .render(selector)
            .into_iter()
            .map(|e| e.text.trim().to_string())
            .collect())
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let el = self.render(selector).into_iter().next();
        Ok(match (el, name) {
            (Some(e), "href") => e.href,
            _ => None,
        })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let is_login_poll = {
            let st = self.site.state();
            let v = self.view.lock().unwrap();
            self.route(&v.url, &st) == Route::Login
                && selector == self.site.profile.selectors.job_list_container
        };
        if is_login_poll {
            let mut st = self.site.state();
            st.login_polls += 1;
            if st.login_after_polls.is_some_and(|n| st.login_polls >= n) && !st.logged_in {
                st.logged_in = true;
                st.cookies = vec![session_cookie("fresh-token")];
            }
        }
        Ok(!self.render(selector).is_empty())
    }

    async fn tag_name(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.render(selector).first().map(|e| e.tag.clone()))
    }

    async fn click(&self, selector: &str, index: usize) -> Result<()> {
        let els = self.render(selector);
        if index >= els.len() {
            return Err(anyhow!("no element #{} for {}", index, selector));
        }
        let s = &self.site.profile.selectors;
        let mut st = self.site.state();
        st.clicks.push(selector.to_string());
        let mut v = self.view.lock().unwrap();
        if selector == s.job_card {
            v.detail = Some(index);
        } else if selector == s.chat_button {
            v.chat_open = true;
        } else if selector == s.send_button {
            let job_name = self.current_job_name(&st, &v);
            st.sent.push(SentMessage {
                job_name,
                message: v.draft.clone(),
                typed_via: v.typed_via.clone(),
            });
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        if self.render(selector).is_empty() {
            return Err(anyhow!("nothing to fill for {}", selector));
        }
        let mut v = self.view.lock().unwrap();
        v.draft = value.to_string();
        v.typed_via = "fill".to_string();
        Ok(())
    }

    async fn set_inner_text(&self, selector: &str, value: &str) -> Result<()> {
        if self.render(selector).is_empty() {
            return Err(anyhow!("nothing to write into for {}", selector));
        }
        let mut v = self.view.lock().unwrap();
        v.draft = value.to_string();
        v.typed_via = "inner_text".to_string();
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.fail_inbox_scroll()?;
        self.view.lock().unwrap().scrolls += 1;
        Ok(())
    }

    async fn scroll_to_top(&self) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_text(&self, selector: &str, needle: &str) -> Result<bool> {
        self.fail_inbox_scroll()?;
        let found = self.render(selector).iter().any(|e| e.text.contains(needle));
        if found {
            self.view.lock().unwrap().scrolls += 1;
        }
        Ok(found)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if !self.render(selector).is_empty() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(anyhow!("timed out waiting for {}", selector));
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    async fn close(&self) -> Result<()> {
        self.site.state().pages_closed += 1;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat-completions endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Serve `content` as the first choice of every chat-completions request.
///
/// Returns the base URL (`http://127.0.0.1:<port>/v1`) and the JSON bodies
/// received so far.
pub async fn spawn_completion_server(content: &str) -> (String, Arc<Mutex<Vec<Value>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let body = json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
    .to_string();

    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let body = body.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                if let Some(req) = read_request_body(&mut sock).await {
                    seen.lock().unwrap().push(req);
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            });
        }
    });

    (format!("http://{}/v1", addr), requests)
}

async fn read_request_body(sock: &mut TcpStream) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let len = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + len {
        let n = sock.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (header_end + len).min(buf.len());
    serde_json::from_slice(&buf[header_end..end]).ok()
}
