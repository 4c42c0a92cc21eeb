//! Site profile — every URL, CSS selector and UI marker string the automation
//! touches.
//!
//! The defaults target the current `www.zhipin.com` web client. The site ships
//! UI changes without notice, so everything here can be overridden from the
//! `site` key of `boss-scout.json` (any omitted field keeps its default).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteProfile {
    pub home_url: String,
    /// Search page base, query string appended by [`crate::tools::search_url`].
    pub search_url: String,
    /// Path of the login entry point, relative to `home_url`.
    pub login_path: String,
    pub chat_url: String,
    /// Prefix of the slider-challenge page the site redirects to when suspicious.
    pub slider_url: String,
    /// Every genuine "more info" href starts with this path.
    pub job_detail_prefix: String,
    pub selectors: Selectors,
    pub markers: Markers,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            home_url: "https://www.zhipin.com".to_string(),
            search_url: "https://www.zhipin.com/web/geek/job?".to_string(),
            login_path: "/web/user/?ka=header-login".to_string(),
            chat_url: "https://www.zhipin.com/web/geek/chat".to_string(),
            slider_url: "https://www.zhipin.com/web/user/safe/verify-slider".to_string(),
            job_detail_prefix: "/job_detail/".to_string(),
            selectors: Selectors::default(),
            markers: Markers::default(),
        }
    }
}

impl SiteProfile {
    pub fn login_url(&self) -> String {
        format!("{}{}", self.home_url.trim_end_matches('/'), self.login_path)
    }
}

/// CSS selectors, grouped by the view they live in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Selectors {
    // Navigation / login
    pub nav_figure: String,
    pub interstitial_heading: String,
    pub access_denied_login: String,
    pub scan_login_switch: String,
    pub job_list_container: String,

    // Search results
    pub job_card: String,
    pub detail_box: String,
    pub job_name: String,
    pub job_salary: String,
    pub job_tags: String,
    pub job_description: String,
    pub recruiter_name: String,
    pub recruiter_attr: String,
    pub more_info_link: String,

    // Job detail / chat
    pub chat_button: String,
    pub chat_input: String,
    pub send_button: String,

    // Inbox
    pub inbox_finished: String,
    pub inbox_row: String,
    pub inbox_company: String,
    pub inbox_last_message: String,
    pub inbox_load_more: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            nav_figure: "li.nav-figure".to_string(),
            interstitial_heading: "h1".to_string(),
            access_denied_login: "a[ka='403_login']".to_string(),
            scan_login_switch: "div.btn-sign-switch.ewm-switch".to_string(),
            job_list_container: "div.job-list-container".to_string(),

            job_card: "ul.rec-job-list li.job-card-box".to_string(),
            detail_box: "div[class*='job-detail-box']".to_string(),
            job_name: "span[class*='job-name']".to_string(),
            job_salary: "span.job-salary".to_string(),
            job_tags: "ul[class*='tag-list'] > li".to_string(),
            job_description: "p.desc".to_string(),
            recruiter_name: "h2[class*='name']".to_string(),
            recruiter_attr: "div[class*='boss-info-attr']".to_string(),
            more_info_link: "a.more-job-btn".to_string(),

            chat_button: "a.btn-startchat, a.op-btn-chat".to_string(),
            chat_input: "div#chat-input.chat-input[contenteditable='true'], textarea.input-area"
                .to_string(),
            send_button: "div.send-message, button[type='send'].btn-send, button.btn-send"
                .to_string(),

            inbox_finished: "div.finished".to_string(),
            inbox_row: "li[role='listitem']".to_string(),
            inbox_company: "div.title-box > span.name-box span:nth-of-type(2)".to_string(),
            inbox_last_message: "div.gray.last-msg > span.last-msg-text".to_string(),
            inbox_load_more: "div".to_string(),
        }
    }
}

/// Visible-text markers matched against element text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Markers {
    /// Shown in the nav figure while logged out.
    pub not_logged_in: String,
    /// Call-to-action on the start-chat button.
    pub start_chat: String,
    /// Exact text of the inbox end-of-list footer.
    pub inbox_end: String,
    /// Text of the inbox "load more" affordance.
    pub inbox_load_more: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            not_logged_in: "登录".to_string(),
            start_chat: "立即沟通".to_string(),
            inbox_end: "没有更多了".to_string(),
            inbox_load_more: "滚动加载更多".to_string(),
        }
    }
}
