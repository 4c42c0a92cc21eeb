//! Denylist learner — mines the chat inbox for companies that turned the
//! user down and adds them to the company denylist.
//!
//! A last-message preview counts as a rejection when it contains one of
//! [`REJECTION_PHRASES`] and none of [`NON_REJECTION_PHRASES`] (`"不是"` as in
//! "isn't it…", `"不生"` as in "不生疏"). Company labels are only learned when
//! they still look like a name after the truncation dots are stripped.

use aho_corasick::AhoCorasick;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::core::{SiteProfile, Timings};
use crate::features::denylist::{DenyCategory, DenylistStore};
use crate::scraping::page::Page;

pub const REJECTION_PHRASES: &[&str] = &["不", "感谢", "但", "遗憾", "需要本", "对不"];

pub const NON_REJECTION_PHRASES: &[&str] = &["不是", "不生"];

fn rejection_matcher() -> &'static AhoCorasick {
    static M: OnceLock<AhoCorasick> = OnceLock::new();
    M.get_or_init(|| AhoCorasick::new(REJECTION_PHRASES).expect("valid rejection phrases"))
}

fn non_rejection_matcher() -> &'static AhoCorasick {
    static M: OnceLock<AhoCorasick> = OnceLock::new();
    M.get_or_init(|| {
        AhoCorasick::new(NON_REJECTION_PHRASES).expect("valid non-rejection phrases")
    })
}

fn company_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Two CJK ideographs or four Latin letters in a row.
    RE.get_or_init(|| {
        Regex::new(r"[\x{4e00}-\x{9fa5}]{2,}|[a-zA-Z]{4,}").expect("valid company label regex")
    })
}

pub fn is_rejection(message: &str) -> bool {
    rejection_matcher().is_match(message) && !non_rejection_matcher().is_match(message)
}

/// Strip the inbox's truncation dots; `None` when what remains is not a
/// plausible company name.
pub fn clean_company_label(raw: &str) -> Option<String> {
    let cleaned = raw.replace("...", "").replace('…', "");
    let cleaned = cleaned.trim();
    company_label_re()
        .is_match(cleaned)
        .then(|| cleaned.to_string())
}

/// Walk the whole inbox and return how many companies were added.
///
/// Navigation failures are logged and leave `denylist` untouched.
pub async fn learn(
    page: &dyn Page,
    denylist: &mut DenylistStore,
    site: &SiteProfile,
    timings: &Timings,
) -> usize {
    let sel = &site.selectors;
    if let Err(e) = page.goto(&site.chat_url).await {
        warn!("learner: failed to open the chat inbox: {:#}", e);
        return 0;
    }
    tokio::time::sleep(timings.inbox_settle).await;

    let mut learned = 0usize;
    loop {
        let finished = matches!(
            page.text(&sel.inbox_finished).await,
            Ok(Some(t)) if t == site.markers.inbox_end
        );

        let companies = page.texts(&sel.inbox_company).await.unwrap_or_default();
        let messages = page.texts(&sel.inbox_last_message).await.unwrap_or_default();
        for (company, message) in companies.iter().zip(messages.iter()) {
            if company.is_empty() || message.is_empty() || !is_rejection(message) {
                continue;
            }
            if denylist.matches(DenyCategory::Company, company) {
                continue;
            }
            info!("learner: rejection from 【{}】: 【{}】", company, message);
            if let Some(label) = clean_company_label(company) {
                if denylist.insert(DenyCategory::Company, &label) {
                    learned += 1;
                    info!("learner: 🚫 denylisted company {}", label);
                }
            }
        }

        if finished {
            break;
        }

        let rows_before = page.count(&sel.inbox_row).await.unwrap_or(0);
        let scrolled = match page
            .scroll_to_text(&sel.inbox_load_more, &site.markers.inbox_load_more)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => page.scroll_to_bottom().await,
            Err(e) => Err(e),
        };
        if let Err(e) = scrolled {
            warn!("learner: inbox scroll failed: {:#}", e);
            break;
        }
        tokio::time::sleep(timings.scroll_settle).await;

        let rows_after = page.count(&sel.inbox_row).await.unwrap_or(0);
        if rows_after <= rows_before {
            info!("learner: inbox stopped growing at {} conversations", rows_after);
            break;
        }
    }

    info!(
        "learner: learned {} companies, company denylist size={}",
        learned,
        denylist.len(DenyCategory::Company)
    );
    learned
}
