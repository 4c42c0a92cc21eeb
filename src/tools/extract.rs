//! Job extractor and filter.
//!
//! A card is opened in a secondary view (the primary page keeps the loaded
//! listing), its detail pane read into a [`JobRecord`], and the record run
//! through the denylist filters in a fixed order, stopping at the first hit.

use thiserror::Error;
use tracing::{info, warn};

use crate::core::config::ScoutConfig;
use crate::core::types::{JobRecord, SkipReason};
use crate::core::{SiteProfile, Timings};
use crate::features::denylist::{DenyCategory, DenylistStore};
use crate::features::glyph::decode_salary;
use crate::scraping::page::Page;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("card #{index} is gone ({available} cards rendered)")]
    CardVanished { index: usize, available: usize },

    #[error("detail pane did not appear within {0}ms")]
    DetailTimeout(u128),

    #[error("browser automation failed: {0}")]
    Browser(String),
}

impl ExtractError {
    fn browser(e: anyhow::Error) -> Self {
        ExtractError::Browser(format!("{:#}", e))
    }
}

/// `"张女士 刚刚活跃"` → `("张女士", "刚刚活跃")`.
pub fn split_recruiter_name(raw: &str) -> (String, String) {
    let mut parts = raw.split_whitespace();
    let name = parts.next().unwrap_or_default().to_string();
    let active = parts.collect::<Vec<_>>().join(" ");
    (name, active)
}

/// `"某某科技 · HRBP"` → `("某某科技", "HRBP")`.
pub fn split_recruiter_title(raw: &str) -> (String, String) {
    let mut parts = raw.trim().split(" · ");
    let company = parts.next().unwrap_or_default().to_string();
    let title = parts.next().unwrap_or_default().to_string();
    (company, title)
}

/// Load the primary page's listing into `view` and open card `index`.
pub async fn open_card_detail(
    view: &dyn Page,
    listing_url: &str,
    index: usize,
    site: &SiteProfile,
    timings: &Timings,
) -> Result<(), ExtractError> {
    let sel = &site.selectors;
    view.goto(listing_url).await.map_err(ExtractError::browser)?;
    tokio::time::sleep(timings.settle).await;

    let available = view.count(&sel.job_card).await.map_err(ExtractError::browser)?;
    if index >= available {
        return Err(ExtractError::CardVanished { index, available });
    }
    view.click(&sel.job_card, index)
        .await
        .map_err(ExtractError::browser)?;
    tokio::time::sleep(timings.settle).await;

    view.wait_for_selector(&sel.detail_box, timings.detail_timeout)
        .await
        .map_err(|_| ExtractError::DetailTimeout(timings.detail_timeout.as_millis()))
}

async fn text_or_empty(view: &dyn Page, selector: &str) -> String {
    match view.text(selector).await {
        Ok(t) => t.unwrap_or_default(),
        Err(e) => {
            warn!("extract: failed to read {}: {:#}", selector, e);
            String::new()
        }
    }
}

/// Read the open detail pane. Missing fields come back empty.
pub async fn read_job(view: &dyn Page, site: &SiteProfile) -> JobRecord {
    let sel = &site.selectors;
    let job_name = text_or_empty(view, &sel.job_name).await;
    let salary = decode_salary(&text_or_empty(view, &sel.job_salary).await);
    let tags = view
        .texts(&sel.job_tags)
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();
    let description = text_or_empty(view, &sel.job_description).await;
    let (recruiter, recruiter_active) =
        split_recruiter_name(&text_or_empty(view, &sel.recruiter_name).await);
    let (company_name, recruiter_title) =
        split_recruiter_title(&text_or_empty(view, &sel.recruiter_attr).await);

    JobRecord {
        job_name,
        salary,
        tags,
        description,
        recruiter,
        recruiter_active,
        company_name,
        recruiter_title,
    }
}

/// The per-card filter policy.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub filter_dead_recruiters: bool,
    pub dead_status: Vec<String>,
}

impl JobFilter {
    pub fn from_config(cfg: &ScoutConfig) -> Self {
        Self {
            filter_dead_recruiters: cfg.filter_dead_hr,
            dead_status: cfg.dead_status.clone(),
        }
    }

    /// First filter that rejects `job`, in the order: job title, recruiter
    /// activity, company, recruiter role.
    pub fn check(&self, job: &JobRecord, denylist: &DenylistStore) -> Option<SkipReason> {
        if denylist.matches(DenyCategory::Job, &job.job_name) {
            return Some(SkipReason::BlockedJob);
        }
        if self.filter_dead_recruiters
            && self
                .dead_status
                .iter()
                .any(|s| !s.is_empty() && job.recruiter_active.contains(s.as_str()))
        {
            return Some(SkipReason::DeadRecruiter);
        }
        if denylist.matches(DenyCategory::Company, &job.company_name) {
            return Some(SkipReason::BlockedCompany);
        }
        if denylist.matches(DenyCategory::Recruiter, &job.recruiter_title) {
            return Some(SkipReason::BlockedRecruiter);
        }
        None
    }

    /// [`Self::check`] plus a log line naming the rejecting filter.
    pub fn screen(&self, job: &JobRecord, denylist: &DenylistStore) -> Option<SkipReason> {
        let reason = self.check(job, denylist)?;
        info!(
            "extract: skip {} @ {} ({:?})",
            job.job_name, job.company_name, reason
        );
        Some(reason)
    }
}
