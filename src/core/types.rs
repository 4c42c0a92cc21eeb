use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `(city code, keyword)` pair of the run.
///
/// Targets are produced city-major, keyword-minor by
/// [`crate::core::config::ScoutConfig::search_targets`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTarget {
    pub city_code: String,
    pub keyword: String,
}

/// Details read from one job card's detail pane.
///
/// Ephemeral: built during extraction and handed straight to filtering and
/// submission. Only jobs whose greeting was actually sent end up in a
/// [`SubmittedJob`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_name: String,
    /// Salary text after glyph decoding, e.g. `"15-25K·13薪"`.
    pub salary: String,
    /// Location / experience / degree tags, in page order.
    pub tags: Vec<String>,
    pub description: String,
    pub recruiter: String,
    /// Activity marker next to the recruiter name (`"刚刚活跃"`, `"本周活跃"`, ...).
    pub recruiter_active: String,
    pub company_name: String,
    /// The recruiter's stated role at the company (`"HR"`, `"技术总监"`, ...).
    pub recruiter_title: String,
}

impl JobRecord {
    /// Tags joined the way the site shows them in the card footer.
    pub fn job_area(&self) -> String {
        self.tags.join(", ")
    }
}

/// A job whose greeting was confirmed sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub city_code: String,
    pub keyword: String,
    pub greeting: String,
    /// `true` when the greeting came from the completion service.
    pub ai_greeting: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Why a card never reached the send button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BlockedJob,
    DeadRecruiter,
    BlockedCompany,
    BlockedRecruiter,
    DetailUnavailable,
    SubmissionFailed,
}

/// Per-target tally written into the run report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetReport {
    pub city_code: String,
    pub keyword: String,
    pub search_url: String,
    pub cards_loaded: usize,
    pub sent: usize,
    pub skipped: std::collections::BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetReport {
    pub fn record_skip(&mut self, reason: SkipReason) {
        let key = serde_json::to_value(reason)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", reason));
        *self.skipped.entry(key).or_insert(0) += 1;
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Summary of a whole courier run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub targets: Vec<TargetReport>,
    pub submitted: Vec<SubmittedJob>,
    pub learned_companies: usize,
    pub blocked_companies: usize,
    pub blocked_recruiters: usize,
    pub blocked_jobs: usize,
}

impl RunReport {
    pub fn total_sent(&self) -> usize {
        self.submitted.len()
    }

    /// One-line digest for the final log record.
    pub fn summarize_for_logs(&self) -> String {
        let skipped: usize = self.targets.iter().map(TargetReport::total_skipped).sum();
        let loaded: usize = self.targets.iter().map(|t| t.cards_loaded).sum();
        format!(
            "targets={} cards={} sent={} skipped={} learned_companies={} denylist(companies={}, recruiters={}, jobs={})",
            self.targets.len(),
            loaded,
            self.total_sent(),
            skipped,
            self.learned_companies,
            self.blocked_companies,
            self.blocked_recruiters,
            self.blocked_jobs
        )
    }
}
