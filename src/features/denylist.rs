//! Denylist store — blocked companies, recruiter roles and job titles.
//!
//! Persisted as `data.json` in the data directory:
//!
//! ```json
//! { "blackCompanies": [], "blackRecruiters": [], "blackJobs": [] }
//! ```
//!
//! Matching is substring containment: an entry blocks every candidate text
//! that contains it, so `"外包"` blocks `"某某外包服务有限公司"`.
//!
//! A missing or unparsable document never fails the run; the store simply
//! starts empty. Writes are atomic (write-to-temp then rename) so a crash
//! mid-save cannot leave a truncated file behind.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyCategory {
    Company,
    Recruiter,
    Job,
}

impl DenyCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DenyCategory::Company => "company",
            DenyCategory::Recruiter => "recruiter",
            DenyCategory::Job => "job",
        }
    }
}

/// On-disk shape.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DenylistDocument {
    #[serde(default)]
    black_companies: Vec<String>,
    #[serde(default)]
    black_recruiters: Vec<String>,
    #[serde(default)]
    black_jobs: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct DenylistStore {
    path: Option<PathBuf>,
    companies: BTreeSet<String>,
    recruiters: BTreeSet<String>,
    jobs: BTreeSet<String>,
}

/// Entries are stored trimmed; blank entries would match every candidate.
fn normalize_entry(entry: &str) -> Option<String> {
    let trimmed = entry.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn collect_entries(raw: Vec<String>) -> BTreeSet<String> {
    raw.iter().filter_map(|e| normalize_entry(e)).collect()
}

impl DenylistStore {
    /// A store with no backing file; `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn from_entries<I, S>(companies: I, recruiters: I, jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::default();
        for c in companies {
            store.insert(DenyCategory::Company, c.as_ref());
        }
        for r in recruiters {
            store.insert(DenyCategory::Recruiter, r.as_ref());
        }
        for j in jobs {
            store.insert(DenyCategory::Job, j.as_ref());
        }
        store
    }

    /// Load the document at `path`.
    ///
    /// * Missing file → an initial empty document is written, store starts empty.
    /// * Unreadable / unparsable file → warning, store starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self {
            path: Some(path.clone()),
            ..Self::default()
        };

        if !path.exists() {
            info!(
                "denylist: {} not found — creating an empty document",
                path.display()
            );
            if let Err(e) = store.save() {
                warn!("denylist: could not create {}: {:#}", path.display(), e);
            }
            return store;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                warn!("denylist: failed to read {}: {}", path.display(), e);
                return store;
            }
        };

        match serde_json::from_str::<DenylistDocument>(&content) {
            Ok(doc) => {
                store.companies = collect_entries(doc.black_companies);
                store.recruiters = collect_entries(doc.black_recruiters);
                store.jobs = collect_entries(doc.black_jobs);
                info!(
                    "denylist: loaded {} companies, {} recruiters, {} jobs from {}",
                    store.companies.len(),
                    store.recruiters.len(),
                    store.jobs.len(),
                    path.display()
                );
            }
            Err(e) => {
                warn!(
                    "denylist: failed to parse {}: {} — starting with empty lists",
                    path.display(),
                    e
                );
            }
        }
        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn set(&self, category: DenyCategory) -> &BTreeSet<String> {
        match category {
            DenyCategory::Company => &self.companies,
            DenyCategory::Recruiter => &self.recruiters,
            DenyCategory::Job => &self.jobs,
        }
    }

    fn set_mut(&mut self, category: DenyCategory) -> &mut BTreeSet<String> {
        match category {
            DenyCategory::Company => &mut self.companies,
            DenyCategory::Recruiter => &mut self.recruiters,
            DenyCategory::Job => &mut self.jobs,
        }
    }

    /// `true` iff some entry of `category` is a substring of `candidate`.
    pub fn matches(&self, category: DenyCategory, candidate: &str) -> bool {
        self.matching_entry(category, candidate).is_some()
    }

    /// The first entry of `category` contained in `candidate`, for logging.
    pub fn matching_entry(&self, category: DenyCategory, candidate: &str) -> Option<&str> {
        self.set(category)
            .iter()
            .find(|entry| candidate.contains(entry.as_str()))
            .map(String::as_str)
    }

    /// Add an entry. Returns `false` for duplicates and blank entries.
    pub fn insert(&mut self, category: DenyCategory, entry: &str) -> bool {
        match normalize_entry(entry) {
            Some(e) => self.set_mut(category).insert(e),
            None => false,
        }
    }

    pub fn contains(&self, category: DenyCategory, entry: &str) -> bool {
        self.set(category).contains(entry.trim())
    }

    pub fn len(&self, category: DenyCategory) -> usize {
        self.set(category).len()
    }

    pub fn entries(&self, category: DenyCategory) -> impl Iterator<Item = &str> {
        self.set(category).iter().map(String::as_str)
    }

    /// Persist the three lists. No-op for in-memory stores.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let doc = DenylistDocument {
            black_companies: self.companies.iter().cloned().collect(),
            black_recruiters: self.recruiters.iter().cloned().collect(),
            black_jobs: self.jobs.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&doc).context("denylist serialization failed")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to rename {} → {}", tmp.display(), path.display()))?;

        info!(
            "denylist: saved {} companies, {} recruiters, {} jobs to {}",
            self.companies.len(),
            self.recruiters.len(),
            self.jobs.len(),
            path.display()
        );
        Ok(())
    }
}
