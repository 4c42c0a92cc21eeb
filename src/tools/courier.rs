//! The courier — one full run over every search target.
//!
//! Login first, then for each `(city, keyword)` target: re-check the session,
//! load the listing, and walk its cards one by one (extract → filter →
//! submit → pace). After the last target the inbox is mined for new
//! denylisted companies and the denylist is written back to disk.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::ScoutConfig;
use crate::core::types::{RunReport, SearchTarget, SkipReason, SubmittedJob, TargetReport};
use crate::core::Timings;
use crate::features::antibot::Pacer;
use crate::features::completion::CompletionClient;
use crate::features::denylist::{DenyCategory, DenylistStore};
use crate::features::session::{ChallengeGate, SessionError, SessionManager};
use crate::features::session_store::CredentialStore;
use crate::scraping::page::{BrowsingContext, Page};
use crate::tools::extract::{self, JobFilter};
use crate::tools::learner;
use crate::tools::listing::scan_listing;
use crate::tools::search_url::search_url;
use crate::tools::submit::Submitter;

/// What happened to one card.
#[derive(Debug)]
enum CardOutcome {
    Skipped(SkipReason),
    Sent(Box<SubmittedJob>),
    SubmitFailed,
}

impl CardOutcome {
    fn reached_submission(&self) -> bool {
        !matches!(self, CardOutcome::Skipped(_))
    }
}

pub struct Courier {
    ctx: Arc<dyn BrowsingContext>,
    cfg: ScoutConfig,
    session: SessionManager,
    completion: CompletionClient,
    denylist: DenylistStore,
    filter: JobFilter,
    pacer: Pacer,
    timings: Timings,
    learn: bool,
}

impl Courier {
    /// Loads the denylist from the data directory and prepares every
    /// collaborator. Fails only on invalid configuration.
    pub fn new(
        ctx: Arc<dyn BrowsingContext>,
        cfg: ScoutConfig,
        gate: ChallengeGate,
        timings: Timings,
    ) -> Result<Self> {
        let pacer = Pacer::new(cfg.wait_range()?).with_unit(timings.pacing_unit);
        let completion = CompletionClient::new(&cfg.api, cfg.ai_settings().cloned())?;
        let denylist = DenylistStore::load(cfg.denylist_path());
        let session = SessionManager::new(
            ctx.clone(),
            cfg.site.clone(),
            CredentialStore::new(cfg.cookie_path()),
            gate,
            timings,
        );
        Ok(Self {
            filter: JobFilter::from_config(&cfg),
            ctx,
            cfg,
            session,
            completion,
            denylist,
            pacer,
            timings,
            learn: true,
        })
    }

    /// Skip the inbox pass at the end of the run.
    pub fn skip_learning(mut self, skip: bool) -> Self {
        self.learn = !skip;
        self
    }

    pub fn denylist(&self) -> &DenylistStore {
        &self.denylist
    }

    /// Run every target. The denylist is saved even when the run fails.
    ///
    /// Only a login timeout aborts the run; any other failure is recorded on
    /// the target it happened in.
    pub async fn run(&mut self) -> Result<RunReport> {
        let mut report = RunReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let page = self
            .ctx
            .new_page()
            .await
            .context("failed to open the primary tab")?;
        let outcome = self.run_on(page.as_ref(), &mut report).await;
        if let Err(e) = page.close().await {
            warn!("courier: failed to close the primary tab: {:#}", e);
        }

        if let Err(e) = self.denylist.save() {
            warn!("courier: failed to save denylist: {:#}", e);
        }
        outcome?;

        report.finished_at = Some(Utc::now());
        report.blocked_companies = self.denylist.len(DenyCategory::Company);
        report.blocked_recruiters = self.denylist.len(DenyCategory::Recruiter);
        report.blocked_jobs = self.denylist.len(DenyCategory::Job);
        info!("courier: run finished | {}", report.summarize_for_logs());
        Ok(report)
    }

    async fn run_on(&mut self, page: &dyn Page, report: &mut RunReport) -> Result<()> {
        self.session.login(page).await?;

        for target in self.cfg.search_targets() {
            let url = search_url(&self.cfg, &target.city_code, &target.keyword);
            let mut target_report = TargetReport {
                city_code: target.city_code.clone(),
                keyword: target.keyword.clone(),
                search_url: url.clone(),
                ..Default::default()
            };
            info!(
                "courier: target city={} keyword={} url={}",
                target.city_code, target.keyword, url
            );

            match self.session.ensure_login(page).await {
                Ok(()) => {}
                Err(e @ SessionError::LoginTimeout(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(
                        "courier: target {}/{} skipped, re-login failed: {}",
                        target.city_code, target.keyword, e
                    );
                    target_report.error = Some(e.to_string());
                    report.targets.push(target_report);
                    continue;
                }
            }

            if let Err(e) = self
                .process_target(page, &target, &url, &mut target_report, &mut report.submitted)
                .await
            {
                warn!(
                    "courier: target {}/{} aborted: {:#}",
                    target.city_code, target.keyword, e
                );
                target_report.error = Some(format!("{:#}", e));
            }
            info!(
                "courier: 【{}】 done, sent={} skipped={}",
                target.keyword,
                target_report.sent,
                target_report.total_skipped()
            );
            report.targets.push(target_report);
        }

        if self.learn {
            report.learned_companies =
                learner::learn(page, &mut self.denylist, &self.cfg.site, &self.timings).await;
        }
        Ok(())
    }

    async fn process_target(
        &self,
        page: &dyn Page,
        target: &SearchTarget,
        url: &str,
        target_report: &mut TargetReport,
        submitted: &mut Vec<SubmittedJob>,
    ) -> Result<()> {
        let site = &self.cfg.site;
        let count = scan_listing(page, url, site, &self.timings).await?;
        target_report.cards_loaded = count;

        let submitter = Submitter::new(
            self.ctx.as_ref(),
            site,
            &self.timings,
            &self.completion,
            self.cfg.default_greeting(),
        );

        for index in 0..count {
            let available = match page.count(&site.selectors.job_card).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("courier: card #{} lookup failed: {:#}", index, e);
                    continue;
                }
            };
            if index >= available {
                continue;
            }
            let listing_url = page
                .current_url()
                .await
                .unwrap_or_else(|_| url.to_string());

            let view = match self.ctx.new_page().await {
                Ok(v) => v,
                Err(e) => {
                    warn!("courier: card #{}: failed to open a view: {:#}", index, e);
                    target_report.record_skip(SkipReason::DetailUnavailable);
                    continue;
                }
            };
            let outcome = self
                .process_card(view.as_ref(), &listing_url, index, target, &submitter)
                .await;
            if let Err(e) = view.close().await {
                warn!("courier: card #{}: failed to close view: {:#}", index, e);
            }

            let paced = outcome.reached_submission();
            match outcome {
                CardOutcome::Skipped(reason) => target_report.record_skip(reason),
                CardOutcome::SubmitFailed => {
                    target_report.record_skip(SkipReason::SubmissionFailed)
                }
                CardOutcome::Sent(job) => {
                    target_report.sent += 1;
                    submitted.push(*job);
                }
            }
            if paced {
                self.pacer.pause().await;
            }
        }
        Ok(())
    }

    async fn process_card(
        &self,
        view: &dyn Page,
        listing_url: &str,
        index: usize,
        target: &SearchTarget,
        submitter: &Submitter<'_>,
    ) -> CardOutcome {
        let site = &self.cfg.site;
        if let Err(e) =
            extract::open_card_detail(view, listing_url, index, site, &self.timings).await
        {
            warn!("courier: card #{} skipped: {}", index, e);
            return CardOutcome::Skipped(SkipReason::DetailUnavailable);
        }

        let job = extract::read_job(view, site).await;
        if let Some(reason) = self.filter.screen(&job, &self.denylist) {
            return CardOutcome::Skipped(reason);
        }

        match submitter.submit(view, &target.keyword, &job).await {
            Ok(submission) => CardOutcome::Sent(Box::new(SubmittedJob {
                job,
                city_code: target.city_code.clone(),
                keyword: target.keyword.clone(),
                greeting: submission.greeting,
                ai_greeting: submission.ai_greeting,
                submitted_at: Utc::now(),
            })),
            Err(e) => {
                warn!("courier: {} not submitted: {}", job.job_name, e);
                CardOutcome::SubmitFailed
            }
        }
    }
}
