//! Submission workflow — from an open detail pane to a sent greeting.
//!
//! ```text
//! LocateDetailLink → OpenDetail → LocateChatButton (≤5 polls) → AwaitInputField (≤10 polls)
//!     → ComposeMessage → Send → Cleanup
//! ```
//!
//! The chat happens in a dedicated view opened on the job's own detail page;
//! that view is closed whatever the outcome.

use thiserror::Error;
use tracing::{info, warn};

use crate::core::types::JobRecord;
use crate::core::{SiteProfile, Timings};
use crate::features::completion::CompletionClient;
use crate::scraping::page::{BrowsingContext, Page};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitState {
    LocateDetailLink,
    OpenDetail,
    LocateChatButton,
    AwaitInputField,
    ComposeMessage,
    Send,
    Cleanup,
}

fn log_state(state: SubmitState) {
    info!("submit_state={:?}", state);
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no job detail link (href {0:?})")]
    MissingDetailLink(Option<String>),

    #[error("job detail link {0:?} does not resolve against the site")]
    InvalidDetailUrl(String),

    #[error("start-chat button not found after {0} attempts")]
    ChatButtonMissing(u32),

    #[error("chat input did not appear after {0} attempts")]
    InputFieldMissing(u32),

    #[error("send button not found")]
    SendButtonMissing,

    #[error("browser automation failed: {0}")]
    Browser(String),
}

impl SubmitError {
    fn browser(e: anyhow::Error) -> Self {
        SubmitError::Browser(format!("{:#}", e))
    }
}

/// A greeting that was typed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub greeting: String,
    /// `true` when the text came from the completion service.
    pub ai_greeting: bool,
}

pub struct Submitter<'a> {
    ctx: &'a dyn BrowsingContext,
    site: &'a SiteProfile,
    timings: &'a Timings,
    completion: &'a CompletionClient,
    default_greeting: String,
}

impl<'a> Submitter<'a> {
    pub fn new(
        ctx: &'a dyn BrowsingContext,
        site: &'a SiteProfile,
        timings: &'a Timings,
        completion: &'a CompletionClient,
        default_greeting: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            site,
            timings,
            completion,
            default_greeting: default_greeting.into(),
        }
    }

    /// Send a greeting for `job`, whose detail pane is open in `view`.
    pub async fn submit(
        &self,
        view: &dyn Page,
        keyword: &str,
        job: &JobRecord,
    ) -> Result<Submission, SubmitError> {
        tokio::time::sleep(self.timings.settle).await;

        log_state(SubmitState::LocateDetailLink);
        let href = view
            .attribute(&self.site.selectors.more_info_link, "href")
            .await
            .map_err(SubmitError::browser)?;
        let href = match href {
            Some(h) if h.starts_with(&self.site.job_detail_prefix) => h,
            other => return Err(SubmitError::MissingDetailLink(other)),
        };

        log_state(SubmitState::OpenDetail);
        let detail_url = url::Url::parse(&self.site.home_url)
            .and_then(|base| base.join(&href))
            .map_err(|_| SubmitError::InvalidDetailUrl(href.clone()))?;
        let chat = self.ctx.new_page().await.map_err(SubmitError::browser)?;

        let outcome = self
            .converse(chat.as_ref(), detail_url.as_str(), keyword, job)
            .await;

        log_state(SubmitState::Cleanup);
        if let Err(e) = chat.close().await {
            warn!("submit: failed to close chat view: {:#}", e);
        }
        tokio::time::sleep(self.timings.settle).await;
        outcome
    }

    async fn converse(
        &self,
        chat: &dyn Page,
        detail_url: &str,
        keyword: &str,
        job: &JobRecord,
    ) -> Result<Submission, SubmitError> {
        let sel = &self.site.selectors;
        chat.goto(detail_url).await.map_err(SubmitError::browser)?;
        tokio::time::sleep(self.timings.settle).await;

        log_state(SubmitState::LocateChatButton);
        let attempts = self.timings.chat_button_attempts;
        let mut found = false;
        for _ in 0..attempts {
            if let Ok(Some(text)) = chat.text(&sel.chat_button).await {
                if text.contains(&self.site.markers.start_chat) {
                    found = true;
                    break;
                }
            }
            tokio::time::sleep(self.timings.submit_poll).await;
        }
        if !found {
            return Err(SubmitError::ChatButtonMissing(attempts));
        }
        chat.click(&sel.chat_button, 0)
            .await
            .map_err(SubmitError::browser)?;
        tokio::time::sleep(self.timings.settle).await;

        log_state(SubmitState::AwaitInputField);
        let attempts = self.timings.input_field_attempts;
        let mut ready = false;
        for _ in 0..attempts {
            if chat.is_visible(&sel.chat_input).await.unwrap_or(false) {
                ready = true;
                break;
            }
            tokio::time::sleep(self.timings.submit_poll).await;
        }
        if !ready {
            return Err(SubmitError::InputFieldMissing(attempts));
        }

        log_state(SubmitState::ComposeMessage);
        let submission = self.compose(keyword, job).await;
        if let Err(e) = chat.click(&sel.chat_input, 0).await {
            warn!("submit: focusing chat input failed: {:#}", e);
        }
        let tag = chat
            .tag_name(&sel.chat_input)
            .await
            .map_err(SubmitError::browser)?;
        let typed = if tag.as_deref() == Some("textarea") {
            chat.fill(&sel.chat_input, &submission.greeting).await
        } else {
            chat.set_inner_text(&sel.chat_input, &submission.greeting)
                .await
        };
        typed.map_err(SubmitError::browser)?;

        log_state(SubmitState::Send);
        let has_send = chat
            .count(&sel.send_button)
            .await
            .map_err(SubmitError::browser)?
            > 0;
        if !has_send {
            return Err(SubmitError::SendButtonMissing);
        }
        chat.click(&sel.send_button, 0)
            .await
            .map_err(SubmitError::browser)?;
        tokio::time::sleep(self.timings.settle).await;

        info!(
            "submit: 📨 sent | job={} | company={} | greeting={}",
            job.job_name, job.company_name, submission.greeting
        );
        Ok(submission)
    }

    async fn compose(&self, keyword: &str, job: &JobRecord) -> Submission {
        if self.completion.is_enabled() && !job.description.trim().is_empty() {
            let verdict = self
                .completion
                .check_job(
                    keyword,
                    &job.job_name,
                    &job.description,
                    &self.default_greeting,
                )
                .await;
            if verdict.accepted && !verdict.message.is_empty() {
                return Submission {
                    greeting: verdict.message,
                    ai_greeting: true,
                };
            }
        }
        Submission {
            greeting: self.default_greeting.clone(),
            ai_greeting: false,
        }
    }
}
