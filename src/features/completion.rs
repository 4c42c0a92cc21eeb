//! OpenAI-compatible chat completion client used to draft greetings.
//!
//! The client never fails the caller: transport errors, non-2xx statuses and
//! unexpected response shapes all collapse to an empty completion, which
//! [`classify_response`] then rejects in favour of the default greeting.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::config::{AiConfig, ApiConfig};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Responses shorter than this (in characters) are treated as refusals.
pub const MIN_GREETING_CHARS: usize = 10;

/// Marker a prompt asks the model to answer with when the job does not fit.
pub const REJECT_TOKEN: &str = "false";

const QUOTE_CHARS: &[char] = &['"', '\'', '“', '”', '‘', '’', '「', '」', '`'];

/// Outcome of [`CompletionClient::check_job`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobVerdict {
    /// `true` when `message` is a model-drafted greeting.
    pub accepted: bool,
    pub message: String,
}

impl JobVerdict {
    fn fallback(message: &str) -> Self {
        Self {
            accepted: false,
            message: message.to_string(),
        }
    }
}

/// Accept or reject a raw completion.
///
/// Rejected when blank, when it contains [`REJECT_TOKEN`], or when the raw
/// response (padding included) is shorter than [`MIN_GREETING_CHARS`].
/// Accepted text is trimmed, stripped of surrounding quote characters and
/// trimmed again.
pub fn classify_response(raw: &str, fallback: &str) -> JobVerdict {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.contains(REJECT_TOKEN)
        || raw.chars().count() < MIN_GREETING_CHARS
    {
        return JobVerdict::fallback(fallback);
    }
    let message = trimmed
        .trim_start_matches(QUOTE_CHARS)
        .trim_end_matches(QUOTE_CHARS)
        .trim()
        .to_string();
    JobVerdict {
        accepted: true,
        message,
    }
}

/// Fill the five `%s` markers left to right: introduction, keyword, job
/// title, description, default greeting. Missing markers are tolerated.
pub fn build_prompt(
    template: &str,
    introduce: &str,
    keyword: &str,
    job_name: &str,
    description: &str,
    fallback: &str,
) -> String {
    let values = [introduce, keyword, job_name, description, fallback];
    let mut out = String::with_capacity(template.len() + values.iter().map(|v| v.len()).sum::<usize>());
    // Split first so substituted values are never scanned for markers.
    let mut parts = template.splitn(values.len() + 1, "%s");
    if let Some(head) = parts.next() {
        out.push_str(head);
    }
    for (value, part) in values.iter().zip(parts) {
        out.push_str(value);
        out.push_str(part);
    }
    out
}

fn watermark_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"来自BOSS直聘|BOSS直聘|kanzhun").expect("valid watermark regex"))
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Strip site watermarks, zero-width characters and markup from a job
/// description and collapse whitespace runs to single spaces.
pub fn clean_description(raw: &str) -> String {
    let no_tags = html_tag_re().replace_all(raw, " ");
    let no_marks = watermark_re().replace_all(&no_tags, "");
    let visible: String = no_marks
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}'))
        .collect();
    whitespace_re().replace_all(&visible, " ").trim().to_string()
}

#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    ai: Option<AiConfig>,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("ai_enabled", &self.ai.is_some())
            .finish()
    }
}

impl CompletionClient {
    /// `ai` is `None` when greeting drafts are disabled; `check_job` then
    /// always returns the fallback without touching the network.
    pub fn new(api: &ApiConfig, ai: Option<AiConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build completion http client")?;
        Ok(Self {
            http,
            endpoint: api.resolve_endpoint(),
            api_key: api.resolve_api_key(),
            model: api.resolve_model(),
            temperature: api.resolve_temperature(),
            ai,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.ai.is_some()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let builder = self.http.post(&self.endpoint).json(&body);
        // Key-less local endpoints work without the header.
        let builder = if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        };
        let response = builder
            .send()
            .await
            .context("chat.completions request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "chat.completions failed: status={} body={}",
                status,
                text
            ));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .context("chat.completions response json parse failed")?;

        value
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .context("chat.completions response has no choices[0].message.content")
    }

    /// Raw completion text, or `""` on any failure.
    pub async fn complete(&self, prompt: &str) -> String {
        match self.request(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("completion: {:#}", e);
                String::new()
            }
        }
    }

    /// Ask the model for a tailored greeting for one job.
    pub async fn check_job(
        &self,
        keyword: &str,
        job_name: &str,
        description: &str,
        fallback: &str,
    ) -> JobVerdict {
        let Some(ai) = &self.ai else {
            return JobVerdict::fallback(fallback);
        };
        let prompt = build_prompt(
            &ai.prompt,
            &ai.introduce,
            keyword,
            job_name,
            &clean_description(description),
            fallback,
        );
        let raw = self.complete(&prompt).await;
        let verdict = classify_response(&raw, fallback);
        if verdict.accepted {
            info!("completion: ✍️ drafted greeting for {}", job_name);
        } else {
            info!("completion: model declined {} — using default greeting", job_name);
        }
        verdict
    }
}
