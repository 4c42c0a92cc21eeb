use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::site::SiteProfile;
use super::types::SearchTarget;
use crate::features::antibot::WaitRange;

// ---------------------------------------------------------------------------
// ScoutConfig — file-based config loader (boss-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "BOSS_SCOUT_CONFIG";
pub const ENV_DATA_DIR: &str = "BOSS_SCOUT_DATA_DIR";
pub const ENV_LLM_MODEL: &str = "BOSS_SCOUT_LLM_MODEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid waitTime {0:?}: expected \"min-max\" with min <= max")]
    WaitRange(String),
}

/// A search filter as written in the config: a single code or a list of codes.
///
/// `"0"` (or a list whose first element is `"0"`) is the site's "any" value and
/// means the filter is left off the search URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    pub const ANY: &'static str = "0";

    /// `true` for empty values and the "any" sentinel.
    pub fn is_any(&self) -> bool {
        match self {
            FilterValue::One(v) => v.trim().is_empty() || v == Self::ANY,
            FilterValue::Many(vs) => vs.first().map_or(true, |v| v == Self::ANY),
        }
    }

    /// Comma-joined query value, `None` when the filter is unset.
    pub fn query_value(&self) -> Option<String> {
        if self.is_any() {
            return None;
        }
        Some(match self {
            FilterValue::One(v) => v.trim().to_string(),
            FilterValue::Many(vs) => vs.join(","),
        })
    }
}

/// Chat-completion endpoint settings (`api` key in boss-scout.json).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    /// Full chat-completions URL or an OpenAI-style base (`…/v1`).
    pub base_url: Option<String>,
    /// Never logged.
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl ApiConfig {
    /// Endpoint: JSON field → `OPENAI_BASE_URL` env var → `https://api.openai.com/v1`,
    /// with `/chat/completions` appended when missing.
    pub fn resolve_endpoint(&self) -> String {
        let base = self
            .base_url
            .as_ref()
            .filter(|u| !u.trim().is_empty())
            .cloned()
            .or_else(|| {
                std::env::var("OPENAI_BASE_URL")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let base = base.trim().trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }

    /// API key: JSON field → `OPENAI_API_KEY` env var → `""` (key-less local endpoint).
    pub fn resolve_api_key(&self) -> String {
        if let Some(k) = &self.api_key {
            return k.trim().to_string();
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Model name: JSON field → `BOSS_SCOUT_LLM_MODEL` env var → `gpt-4o-mini`.
    pub fn resolve_model(&self) -> String {
        if let Some(m) = &self.model {
            if !m.trim().is_empty() {
                return m.clone();
            }
        }
        std::env::var(ENV_LLM_MODEL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn resolve_temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.5)
    }
}

/// Greeting-draft settings (`ai` key in boss-scout.json).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Self-introduction substituted into the first `%s` of `prompt`.
    pub introduce: String,
    /// Template with five `%s` markers: introduction, keyword, job title,
    /// description, default greeting.
    pub prompt: String,
}

/// Top-level config loaded from `boss-scout.json`.
///
/// Keys are camelCase so an existing `config.json` from the older tooling
/// loads unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoutConfig {
    pub say_hi: String,
    pub keywords: Vec<String>,
    pub city_code: Vec<String>,

    pub job_type: Option<FilterValue>,
    pub salary: Option<FilterValue>,
    pub experience: Option<FilterValue>,
    pub degree: Option<FilterValue>,
    pub scale: Option<FilterValue>,
    pub industry: Option<FilterValue>,
    pub stage: Option<FilterValue>,

    #[serde(rename = "enableAI")]
    pub enable_ai: bool,
    #[serde(rename = "filterDeadHR")]
    pub filter_dead_hr: bool,
    pub dead_status: Vec<String>,
    /// `"min-max"` seconds between jobs. Default `3-10`.
    pub wait_time: Option<String>,

    pub api: ApiConfig,
    pub ai: Option<AiConfig>,

    /// Where data.json / cookie.json live. Default `~/.boss-scout`.
    pub data_dir: Option<PathBuf>,
    pub headless: bool,
    pub site: SiteProfile,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            say_hi: String::new(),
            keywords: Vec::new(),
            city_code: Vec::new(),
            job_type: None,
            salary: None,
            experience: None,
            degree: None,
            scale: None,
            industry: None,
            stage: None,
            enable_ai: false,
            filter_dead_hr: false,
            dead_status: vec!["离线".to_string()],
            wait_time: None,
            api: ApiConfig::default(),
            ai: None,
            data_dir: None,
            headless: false,
            site: SiteProfile::default(),
        }
    }
}

impl ScoutConfig {
    /// The configured greeting with line breaks removed — what gets typed when
    /// no AI draft is used.
    pub fn default_greeting(&self) -> String {
        self.say_hi.replace(['\r', '\n'], "")
    }

    /// AI settings, only when `enableAI` is on and an `ai` block exists.
    pub fn ai_settings(&self) -> Option<&AiConfig> {
        if self.enable_ai {
            self.ai.as_ref()
        } else {
            None
        }
    }

    pub fn wait_range(&self) -> Result<WaitRange, ConfigError> {
        match self.wait_time.as_deref().map(str::trim) {
            None | Some("") => Ok(WaitRange::default()),
            Some(raw) => WaitRange::parse(raw).ok_or_else(|| ConfigError::WaitRange(raw.to_string())),
        }
    }

    /// City-major, keyword-minor.
    pub fn search_targets(&self) -> Vec<SearchTarget> {
        self.city_code
            .iter()
            .flat_map(|city| {
                self.keywords.iter().map(move |kw| SearchTarget {
                    city_code: city.clone(),
                    keyword: kw.clone(),
                })
            })
            .collect()
    }

    /// Data directory: JSON field → `BOSS_SCOUT_DATA_DIR` env → `~/.boss-scout` → `.`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Ok(v) = std::env::var(ENV_DATA_DIR) {
            if !v.trim().is_empty() {
                return PathBuf::from(v.trim());
            }
        }
        dirs::home_dir()
            .map(|h| h.join(".boss-scout"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn denylist_path(&self) -> PathBuf {
        self.resolve_data_dir().join("data.json")
    }

    pub fn cookie_path(&self) -> PathBuf {
        self.resolve_data_dir().join("cookie.json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.resolve_data_dir().join("report.json")
    }
}

/// Parse a config document.
pub fn parse_scout_config(path: &Path, contents: &str) -> Result<ScoutConfig, ConfigError> {
    serde_json::from_str::<ScoutConfig>(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `boss-scout.json`.
///
/// An explicit path must exist and parse. Without one, the search order is
/// (first found wins):
/// 1. `BOSS_SCOUT_CONFIG` env var path
/// 2. `./boss-scout.json`
/// 3. `./config.json` (layout of the older tooling)
///
/// Missing file → `ScoutConfig::default()`.
/// Parse error on a discovered file → log a warning, return the default.
pub fn load_scout_config(explicit: Option<&Path>) -> Result<ScoutConfig, ConfigError> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = parse_scout_config(path, &contents)?;
        tracing::info!("boss-scout config loaded from {}", path.display());
        return Ok(cfg);
    }

    let candidates: Vec<PathBuf> = {
        let mut v = vec![
            PathBuf::from("boss-scout.json"),
            PathBuf::from("config.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            v.insert(0, PathBuf::from(env_path));
        }
        v
    };

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        match parse_scout_config(path, &contents) {
            Ok(cfg) => {
                tracing::info!("boss-scout config loaded from {}", path.display());
                return Ok(cfg);
            }
            Err(e) => {
                tracing::warn!("{} — using defaults", e);
                return Ok(ScoutConfig::default());
            }
        }
    }

    tracing::warn!("no boss-scout.json found; running with defaults");
    Ok(ScoutConfig::default())
}
