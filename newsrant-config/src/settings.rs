//! Strongly typed configuration sections.
//!
//! Every section has defaults so a deployment only has to supply the social
//! credential; everything else falls back to the values below.
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HOMEPAGE: &str = "https://www.foxnews.com/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_OLLAMA_MODEL: &str = "smollm2";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsrantConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub twitter: TwitterSettings,
    #[serde(default)]
    pub post: PostSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Polling cadence and seen-article ledger location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_secs: u64,
    pub error_pause_secs: u64,
    pub seen_ttl_hours: u64,
    pub store_path: PathBuf,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 600,
            error_pause_secs: 60,
            seen_ttl_hours: 24,
            store_path: PathBuf::from("seen_articles.json"),
        }
    }
}

impl MonitorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_secs(self.error_pause_secs)
    }

    pub fn seen_ttl(&self) -> Duration {
        Duration::from_secs(self.seen_ttl_hours.saturating_mul(3600))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub homepage: String,
    pub user_agent: String,
    pub max_articles: usize,
    pub max_content_chars: usize,
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            homepage: DEFAULT_HOMEPAGE.into(),
            user_agent: DEFAULT_USER_AGENT.into(),
            max_articles: 10,
            max_content_chars: 2000,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_llm_timeout_secs")]
        timeout_secs: u64,
    },
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::Ollama {
            model: default_ollama_model(),
            endpoint: default_ollama_endpoint(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_ollama_model() -> String {
    DEFAULT_OLLAMA_MODEL.into()
}
fn default_ollama_endpoint() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// X/Twitter credentials and rate-limit retry tuning.
///
/// Posting uses OAuth 1.0a user context, so all four values come from the app's
/// "Keys and tokens" page and do not expire.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterSettings {
    /// Consumer key (API key).
    pub api_key: Option<String>,
    /// Consumer secret (API key secret).
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub max_rate_limit_retries: u32,
    pub reset_buffer_secs: u64,
    pub fallback_wait_secs: u64,
}

impl Default for TwitterSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            access_token: None,
            access_token_secret: None,
            max_rate_limit_retries: 3,
            reset_buffer_secs: 5,
            fallback_wait_secs: 900,
        }
    }
}

/// The four OAuth 1.0a values, all present and fully expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwitterCredentials<'a> {
    pub api_key: &'a str,
    pub api_secret: &'a str,
    pub access_token: &'a str,
    pub access_token_secret: &'a str,
}

fn resolved(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.contains("${"))
}

impl TwitterSettings {
    /// All four credentials, if each was supplied and every `${VAR}` in it resolved.
    pub fn credentials(&self) -> Option<TwitterCredentials<'_>> {
        Some(TwitterCredentials {
            api_key: resolved(&self.api_key)?,
            api_secret: resolved(&self.api_secret)?,
            access_token: resolved(&self.access_token)?,
            access_token_secret: resolved(&self.access_token_secret)?,
        })
    }

    /// Config keys of the credentials that are absent, blank or still hold a placeholder.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        [
            ("twitter.api_key", &self.api_key),
            ("twitter.api_secret", &self.api_secret),
            ("twitter.access_token", &self.access_token),
            ("twitter.access_token_secret", &self.access_token_secret),
        ]
        .into_iter()
        .filter(|(_, v)| resolved(v).is_none())
        .map(|(k, _)| k)
        .collect()
    }
}

/// Template wrapped around the generated text.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    pub prefix: String,
    pub suffix: String,
    pub max_chars: usize,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            prefix: "👀 BREAKING: \n\n".into(),
            suffix: "\n\nWhat do you think?".into(),
            max_chars: 280,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub format: String,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: "text".into(),
            stderr: true,
            filter: "info".into(),
        }
    }
}
