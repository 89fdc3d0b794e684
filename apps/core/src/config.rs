//! Runtime configuration, read from the environment (optionally via `.env`).

use crate::actors::media::DEFAULT_MEDIA_AUTH_HOSTS;
use crate::analysis::GenerationStrategy;
use crate::brain::intent::{IntentPolicyKind, DEFAULT_DETAIL_TRIGGERS};
use crate::error::AppError;
use crate::orchestrator::{DetailMode, WelcomePolicy};
use crate::telemetry::LogFormat;
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,

    #[validate(length(min = 1))]
    pub openai_api_key: String,
    #[validate(url)]
    pub openai_base_url: String,
    #[validate(length(min = 1))]
    pub text_model: String,
    #[validate(length(min = 1))]
    pub vision_model: String,
    /// Sampling temperature. Value between 0.0 and 2.0.
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 1))]
    pub short_max_tokens: u32,
    #[validate(range(min = 1))]
    pub detailed_max_tokens: u32,

    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub reply_from: Option<String>,
    /// Hosts that receive the gateway credentials on media downloads.
    pub media_auth_hosts: Vec<String>,

    /// The transport rejects messages longer than 1600 characters.
    #[validate(range(min = 1, max = 1600))]
    pub max_chunk_len: usize,
    #[validate(length(min = 1))]
    pub detail_triggers: Vec<String>,
    pub intent_policy: IntentPolicyKind,
    pub generation_strategy: GenerationStrategy,
    pub detail_mode: DetailMode,
    pub welcome_policy: WelcomePolicy,

    #[validate(range(min = 1))]
    pub backend_timeout_secs: u64,
    #[validate(range(min = 1))]
    pub media_timeout_secs: u64,
    #[validate(range(min = 1))]
    pub reply_deadline_secs: u64,
    #[validate(range(min = 1))]
    pub max_concurrent_backend: usize,
    #[validate(range(min = 1))]
    pub max_media_bytes: usize,

    #[validate(range(min = 1))]
    pub session_capacity: usize,
    /// Zero disables idle expiry.
    pub session_ttl_secs: u64,
    /// Zero disables rate limiting.
    pub rate_limit_per_minute: usize,

    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads and validates the configuration from process environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        let config = Self {
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: string_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            text_model: string_or("TEXT_MODEL", "gpt-3.5-turbo"),
            vision_model: string_or("VISION_MODEL", "gpt-4o-mini"),
            temperature: parse_or("TEMPERATURE", 0.3)?,
            short_max_tokens: parse_or("SHORT_MAX_TOKENS", 350)?,
            detailed_max_tokens: parse_or("DETAILED_MAX_TOKENS", 1200)?,
            twilio_account_sid: optional("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: optional("TWILIO_AUTH_TOKEN"),
            reply_from: optional("REPLY_FROM"),
            media_auth_hosts: list_or("MEDIA_AUTH_HOSTS", DEFAULT_MEDIA_AUTH_HOSTS),
            max_chunk_len: parse_or("MAX_CHUNK_LEN", 1500)?,
            detail_triggers: list_or("DETAIL_TRIGGERS", DEFAULT_DETAIL_TRIGGERS),
            intent_policy: parse_or("INTENT_POLICY", IntentPolicyKind::Lexical)?,
            generation_strategy: parse_or("GENERATION_STRATEGY", GenerationStrategy::Separate)?,
            detail_mode: parse_or("DETAIL_MODE", DetailMode::Inline)?,
            welcome_policy: parse_or("WELCOME_POLICY", WelcomePolicy::Continue)?,
            backend_timeout_secs: parse_or("BACKEND_TIMEOUT_SECS", 12)?,
            media_timeout_secs: parse_or("MEDIA_TIMEOUT_SECS", 10)?,
            reply_deadline_secs: parse_or("REPLY_DEADLINE_SECS", 14)?,
            max_concurrent_backend: parse_or("MAX_CONCURRENT_BACKEND", 8)?,
            max_media_bytes: parse_or("MAX_MEDIA_BYTES", 5 * 1024 * 1024)?,
            session_capacity: parse_or("SESSION_CAPACITY", 10_000)?,
            session_ttl_secs: parse_or("SESSION_TTL_SECS", 86_400)?,
            rate_limit_per_minute: parse_or("RATE_LIMIT_PER_MINUTE", 20)?,
            log_format: parse_or("LOG_FORMAT", LogFormat::Pretty)?,
        };
        config.validate()?;
        // A backend call must be able to finish before the webhook gives up on it.
        if config.backend_timeout_secs >= config.reply_deadline_secs {
            return Err(AppError::Config(format!(
                "BACKEND_TIMEOUT_SECS ({}) must be shorter than REPLY_DEADLINE_SECS ({})",
                config.backend_timeout_secs, config.reply_deadline_secs
            )));
        }
        Ok(config)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }

    pub fn reply_deadline(&self) -> Duration {
        Duration::from_secs(self.reply_deadline_secs)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    /// Basic-auth pair for media downloads, when both halves are set.
    pub fn media_credentials(&self) -> Option<(String, String)> {
        match (&self.twilio_account_sid, &self.twilio_auth_token) {
            (Some(sid), Some(token)) => Some((sid.clone(), token.clone())),
            _ => None,
        }
    }

    /// The phrase advertised in the short-summary trailer.
    pub fn detail_keyword(&self) -> &str {
        self.detail_triggers
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_DETAIL_TRIGGERS[0])
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String, AppError> {
    optional(key).ok_or_else(|| AppError::Config(format!("{} must be set", key)))
}

fn string_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}

fn list_or(key: &str, default: &[&str]) -> Vec<String> {
    optional(key)
        .map(|raw| split_list(&raw))
        .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
