//! Environment-sourced configuration.
//!
//! Keys are matched case-insensitively against raw environment variables
//! (after `.env` has been loaded by `dotenvy`).

use crate::ranking::FeatherlessConfig;
use crate::suggestions::SuggestionSettings;
use figment::Figment;
use figment::providers::Env;
use fundu::DurationParser;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Extra time the pipeline grants a ranking call beyond the HTTP client's own
/// timeout, so the client's more descriptive error wins the race.
const RANKING_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database_url: String,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,

    #[serde(default = "default_window_days")]
    pub espoo_events_window_days: u32,
    #[serde(default = "default_event_limit")]
    pub espoo_events_limit: usize,
    #[serde(default = "default_event_limit")]
    pub espoo_events_model_limit: usize,
    #[serde(default = "default_cache_ttl_hours")]
    pub espoo_suggestion_cache_ttl_hours: u64,
    #[serde(
        default = "default_fallback_retry_after",
        deserialize_with = "deserialize_duration"
    )]
    pub fallback_retry_after: Duration,

    pub featherless_api_key: String,
    #[serde(default = "default_featherless_base_url")]
    pub featherless_base_url: String,
    #[serde(default = "default_featherless_model")]
    pub featherless_model: String,
    #[serde(default = "default_featherless_max_tokens")]
    pub featherless_max_tokens: u32,
    #[serde(
        default = "default_featherless_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub featherless_timeout: Duration,

    #[serde(default = "default_ingest_command")]
    pub ingest_command: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_window_days() -> u32 {
    10
}

fn default_event_limit() -> usize {
    25
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_fallback_retry_after() -> Duration {
    Duration::from_millis(2000)
}

fn default_featherless_base_url() -> String {
    "https://api.featherless.ai/v1/completions".to_string()
}

fn default_featherless_model() -> String {
    "Qwen/Qwen2.5-72B-Instruct".to_string()
}

fn default_featherless_max_tokens() -> u32 {
    1500
}

fn default_featherless_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_ingest_command() -> String {
    "node_modules/.bin/tsx scripts/ingest-espoo.ts".to_string()
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// Generation and cache tunables. Zero-valued knobs are raised to one.
    pub fn suggestion_settings(&self) -> SuggestionSettings {
        SuggestionSettings {
            window_days: self.espoo_events_window_days.max(1),
            event_limit: self.espoo_events_limit.max(1),
            model_limit: self.espoo_events_model_limit.max(1),
            cache_ttl: Duration::from_secs(self.espoo_suggestion_cache_ttl_hours.max(1) * 60 * 60),
            fallback_retry_after: self.fallback_retry_after,
            ranking_timeout: self.featherless_timeout + RANKING_TIMEOUT_GRACE,
        }
    }

    pub fn featherless(&self) -> FeatherlessConfig {
        FeatherlessConfig {
            api_key: self.featherless_api_key.clone(),
            base_url: self.featherless_base_url.clone(),
            model: self.featherless_model.clone(),
            max_tokens: self.featherless_max_tokens,
            timeout: self.featherless_timeout,
        }
    }
}

/// Accepts either a bare number of seconds or a human duration (`"2s"`, `"1500ms"`, `"1m"`).
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let parsed = DurationParser::with_all_time_units()
        .parse(text.trim())
        .map_err(|e| format!("invalid duration {text:?}: {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration {text:?}: {e}"))
}
