//! Featherless completions client used as the event ranking provider.

pub mod json;
pub mod prompt;

use crate::suggestions::traits::{RankingError, RankingProvider};
use crate::suggestions::types::{CandidateEvent, NormalizedPreferences, Recommendation};
use crate::utils::fmt_duration;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Connection settings for the completions endpoint.
#[derive(Debug, Clone)]
pub struct FeatherlessConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: Option<String>,
}

#[derive(Deserialize)]
struct RankedEvents {
    recommendations: Vec<RawRecommendation>,
}

#[derive(Deserialize)]
struct RawRecommendation {
    event_id: String,
    title: String,
    reason: String,
    confidence: f64,
}

/// Ranks candidate events by prompting a hosted instruction model.
pub struct FeatherlessClient {
    http: reqwest::Client,
    config: FeatherlessConfig,
}

impl FeatherlessClient {
    pub fn new(config: FeatherlessConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build ranking HTTP client")?;
        Ok(Self { http, config })
    }

    /// Send a raw completion request and return the trimmed completion text.
    async fn complete(&self, prompt: &str) -> Result<String, RankingError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "max_tokens": self.config.max_tokens,
        });

        let start = Instant::now();
        let resp = self
            .http
            .post(&self.config.base_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RankingError::Unavailable(transport_error(e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| RankingError::Unavailable(transport_error(e)))?;
        trace!(
            bytes = text.len(),
            elapsed = fmt_duration(start.elapsed()),
            "Completion received"
        );

        let completion: CompletionResponse =
            json::parse_json_with_context(&text).map_err(RankingError::Malformed)?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.text)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| RankingError::Malformed("missing choices[0].text".to_owned()))
    }
}

#[async_trait]
impl RankingProvider for FeatherlessClient {
    async fn rank(
        &self,
        preferences: &NormalizedPreferences,
        candidates: &[CandidateEvent],
    ) -> Result<Vec<Recommendation>, RankingError> {
        let prompt = prompt::build_rank_prompt(preferences, candidates)
            .map_err(|e| RankingError::Malformed(format!("failed to encode prompt: {e}")))?;
        debug!(
            candidates = candidates.len(),
            prompt_bytes = prompt.len(),
            model = %self.config.model,
            "Requesting event ranking"
        );

        let output = self.complete(&prompt).await?;
        parse_recommendations(&output)
    }
}

/// Decode the model's completion into recommendations.
///
/// Confidences are clamped into `[0, 1]`; non-finite values make the whole
/// response malformed.
pub fn parse_recommendations(output: &str) -> Result<Vec<Recommendation>, RankingError> {
    let object = json::extract_json_object(output)
        .ok_or_else(|| RankingError::Malformed("completion contains no JSON object".to_owned()))?;
    let ranked: RankedEvents = json::parse_json_with_context(object).map_err(RankingError::Malformed)?;

    ranked
        .recommendations
        .into_iter()
        .map(|raw| {
            if !raw.confidence.is_finite() {
                return Err(RankingError::Malformed(format!(
                    "non-finite confidence for event {}",
                    raw.event_id
                )));
            }
            Ok(Recommendation {
                event_id: raw.event_id,
                title: raw.title,
                reason: raw.reason,
                confidence: raw.confidence.clamp(0.0, 1.0) as f32,
            })
        })
        .collect()
}

/// Map a non-success response onto the provider error taxonomy.
///
/// The provider signals concurrency-limit rejections with 429, and on some
/// routes with a different status whose body names the concurrency limit.
pub fn classify_failure(status: StatusCode, body: &str) -> RankingError {
    let lowered = body.to_ascii_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS || lowered.contains("concurrency") {
        return RankingError::RateLimited(format!("{status}: {}", snippet(body)));
    }
    RankingError::Unavailable(anyhow::anyhow!(
        "ranking request failed ({status}): {}",
        snippet(body)
    ))
}

fn transport_error(err: reqwest::Error) -> anyhow::Error {
    if err.is_timeout() {
        anyhow::Error::new(err).context("ranking request timed out")
    } else {
        anyhow::Error::new(err).context("ranking request failed")
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_recommendations() {
        let output = r#"Here are my picks:
```json
{"recommendations": [
  {"event_id": "a", "title": "A", "reason": "likes jazz", "confidence": 0.8},
  {"event_id": "b", "title": "B", "reason": "outdoors", "confidence": 1.4}
]}
```"#;
        let recs = parse_recommendations(output).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].event_id, "a");
        assert!((recs[0].confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(recs[1].confidence, 1.0);
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = parse_recommendations(r#"{"recommendations": [{"event_id": "a"}]}"#).unwrap_err();
        assert!(matches!(err, RankingError::Malformed(msg) if msg.contains("recommendations[0]")));
    }

    #[test]
    fn prose_only_is_malformed() {
        let err = parse_recommendations("Sorry, I can't rank these.").unwrap_err();
        assert!(matches!(err, RankingError::Malformed(_)));
    }

    #[test]
    fn classifies_rate_limits() {
        assert!(classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down").is_rate_limited());
        assert!(
            classify_failure(
                StatusCode::BAD_REQUEST,
                r#"{"error":"Concurrency limit exceeded for plan"}"#
            )
            .is_rate_limited()
        );
    }

    #[test]
    fn classifies_other_failures_as_unavailable() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, RankingError::Unavailable(_)));
        assert!(format!("{:#}", anyhow::Error::new(err)).contains("502"));
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(snippet(&body).len(), 203);
        assert_eq!(snippet("  short  "), "short");
    }
}
