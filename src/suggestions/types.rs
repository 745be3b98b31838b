//! Data model shared by the cache manager, the generation pipeline and the
//! collaborators behind it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Broad kind of an interest, as produced by the preference normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestCategory {
    Physical,
    Mental,
    Social,
    Digital,
    Creative,
    Other,
}

/// Whether an interest is enjoyed alone, with others, or either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sociability {
    Solo,
    Social,
    Either,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<InterestCategory>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(
        rename = "solo_or_social",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sociability: Option<Sociability>,
}

/// A user's interests, normalized upstream from free text during onboarding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPreferences {
    pub interests: Vec<Interest>,
}

/// An upcoming event eligible for ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEvent {
    pub source_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub price: Option<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
}

/// A single ranked pick, keyed by the candidate's `source_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub event_id: String,
    pub title: String,
    pub reason: String,
    pub confidence: f32,
}

/// Denormalized copy of a [`CandidateEvent`] taken at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    pub source_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub price: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source_url: Option<String>,
}

impl From<&CandidateEvent> for EventSnapshot {
    fn from(event: &CandidateEvent) -> Self {
        Self {
            source_id: event.source_id.clone(),
            title: event.title.clone(),
            summary: event.summary.clone(),
            description: event.description.clone(),
            start_time: fmt_timestamp(event.start_time),
            end_time: event.end_time.map(fmt_timestamp),
            location: event.location.clone(),
            price: event.price.clone(),
            tags: event.tags.clone(),
            source_url: event.source_url.clone(),
        }
    }
}

/// A [`Recommendation`] joined with the event it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub event: EventSnapshot,
}

/// The list handed back to callers and persisted in the cache row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionPayload {
    pub recommendations: Vec<ResolvedRecommendation>,
}

impl SuggestionPayload {
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }
}

/// One cache row per user, overwritten by every provider-ranked generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionCacheEntry {
    pub user_id: String,
    pub payload: SuggestionPayload,
    pub generated_at: DateTime<Utc>,
}

impl SuggestionCacheEntry {
    /// Age of the entry relative to `now`. Entries stamped in the future count as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.generated_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Cache,
    Fresh,
    Fallback,
}

impl SuggestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionSource::Cache => "cache",
            SuggestionSource::Fresh => "fresh",
            SuggestionSource::Fallback => "fallback",
        }
    }
}

/// Result of a single generation run, shared between all of its waiters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub payload: SuggestionPayload,
    pub used_fallback: bool,
    pub retry_after: Option<Duration>,
}

impl GenerationOutcome {
    pub fn source(&self) -> SuggestionSource {
        if self.used_fallback {
            SuggestionSource::Fallback
        } else {
            SuggestionSource::Fresh
        }
    }
}

/// What [`SuggestionService::get_suggestions`](crate::suggestions::SuggestionService::get_suggestions) returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionResponse {
    pub payload: SuggestionPayload,
    pub source: SuggestionSource,
    pub retry_after: Option<Duration>,
}

impl From<GenerationOutcome> for SuggestionResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            source: outcome.source(),
            payload: outcome.payload,
            retry_after: outcome.retry_after,
        }
    }
}

/// Render a timestamp the way snapshots store it: RFC 3339, UTC, millisecond precision.
pub fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event() -> CandidateEvent {
        CandidateEvent {
            source_id: "espoo:1".into(),
            title: "Jazz in the park".into(),
            summary: Some("Live jazz".into()),
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            end_time: Some(Utc.with_ymd_and_hms(2025, 5, 1, 14, 30, 0).unwrap()),
            location: Some("Tapiola".into()),
            price: None,
            tags: vec!["music".into()],
            source_url: None,
        }
    }

    #[test]
    fn snapshot_uses_millisecond_utc_timestamps() {
        let snap = EventSnapshot::from(&event());
        assert_eq!(snap.start_time, "2025-05-01T12:00:00.000Z");
        assert_eq!(snap.end_time.as_deref(), Some("2025-05-01T14:30:00.000Z"));
    }

    #[test]
    fn resolved_recommendation_flattens_recommendation_fields() {
        let resolved = ResolvedRecommendation {
            recommendation: Recommendation {
                event_id: "espoo:1".into(),
                title: "Jazz in the park".into(),
                reason: "You like jazz".into(),
                confidence: 0.8,
            },
            event: EventSnapshot::from(&event()),
        };
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["event_id"], "espoo:1");
        assert_eq!(json["event"]["startTime"], "2025-05-01T12:00:00.000Z");

        let back: ResolvedRecommendation = serde_json::from_value(json).unwrap();
        assert_eq!(back, resolved);
    }

    #[test]
    fn preferences_accept_wire_field_names() {
        let prefs: NormalizedPreferences = serde_json::from_str(
            r#"{"interests":[{"name":"climbing","type":"physical","tags":["outdoors","outdoors"],"solo_or_social":"either"},{"name":"chess"}]}"#,
        )
        .unwrap();
        assert_eq!(prefs.interests.len(), 2);
        assert_eq!(prefs.interests[0].category, Some(InterestCategory::Physical));
        assert_eq!(prefs.interests[0].sociability, Some(Sociability::Either));
        assert_eq!(prefs.interests[0].tags.len(), 1);
        assert!(prefs.interests[1].tags.is_empty());
    }

    #[test]
    fn cache_entry_freshness() {
        let now = Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap();
        let entry = SuggestionCacheEntry {
            user_id: "u1".into(),
            payload: SuggestionPayload::default(),
            generated_at: now - chrono::Duration::hours(23),
        };
        let ttl = Duration::from_secs(24 * 60 * 60);
        assert!(entry.is_fresh(now, ttl));
        assert!(!entry.is_fresh(now + chrono::Duration::hours(1), ttl));

        let future = SuggestionCacheEntry {
            generated_at: now + chrono::Duration::minutes(5),
            ..entry
        };
        assert_eq!(future.age(now), Duration::ZERO);
    }
}
