//! Seams to the collaborators the suggestion core depends on.

use crate::suggestions::types::{
    CandidateEvent, NormalizedPreferences, Recommendation, SuggestionCacheEntry, SuggestionPayload,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable storage for preferences, events and the per-user suggestion cache.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user_preferences(&self, user_id: &str) -> Result<Option<NormalizedPreferences>>;

    /// Events starting in `[start, end)`, ordered by start time ascending.
    async fn find_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CandidateEvent>>;

    async fn get_suggestion_cache(&self, user_id: &str) -> Result<Option<SuggestionCacheEntry>>;

    async fn upsert_suggestion_cache(
        &self,
        user_id: &str,
        payload: &SuggestionPayload,
        generated_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Classified ranking provider failure.
#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    /// The provider rejected the call because of concurrency or rate limits.
    #[error("ranking provider is rate limited: {0}")]
    RateLimited(String),
    /// Transport failure, timeout, or a non-success status.
    #[error("ranking provider unavailable")]
    Unavailable(#[source] anyhow::Error),
    /// The provider answered, but not with something we can use.
    #[error("malformed ranking response: {0}")]
    Malformed(String),
}

impl RankingError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// External relevance model.
#[async_trait]
pub trait RankingProvider: Send + Sync {
    async fn rank(
        &self,
        preferences: &NormalizedPreferences,
        candidates: &[CandidateEvent],
    ) -> Result<Vec<Recommendation>, RankingError>;
}

/// Repopulates the event pool. Deduplication of concurrent calls is the
/// caller's concern.
#[async_trait]
pub trait IngestionTrigger: Send + Sync {
    async fn ingest(&self) -> Result<()>;
}
