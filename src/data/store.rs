//! Postgres-backed [`RecordStore`].

use crate::data::{events, preferences, suggestion_cache};
use crate::suggestions::traits::RecordStore;
use crate::suggestions::types::{
    CandidateEvent, NormalizedPreferences, SuggestionCacheEntry, SuggestionPayload,
};
use crate::utils::log_if_slow;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::{Duration, Instant};

const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn get_user_preferences(&self, user_id: &str) -> Result<Option<NormalizedPreferences>> {
        preferences::get(&self.pool, user_id).await
    }

    async fn find_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CandidateEvent>> {
        let started = Instant::now();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let events = events::find_upcoming(&self.pool, start, end, limit).await;
        log_if_slow(started, SLOW_QUERY_THRESHOLD, "find upcoming events");
        events
    }

    async fn get_suggestion_cache(&self, user_id: &str) -> Result<Option<SuggestionCacheEntry>> {
        suggestion_cache::get(&self.pool, user_id).await
    }

    async fn upsert_suggestion_cache(
        &self,
        user_id: &str,
        payload: &SuggestionPayload,
        generated_at: DateTime<Utc>,
    ) -> Result<()> {
        suggestion_cache::upsert(&self.pool, user_id, payload, generated_at).await
    }
}
