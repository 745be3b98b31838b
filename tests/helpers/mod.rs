//! In-memory collaborators for exercising the suggestion service without
//! Postgres, a model endpoint, or an ingestion script.

#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use eventmatch::suggestions::{
    CandidateEvent, IngestionTrigger, Interest, NormalizedPreferences, RankingError,
    RankingProvider, Recommendation, RecordStore, SuggestionCacheEntry, SuggestionPayload,
    SuggestionService, SuggestionSettings,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Fixed request time used across tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn preferences() -> NormalizedPreferences {
    NormalizedPreferences {
        interests: vec![Interest {
            name: "jazz".into(),
            category: None,
            tags: ["music".to_string()].into_iter().collect(),
            sociability: None,
        }],
    }
}

/// An event starting `hours` after [`now`].
pub fn event(id: &str, hours: i64) -> CandidateEvent {
    CandidateEvent {
        source_id: id.into(),
        title: format!("Event {id}"),
        summary: Some(format!("Summary of {id}")),
        description: None,
        start_time: now() + Duration::hours(hours),
        end_time: None,
        location: Some("Tapiola".into()),
        price: None,
        tags: vec!["music".into()],
        source_url: None,
    }
}

pub fn rec(id: &str, confidence: f32) -> Recommendation {
    Recommendation {
        event_id: id.into(),
        title: format!("Event {id}"),
        reason: format!("because {id}"),
        confidence,
    }
}

#[derive(Default)]
pub struct FakeStore {
    preferences: Mutex<HashMap<String, NormalizedPreferences>>,
    events: Mutex<Vec<CandidateEvent>>,
    cache: Mutex<HashMap<String, SuggestionCacheEntry>>,
    pub find_calls: AtomicUsize,
    pub cache_reads: AtomicUsize,
    pub cache_writes: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_user(self: &Arc<Self>, user_id: &str) -> Arc<Self> {
        self.preferences
            .lock()
            .unwrap()
            .insert(user_id.into(), preferences());
        Arc::clone(self)
    }

    pub fn set_events(&self, events: Vec<CandidateEvent>) {
        *self.events.lock().unwrap() = events;
    }

    pub fn seed_cache(&self, user_id: &str, payload: SuggestionPayload, generated_at: DateTime<Utc>) {
        self.cache.lock().unwrap().insert(
            user_id.into(),
            SuggestionCacheEntry {
                user_id: user_id.into(),
                payload,
                generated_at,
            },
        );
    }

    pub fn cached(&self, user_id: &str) -> Option<SuggestionCacheEntry> {
        self.cache.lock().unwrap().get(user_id).cloned()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn cache_reads(&self) -> usize {
        self.cache_reads.load(Ordering::SeqCst)
    }

    pub fn cache_writes(&self) -> usize {
        self.cache_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn get_user_preferences(&self, user_id: &str) -> Result<Option<NormalizedPreferences>> {
        Ok(self.preferences.lock().unwrap().get(user_id).cloned())
    }

    async fn find_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CandidateEvent>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let mut events: Vec<CandidateEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.start_time >= start && e.start_time < end)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        events.truncate(limit);
        Ok(events)
    }

    async fn get_suggestion_cache(&self, user_id: &str) -> Result<Option<SuggestionCacheEntry>> {
        self.cache_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.cached(user_id))
    }

    async fn upsert_suggestion_cache(
        &self,
        user_id: &str,
        payload: &SuggestionPayload,
        generated_at: DateTime<Utc>,
    ) -> Result<()> {
        self.cache_writes.fetch_add(1, Ordering::SeqCst);
        self.seed_cache(user_id, payload.clone(), generated_at);
        Ok(())
    }
}

type RankFn = dyn Fn(&[CandidateEvent]) -> Result<Vec<Recommendation>, RankingError> + Send + Sync;

/// Ranking provider driven by a closure, optionally held at a gate until released.
pub struct FakeRanker {
    respond: Box<RankFn>,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
    pub last_candidates: Mutex<Vec<String>>,
}

impl FakeRanker {
    pub fn new(
        respond: impl Fn(&[CandidateEvent]) -> Result<Vec<Recommendation>, RankingError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            gate: None,
            calls: AtomicUsize::new(0),
            last_candidates: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `recommendations`.
    pub fn returning(recommendations: Vec<Recommendation>) -> Self {
        Self::new(move |_| Ok(recommendations.clone()))
    }

    pub fn rate_limited() -> Self {
        Self::new(|_| Err(RankingError::RateLimited("429: concurrency limit".into())))
    }

    pub fn unavailable() -> Self {
        Self::new(|_| Err(RankingError::Unavailable(anyhow::anyhow!("connection refused"))))
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankingProvider for FakeRanker {
    async fn rank(
        &self,
        _preferences: &NormalizedPreferences,
        candidates: &[CandidateEvent],
    ) -> Result<Vec<Recommendation>, RankingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_candidates.lock().unwrap() =
            candidates.iter().map(|e| e.source_id.clone()).collect();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        (self.respond)(candidates)
    }
}

/// Ingestion trigger that loads a prepared batch of events into a [`FakeStore`].
pub struct FakeIngestor {
    store: Arc<FakeStore>,
    batch: Vec<CandidateEvent>,
    fail: AtomicBool,
    gate: Option<Arc<Notify>>,
    pub calls: AtomicUsize,
}

impl FakeIngestor {
    pub fn new(store: Arc<FakeStore>, batch: Vec<CandidateEvent>) -> Self {
        Self {
            store,
            batch,
            fail: AtomicBool::new(false),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(store: Arc<FakeStore>) -> Self {
        let ingestor = Self::new(store, Vec::new());
        ingestor.fail.store(true, Ordering::SeqCst);
        ingestor
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngestionTrigger for FakeIngestor {
    async fn ingest(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("ingest script exited with status 1");
        }
        self.store.set_events(self.batch.clone());
        Ok(())
    }
}

pub fn settings() -> SuggestionSettings {
    SuggestionSettings::default()
}

pub fn service(
    store: &Arc<FakeStore>,
    ranker: &Arc<FakeRanker>,
    ingestor: &Arc<FakeIngestor>,
) -> SuggestionService {
    SuggestionService::new(
        Arc::clone(store) as Arc<dyn RecordStore>,
        Arc::clone(ranker) as Arc<dyn RankingProvider>,
        Arc::clone(ingestor) as Arc<dyn IngestionTrigger>,
        settings(),
    )
}

/// Yield to the runtime until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
