//! Fresh generation: fetch candidates, rank them, resolve the picks back to
//! events and write the result to the cache.

use crate::suggestions::SuggestionSettings;
use crate::suggestions::error::SuggestionError;
use crate::suggestions::fallback::Ranking;
use crate::suggestions::singleflight::{Role, Singleflight};
use crate::suggestions::traits::{IngestionTrigger, RankingError, RankingProvider, RecordStore};
use crate::suggestions::types::{
    CandidateEvent, EventSnapshot, GenerationOutcome, NormalizedPreferences, Recommendation,
    ResolvedRecommendation, SuggestionPayload,
};
use crate::utils::fmt_duration;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Shared result of one ingestion run.
pub(crate) type IngestionResult = Result<(), Arc<anyhow::Error>>;

/// Runs a single generation. Clone-cheap; the ingestion registry is shared
/// with the [`SuggestionService`](super::SuggestionService) that built it.
#[derive(Clone)]
pub struct GenerationPipeline {
    store: Arc<dyn RecordStore>,
    ranker: Arc<dyn RankingProvider>,
    ingestor: Arc<dyn IngestionTrigger>,
    ingestion: Singleflight<(), IngestionResult>,
    settings: SuggestionSettings,
}

impl GenerationPipeline {
    pub(crate) fn new(
        store: Arc<dyn RecordStore>,
        ranker: Arc<dyn RankingProvider>,
        ingestor: Arc<dyn IngestionTrigger>,
        ingestion: Singleflight<(), IngestionResult>,
        settings: SuggestionSettings,
    ) -> Self {
        Self {
            store,
            ranker,
            ingestor,
            ingestion,
            settings,
        }
    }

    /// Produce fresh suggestions for `user_id` as of `now`.
    ///
    /// Provider failures never surface here; they yield a degraded outcome
    /// with `used_fallback` set, which is returned but not cached.
    pub async fn generate(
        &self,
        user_id: &str,
        preferences: &NormalizedPreferences,
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome, SuggestionError> {
        let end = now + chrono::Duration::days(i64::from(self.settings.window_days));

        info!(
            limit = self.settings.event_limit,
            window_start = %now,
            window_end = %end,
            "Fetching candidate events"
        );

        let mut events = self.fetch_events(now, end).await?;

        if events.is_empty() {
            warn!("No events found locally, triggering ingestion");
            self.ingest().await?;

            events = self.fetch_events(now, end).await?;
            if events.is_empty() {
                warn!("Still no events after ingestion, returning empty suggestions");
                return Ok(GenerationOutcome {
                    payload: SuggestionPayload::default(),
                    used_fallback: false,
                    retry_after: None,
                });
            }
        }

        let for_model = &events[..events.len().min(self.settings.model_limit)];
        info!(
            sent = for_model.len(),
            fetched = events.len(),
            "Sending events to ranking provider"
        );

        let ranking = self.rank(preferences, for_model).await;
        let used_fallback = ranking.is_degraded();
        let retry_after = ranking.retry_after();
        let recommendations = ranking.into_recommendations();
        debug!(
            recommendations = recommendations.len(),
            used_fallback, "Ranking step finished"
        );

        let payload = resolve_recommendations(recommendations, &events);

        if used_fallback {
            info!("Skipping cache update because fallback suggestions were used");
        } else {
            self.store
                .upsert_suggestion_cache(user_id, &payload, now)
                .await
                .map_err(SuggestionError::store)?;
            debug!(recommendations = payload.len(), "Suggestion cache updated");
        }

        Ok(GenerationOutcome {
            payload,
            used_fallback,
            retry_after,
        })
    }

    async fn fetch_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CandidateEvent>, SuggestionError> {
        self.store
            .find_events(start, end, self.settings.event_limit)
            .await
            .map_err(SuggestionError::store)
    }

    /// Call the provider under the configured timeout and fold failures into a fallback.
    async fn rank(
        &self,
        preferences: &NormalizedPreferences,
        candidates: &[CandidateEvent],
    ) -> Ranking {
        let start = Instant::now();
        let timeout = self.settings.ranking_timeout;

        let result = match tokio::time::timeout(timeout, self.ranker.rank(preferences, candidates))
            .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(RankingError::Unavailable(anyhow::anyhow!(
                "ranking request timed out after {}",
                fmt_duration(timeout)
            ))),
        };

        match &result {
            Ok(recommendations) => info!(
                recommendations = recommendations.len(),
                elapsed = fmt_duration(start.elapsed()),
                "Ranking provider responded"
            ),
            Err(e) => warn!(
                error = ?e,
                rate_limited = e.is_rate_limited(),
                elapsed = fmt_duration(start.elapsed()),
                "Ranking provider failed, using fallback"
            ),
        }

        Ranking::from_provider(result, candidates, self.settings.fallback_retry_after)
    }

    /// Run the ingestion trigger, joining any run already in progress.
    async fn ingest(&self) -> Result<(), SuggestionError> {
        let ingestor = Arc::clone(&self.ingestor);
        let (result, role) = self
            .ingestion
            .run((), move || async move {
                let start = Instant::now();
                info!("Starting event ingestion");
                let result = ingestor.ingest().await;
                match &result {
                    Ok(()) => info!(
                        elapsed = fmt_duration(start.elapsed()),
                        "Event ingestion finished"
                    ),
                    Err(e) => error!(error = ?e, "Event ingestion failed"),
                }
                result.map_err(Arc::new)
            })
            .await;

        if role == Role::Follower {
            info!("Waited for in-progress event ingestion");
        }

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SuggestionError::IngestionFailed(e)),
            Err(aborted) => Err(SuggestionError::ingestion(anyhow::Error::new(aborted))),
        }
    }
}

/// Sort picks by confidence (highest first, ties keep provider order) and
/// join them with their events. Picks naming an unknown event are dropped.
pub fn resolve_recommendations(
    mut recommendations: Vec<Recommendation>,
    events: &[CandidateEvent],
) -> SuggestionPayload {
    let by_id: HashMap<&str, &CandidateEvent> = events
        .iter()
        .map(|event| (event.source_id.as_str(), event))
        .collect();

    // Numeric comparison so -0.0 and 0.0 tie.
    recommendations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let total = recommendations.len();
    let resolved: Vec<ResolvedRecommendation> = recommendations
        .into_iter()
        .filter_map(|recommendation| {
            let event = by_id.get(recommendation.event_id.as_str())?;
            Some(ResolvedRecommendation {
                event: EventSnapshot::from(*event),
                recommendation,
            })
        })
        .collect();

    if resolved.len() < total {
        warn!(
            dropped = total - resolved.len(),
            "Dropped recommendations referencing unknown events"
        );
    }

    SuggestionPayload {
        recommendations: resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: &str) -> CandidateEvent {
        CandidateEvent {
            source_id: id.to_owned(),
            title: format!("Event {id}"),
            summary: None,
            description: None,
            start_time: Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap(),
            end_time: None,
            location: Some("Espoo".into()),
            price: Some("Free".into()),
            tags: Vec::new(),
            source_url: None,
        }
    }

    fn rec(id: &str, confidence: f32) -> Recommendation {
        Recommendation {
            event_id: id.to_owned(),
            title: format!("Event {id}"),
            reason: "fits".into(),
            confidence,
        }
    }

    fn ids(payload: &SuggestionPayload) -> Vec<&str> {
        payload
            .recommendations
            .iter()
            .map(|r| r.recommendation.event_id.as_str())
            .collect()
    }

    #[test]
    fn sorts_by_confidence_descending() {
        let events = [event("a"), event("b"), event("c")];
        let payload = resolve_recommendations(
            vec![rec("a", 0.2), rec("b", 0.9), rec("c", 0.5)],
            &events,
        );
        let confidences: Vec<f32> = payload
            .recommendations
            .iter()
            .map(|r| r.recommendation.confidence)
            .collect();
        assert_eq!(confidences, [0.9, 0.5, 0.2]);
    }

    #[test]
    fn ties_keep_provider_order() {
        let events = [event("a"), event("b"), event("c")];
        let payload = resolve_recommendations(
            vec![rec("c", 0.5), rec("a", 0.7), rec("b", 0.5)],
            &events,
        );
        assert_eq!(ids(&payload), ["a", "c", "b"]);
    }

    #[test]
    fn signed_zero_confidences_tie() {
        let events = [event("a"), event("b")];
        let payload =
            resolve_recommendations(vec![rec("a", -0.0), rec("b", 0.0)], &events);
        assert_eq!(ids(&payload), ["a", "b"]);
    }

    #[test]
    fn unknown_event_ids_are_dropped() {
        let events = [event("a"), event("b")];
        let payload = resolve_recommendations(
            vec![rec("a", 0.4), rec("ghost", 0.99), rec("b", 0.3)],
            &events,
        );
        assert_eq!(ids(&payload), ["a", "b"]);
        assert_eq!(payload.recommendations[0].event.location.as_deref(), Some("Espoo"));
    }

    #[test]
    fn empty_input_resolves_to_empty_payload() {
        let payload = resolve_recommendations(Vec::new(), &[event("a")]);
        assert!(payload.is_empty());
    }
}
