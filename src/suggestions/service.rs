//! Per-user suggestion cache in front of the generation pipeline.
//!
//! Requests are served from the cache row while it is younger than the TTL.
//! On a miss, concurrent requests for the same user are coalesced into one
//! generation run via [`Singleflight`]; every caller receives that run's
//! outcome, including its `source` and retry hint.

use crate::suggestions::SuggestionSettings;
use crate::suggestions::error::SuggestionError;
use crate::suggestions::pipeline::GenerationPipeline;
use crate::suggestions::singleflight::{Role, Singleflight};
use crate::suggestions::traits::{IngestionTrigger, RankingProvider, RecordStore};
use crate::suggestions::types::{GenerationOutcome, SuggestionResponse, SuggestionSource};
use crate::utils::fmt_duration;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};

type GenerationResult = Result<GenerationOutcome, SuggestionError>;

/// Entry point for suggestion requests. Clone-cheap; clones share the
/// in-flight registries.
#[derive(Clone)]
pub struct SuggestionService {
    store: Arc<dyn RecordStore>,
    pipeline: GenerationPipeline,
    generations: Singleflight<String, GenerationResult>,
    settings: SuggestionSettings,
}

impl SuggestionService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ranker: Arc<dyn RankingProvider>,
        ingestor: Arc<dyn IngestionTrigger>,
        settings: SuggestionSettings,
    ) -> Self {
        let pipeline = GenerationPipeline::new(
            Arc::clone(&store),
            ranker,
            ingestor,
            Singleflight::new(),
            settings.clone(),
        );
        Self {
            store,
            pipeline,
            generations: Singleflight::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &SuggestionSettings {
        &self.settings
    }

    /// Number of users with a generation currently running.
    pub fn generations_in_flight(&self) -> usize {
        self.generations.len()
    }

    pub async fn get_suggestions(&self, user_id: &str) -> Result<SuggestionResponse, SuggestionError> {
        self.get_suggestions_at(user_id, Utc::now()).await
    }

    /// Like [`get_suggestions`](Self::get_suggestions), evaluated as of `now`.
    pub async fn get_suggestions_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SuggestionResponse, SuggestionError> {
        let preferences = self
            .store
            .get_user_preferences(user_id)
            .await
            .map_err(SuggestionError::store)?
            .ok_or_else(|| SuggestionError::PreferencesMissing {
                user_id: user_id.to_owned(),
            })?;

        let cached = self
            .store
            .get_suggestion_cache(user_id)
            .await
            .map_err(SuggestionError::store)?;

        if let Some(entry) = cached {
            let age = entry.age(now);
            if entry.is_fresh(now, self.settings.cache_ttl) {
                info!(
                    user_id,
                    age = fmt_duration(age),
                    recommendations = entry.payload.len(),
                    "Serving cached suggestions"
                );
                return Ok(SuggestionResponse {
                    payload: entry.payload,
                    source: SuggestionSource::Cache,
                    retry_after: None,
                });
            }
            info!(user_id, age = fmt_duration(age), "Cached suggestions expired, refreshing");
        }

        let pipeline = self.pipeline.clone();
        let owned_user_id = user_id.to_owned();
        let (result, role) = self
            .generations
            .run(user_id.to_owned(), move || {
                let span = info_span!("generate_suggestions", user_id = %owned_user_id);
                async move { pipeline.generate(&owned_user_id, &preferences, now).await }
                    .instrument(span)
            })
            .await;

        if role == Role::Follower {
            info!(user_id, "Joined in-flight suggestion generation");
        }

        let outcome = result.map_err(|aborted| SuggestionError::GenerationAborted(aborted.0))??;
        debug!(
            user_id,
            source = outcome.source().as_str(),
            recommendations = outcome.payload.len(),
            "Suggestions generated"
        );
        Ok(outcome.into())
    }
}
