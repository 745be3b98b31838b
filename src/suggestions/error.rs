//! Error taxonomy surfaced by [`SuggestionService`](super::SuggestionService).
//!
//! Ranking provider failures never appear here: they are recovered locally
//! into a degraded result (see [`Ranking`](super::fallback::Ranking)).

use std::sync::Arc;

/// Failure of a suggestion request.
///
/// `Clone` so a single generation result can be handed to every waiter of
/// the same in-flight run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SuggestionError {
    /// The user has not finished onboarding. Not retried.
    #[error("preferences not found for user {user_id}; complete onboarding first")]
    PreferencesMissing { user_id: String },
    /// The event pool was empty and refreshing it failed. Callers may retry later.
    #[error("couldn't refresh events right now: {0:#}")]
    IngestionFailed(Arc<anyhow::Error>),
    /// A record store read or write failed.
    #[error("record store failure: {0:#}")]
    Store(Arc<anyhow::Error>),
    /// The generation task died before producing a result.
    #[error("suggestion generation aborted: {0}")]
    GenerationAborted(String),
}

impl SuggestionError {
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(Arc::new(err))
    }

    pub fn ingestion(err: anyhow::Error) -> Self {
        Self::IngestionFailed(Arc::new(err))
    }

    /// Whether the caller should redirect the user rather than retry.
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Self::PreferencesMissing { .. })
    }
}
