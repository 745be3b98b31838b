//! AI-ranked event suggestions: a per-user cache backed by a coalescing,
//! fallback-aware generation pipeline.

pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod service;
pub mod singleflight;
pub mod traits;
pub mod types;

pub use error::SuggestionError;
pub use service::SuggestionService;
pub use traits::{IngestionTrigger, RankingError, RankingProvider, RecordStore};
pub use types::*;

use std::time::Duration;

/// Tunables for cache freshness and generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionSettings {
    /// Length of the candidate window starting at the request time.
    pub window_days: u32,
    /// Maximum events fetched from the store.
    pub event_limit: usize,
    /// Maximum events sent to the ranking provider.
    pub model_limit: usize,
    pub cache_ttl: Duration,
    /// Retry hint attached to rate-limited fallbacks.
    pub fallback_retry_after: Duration,
    /// Upper bound on a single ranking call.
    pub ranking_timeout: Duration,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            window_days: 10,
            event_limit: 25,
            model_limit: 25,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            fallback_retry_after: Duration::from_millis(2000),
            ranking_timeout: Duration::from_secs(60),
        }
    }
}
