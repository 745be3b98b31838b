//! Heuristic ranking used when the ranking provider cannot be reached.

use crate::suggestions::traits::RankingError;
use crate::suggestions::types::{CandidateEvent, Recommendation};
use std::time::Duration;

/// Number of upcoming events offered when ranking is degraded.
pub const FALLBACK_PICKS: usize = 3;

/// Confidence attached to every degraded pick.
pub const FALLBACK_CONFIDENCE: f32 = 0.25;

pub const FALLBACK_REASON: &str = "Showing upcoming events while personalized recommendations \
     catch up. Check the details to see if they fit your interests.";

/// Outcome of the ranking step. Callers must branch on it explicitly: only
/// `Ranked` results are ever persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Ranking {
    Ranked(Vec<Recommendation>),
    Degraded {
        recommendations: Vec<Recommendation>,
        retry_after: Option<Duration>,
    },
}

impl Ranking {
    /// Fold a provider result into a ranking, substituting the heuristic on failure.
    ///
    /// Rate-limited failures carry the fixed `rate_limit_retry` hint; every
    /// other failure degrades without one.
    pub fn from_provider(
        result: Result<Vec<Recommendation>, RankingError>,
        candidates: &[CandidateEvent],
        rate_limit_retry: Duration,
    ) -> Self {
        match result {
            Ok(recommendations) => Ranking::Ranked(recommendations),
            Err(RankingError::RateLimited(_)) => Ranking::Degraded {
                recommendations: fallback_recommendations(candidates),
                retry_after: Some(rate_limit_retry),
            },
            Err(_) => Ranking::Degraded {
                recommendations: fallback_recommendations(candidates),
                retry_after: None,
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Ranking::Degraded { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Ranking::Ranked(_) => None,
            Ranking::Degraded { retry_after, .. } => *retry_after,
        }
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        match self {
            Ranking::Ranked(recommendations) => recommendations,
            Ranking::Degraded {
                recommendations, ..
            } => recommendations,
        }
    }

    pub fn into_recommendations(self) -> Vec<Recommendation> {
        match self {
            Ranking::Ranked(recommendations) => recommendations,
            Ranking::Degraded {
                recommendations, ..
            } => recommendations,
        }
    }
}

/// The first few candidates in fetch order, each wrapped with a fixed low confidence.
pub fn fallback_recommendations(candidates: &[CandidateEvent]) -> Vec<Recommendation> {
    candidates
        .iter()
        .take(FALLBACK_PICKS)
        .map(|event| Recommendation {
            event_id: event.source_id.clone(),
            title: event.title.clone(),
            reason: FALLBACK_REASON.to_owned(),
            confidence: FALLBACK_CONFIDENCE,
        })
        .collect()
}
