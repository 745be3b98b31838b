//! `GET /api/users/{user_id}/suggestions`

use crate::state::AppState;
use crate::suggestions::{SuggestionPayload, SuggestionResponse, SuggestionSource};
use crate::utils::ceil_secs;
use crate::web::error::ApiError;
use crate::web::routes::cache;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{Instrument, info_span};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsBody {
    pub suggestions: SuggestionPayload,
    pub source: SuggestionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<SuggestionResponse> for SuggestionsBody {
    fn from(response: SuggestionResponse) -> Self {
        Self {
            suggestions: response.payload,
            source: response.source,
            retry_after_ms: response
                .retry_after
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

pub(super) async fn get_suggestions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let span = info_span!("suggestions_request", user_id = %user_id);
    let response = state
        .suggestions
        .get_suggestions(&user_id)
        .instrument(span)
        .await?;

    let retry_after = response.retry_after;
    let mut http = Json(SuggestionsBody::from(response)).into_response();
    let headers = http.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache::PRIVATE));
    if let Some(retry_after) = retry_after
        && let Ok(value) = HeaderValue::from_str(&ceil_secs(retry_after).to_string())
    {
        headers.insert(header::RETRY_AFTER, value);
    }
    Ok(http)
}
