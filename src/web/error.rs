//! JSON error responses for the HTTP API.

use crate::suggestions::SuggestionError;
use crate::utils::ceil_secs;
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

/// Machine-readable error codes returned in the `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    PreferencesMissing,
    IngestionFailed,
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::PreferencesMissing => StatusCode::CONFLICT,
            ApiErrorCode::IngestionFailed => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl From<SuggestionError> for ApiError {
    fn from(err: SuggestionError) -> Self {
        match &err {
            SuggestionError::PreferencesMissing { .. } => {
                ApiError::new(ApiErrorCode::PreferencesMissing, err.to_string())
            }
            SuggestionError::IngestionFailed(_) => {
                warn!(error = %err, "Event ingestion failed during suggestion request");
                ApiError::new(ApiErrorCode::IngestionFailed, err.to_string())
                    .with_retry_after(Duration::from_secs(30))
            }
            SuggestionError::Store(_) | SuggestionError::GenerationAborted(_) => {
                error!(error = %err, "Suggestion request failed");
                ApiError::new(ApiErrorCode::InternalError, "Failed to load suggestions")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let retry_after = self.retry_after;
        let mut response = (status, Json(self)).into_response();
        if let Some(retry_after) = retry_after
            && let Ok(value) = HeaderValue::from_str(&ceil_secs(retry_after).to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn maps_suggestion_errors_to_status() {
        let missing: ApiError = SuggestionError::PreferencesMissing {
            user_id: "u1".into(),
        }
        .into();
        assert_eq!(missing.code.status(), StatusCode::CONFLICT);
        assert!(missing.message.contains("u1"));

        let ingest: ApiError = SuggestionError::ingestion(anyhow::anyhow!("exit 1")).into();
        assert_eq!(ingest.code, ApiErrorCode::IngestionFailed);

        let store: ApiError = SuggestionError::Store(Arc::new(anyhow::anyhow!("pool closed"))).into();
        assert_eq!(store.code.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!store.message.contains("pool closed"));
    }

    #[test]
    fn code_statuses() {
        let cases = [
            (ApiErrorCode::PreferencesMissing, StatusCode::CONFLICT),
            (ApiErrorCode::IngestionFailed, StatusCode::SERVICE_UNAVAILABLE),
            (ApiErrorCode::InternalError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            assert_eq!(code.status(), status, "{code:?}");
        }
    }

    #[test]
    fn retry_after_header_rounds_up() {
        let response = ApiError::new(ApiErrorCode::IngestionFailed, "later")
            .with_retry_after(Duration::from_millis(1500))
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn code_serializes_screaming_snake() {
        let json = serde_json::to_value(ApiError::new(ApiErrorCode::PreferencesMissing, "x")).unwrap();
        assert_eq!(json["code"], "PREFERENCES_MISSING");
        assert_eq!(json["message"], "x");
    }
}
