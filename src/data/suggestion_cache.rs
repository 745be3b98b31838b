//! Database operations for the `suggestion_cache` table.

use crate::suggestions::types::{SuggestionCacheEntry, SuggestionPayload};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

#[derive(sqlx::FromRow)]
struct CacheRow {
    user_id: String,
    suggestions_json: Json<SuggestionPayload>,
    generated_at: DateTime<Utc>,
}

/// Retrieve the cached suggestions for a user, or `None` if never generated.
pub async fn get(pool: &PgPool, user_id: &str) -> Result<Option<SuggestionCacheEntry>> {
    let row = sqlx::query_as::<_, CacheRow>(
        "SELECT user_id, suggestions_json, generated_at FROM suggestion_cache WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch suggestion cache for user {user_id}"))?;

    Ok(row.map(|row| SuggestionCacheEntry {
        user_id: row.user_id,
        payload: row.suggestions_json.0,
        generated_at: row.generated_at,
    }))
}

/// Insert or overwrite the cached suggestions for a user.
pub async fn upsert(
    pool: &PgPool,
    user_id: &str,
    payload: &SuggestionPayload,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO suggestion_cache (user_id, suggestions_json, generated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET suggestions_json = EXCLUDED.suggestions_json,
                      generated_at = EXCLUDED.generated_at
        "#,
    )
    .bind(user_id)
    .bind(Json(payload))
    .bind(generated_at)
    .execute(pool)
    .await
    .with_context(|| format!("failed to upsert suggestion cache for user {user_id}"))?;
    Ok(())
}
