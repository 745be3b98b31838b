//! Database operations for the `user_preferences` table.

use crate::suggestions::types::NormalizedPreferences;
use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::types::Json;

/// Get a user's normalized preferences, or `None` if onboarding never completed.
pub async fn get(pool: &PgPool, user_id: &str) -> Result<Option<NormalizedPreferences>> {
    let row: Option<Json<NormalizedPreferences>> = sqlx::query_scalar(
        "SELECT normalized_json FROM user_preferences WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch preferences for user {user_id}"))?;

    Ok(row.map(|Json(prefs)| prefs))
}

/// Insert or replace a user's preferences.
pub async fn upsert(
    pool: &PgPool,
    user_id: &str,
    raw_text: &str,
    preferences: &NormalizedPreferences,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_preferences (user_id, raw_text, normalized_json)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET raw_text = EXCLUDED.raw_text,
                      normalized_json = EXCLUDED.normalized_json,
                      updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(raw_text)
    .bind(Json(preferences))
    .execute(pool)
    .await
    .with_context(|| format!("failed to upsert preferences for user {user_id}"))?;
    Ok(())
}
