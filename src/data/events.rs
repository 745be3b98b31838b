//! Database operations for the `events` table.

use crate::suggestions::types::CandidateEvent;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// One row of the candidate query. `location` is already collapsed from the
/// three location columns.
#[derive(sqlx::FromRow)]
struct EventRow {
    source_id: String,
    title: String,
    summary: Option<String>,
    description: Option<String>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    location: Option<String>,
    price: Option<String>,
    tags: Vec<String>,
    source_url: Option<String>,
}

impl From<EventRow> for CandidateEvent {
    fn from(row: EventRow) -> Self {
        Self {
            source_id: row.source_id,
            title: row.title,
            summary: row.summary,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            location: row.location,
            price: row.price,
            tags: row.tags,
            source_url: row.source_url,
        }
    }
}

/// An event as written by ingestion, with the raw location columns.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub source_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub city: Option<String>,
    pub price: Option<String>,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
}

/// Events starting in `[start, end)`, earliest first.
///
/// The location is the first non-empty of name, address and city.
pub async fn find_upcoming(
    pool: &PgPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<CandidateEvent>> {
    let rows = sqlx::query_as::<_, EventRow>(
        r#"
        SELECT source_id, title, summary, description, start_time, end_time,
               COALESCE(NULLIF(location_name, ''), NULLIF(location_address, ''), NULLIF(city, '')) AS location,
               price, tags, source_url
        FROM events
        WHERE start_time >= $1 AND start_time < $2
        ORDER BY start_time ASC, source_id ASC
        LIMIT $3
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch upcoming events")?;

    Ok(rows.into_iter().map(CandidateEvent::from).collect())
}

/// Batch upsert events keyed by `source_id`.
pub async fn batch_upsert(pool: &PgPool, events: &[NewEvent]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await.context("failed to begin event upsert")?;
    for event in events {
        sqlx::query(
            r#"
            INSERT INTO events (source_id, title, summary, description, start_time, end_time,
                                location_name, location_address, city, price, tags, source_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (source_id)
            DO UPDATE SET title = EXCLUDED.title,
                          summary = EXCLUDED.summary,
                          description = EXCLUDED.description,
                          start_time = EXCLUDED.start_time,
                          end_time = EXCLUDED.end_time,
                          location_name = EXCLUDED.location_name,
                          location_address = EXCLUDED.location_address,
                          city = EXCLUDED.city,
                          price = EXCLUDED.price,
                          tags = EXCLUDED.tags,
                          source_url = EXCLUDED.source_url,
                          updated_at = now()
            "#,
        )
        .bind(&event.source_id)
        .bind(&event.title)
        .bind(&event.summary)
        .bind(&event.description)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location_name)
        .bind(&event.location_address)
        .bind(&event.city)
        .bind(&event.price)
        .bind(&event.tags)
        .bind(&event.source_url)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert event {}", event.source_id))?;
    }
    tx.commit().await.context("failed to commit event upsert")?;
    Ok(())
}
