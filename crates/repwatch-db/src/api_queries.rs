//! Read-API queries consumed by the dashboard layer.
//!
//! This is the sole contract the UI depends on: mentions filtered by
//! subject/source/time-range/crisis-flag, newest first.

use crate::mentions::MentionRow;
use crate::DbError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Default, Clone)]
pub struct MentionFilter {
    pub subject: Option<String>,
    pub source: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub is_crisis: Option<bool>,
    pub limit: i64,
}

/// Mentions matching the filter, sorted by `created_at DESC`.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_mentions(
    pool: &PgPool,
    filter: &MentionFilter,
) -> Result<Vec<MentionRow>, DbError> {
    let rows = sqlx::query_as::<_, MentionRow>(
        "SELECT id, public_id, user_id, subject, source, community, external_ref, \
                text, author, created_at, sentiment, crisis_score, is_crisis, \
                is_competitor, processed, alert_queued, alerted_at, collected_at \
         FROM mentions \
         WHERE ($1::TEXT IS NULL OR subject = $1) \
           AND ($2::TEXT IS NULL OR source = $2) \
           AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3) \
           AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4) \
           AND ($5::BOOLEAN IS NULL OR is_crisis = $5) \
         ORDER BY created_at DESC LIMIT $6",
    )
    .bind(&filter.subject)
    .bind(&filter.source)
    .bind(filter.since)
    .bind(filter.until)
    .bind(filter.is_crisis)
    .bind(filter.limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
