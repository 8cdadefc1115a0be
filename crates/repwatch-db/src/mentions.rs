use crate::DbError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MentionRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub source: String,
    pub community: Option<String>,
    pub external_ref: String,
    pub text: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sentiment: String,
    pub crisis_score: f64,
    pub is_crisis: bool,
    pub is_competitor: bool,
    pub processed: bool,
    pub alert_queued: bool,
    pub alerted_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
}

pub struct UpsertMention<'a> {
    pub user_id: Uuid,
    pub subject: &'a str,
    pub source: &'a str,
    pub community: Option<&'a str>,
    pub external_ref: &'a str,
    pub text: &'a str,
    pub author: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub sentiment: &'a str,
    pub crisis_score: f64,
    pub is_crisis: bool,
    pub is_competitor: bool,
}

const MENTION_COLUMNS: &str = "id, public_id, user_id, subject, source, community, external_ref, \
     text, author, created_at, sentiment, crisis_score, is_crisis, is_competitor, \
     processed, alert_queued, alerted_at, collected_at";

/// Idempotently store a mention. Dedup key: (`source`, `external_ref`).
///
/// A second upsert for an existing key updates mutable fields (text,
/// sentiment, score, crisis flag) but never resets the alert state machine
/// (`processed`, `alert_queued`, `alerted_at`) or identity/creation fields.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn upsert_mention(
    pool: &PgPool,
    mention: &UpsertMention<'_>,
) -> Result<MentionRow, DbError> {
    let sql = format!(
        "INSERT INTO mentions \
           (user_id, subject, source, community, external_ref, text, author, \
            created_at, sentiment, crisis_score, is_crisis, is_competitor) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (source, external_ref) DO UPDATE SET \
           text = EXCLUDED.text, \
           author = COALESCE(EXCLUDED.author, mentions.author), \
           sentiment = EXCLUDED.sentiment, \
           crisis_score = EXCLUDED.crisis_score, \
           is_crisis = EXCLUDED.is_crisis, \
           updated_at = NOW() \
         RETURNING {MENTION_COLUMNS}"
    );
    let row = sqlx::query_as::<_, MentionRow>(&sql)
        .bind(mention.user_id)
        .bind(mention.subject)
        .bind(mention.source)
        .bind(mention.community)
        .bind(mention.external_ref)
        .bind(mention.text)
        .bind(mention.author)
        .bind(mention.created_at)
        .bind(mention.sentiment)
        .bind(mention.crisis_score)
        .bind(mention.is_crisis)
        .bind(mention.is_competitor)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Crisis mentions the alert pass has not yet fully attempted, oldest first.
/// Bounded by `limit` so each orchestrator cycle does bounded work.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_unprocessed_crisis_mentions(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<MentionRow>, DbError> {
    let sql = format!(
        "SELECT {MENTION_COLUMNS} FROM mentions \
         WHERE is_crisis AND NOT alert_queued \
         ORDER BY created_at ASC LIMIT $1"
    );
    Ok(sqlx::query_as::<_, MentionRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// Marks a mention as evaluated by the alert pass. Idempotent.
///
/// Non-crisis mentions are marked too, so polling cycles do not re-evaluate
/// them forever.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn mark_processed(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query("UPDATE mentions SET processed = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Marks a mention's alert dispatch as complete. Idempotent; `alerted_at`
/// is set once and never overwritten.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn mark_alerted(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE mentions SET \
           alert_queued = TRUE, \
           alerted_at = COALESCE(alerted_at, NOW()), \
           processed = TRUE, \
           updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks every unprocessed non-crisis mention as evaluated. The alert pass
/// calls this once per cycle so calm mentions are not re-examined forever.
///
/// Returns the number of rows updated.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn mark_non_crisis_processed(pool: &PgPool) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE mentions SET processed = TRUE, updated_at = NOW() \
         WHERE NOT processed AND NOT is_crisis",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
