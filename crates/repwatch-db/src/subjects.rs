use crate::DbError;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackedSubjectRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: Uuid,
    pub subject_type: String,
    pub value: String,
    pub is_competitor: bool,
    pub created_at: DateTime<Utc>,
}

pub struct NewTrackedSubject<'a> {
    pub user_id: Uuid,
    pub subject_type: &'a str,
    pub value: &'a str,
    pub is_competitor: bool,
}

const SUBJECT_COLUMNS: &str =
    "id, public_id, user_id, subject_type, value, is_competitor, created_at";

/// All tracked subjects across users, in id order. The orchestrator's
/// cycle input; failure here is fatal to a cycle.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_tracked_subjects(pool: &PgPool) -> Result<Vec<TrackedSubjectRow>, DbError> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM tracked_subjects ORDER BY id");
    Ok(sqlx::query_as::<_, TrackedSubjectRow>(&sql)
        .fetch_all(pool)
        .await?)
}

/// Subjects tracked by one user, newest first.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn list_subjects_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<TrackedSubjectRow>, DbError> {
    let sql = format!(
        "SELECT {SUBJECT_COLUMNS} FROM tracked_subjects \
         WHERE user_id = $1 ORDER BY created_at DESC"
    );
    Ok(sqlx::query_as::<_, TrackedSubjectRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?)
}

/// Starts tracking a subject. Uniqueness is enforced per
/// (`user_id`, `subject_type`, `value`).
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the subject is already tracked by this
/// user, or `DbError` on database query failure.
pub async fn track_subject(
    pool: &PgPool,
    subject: &NewTrackedSubject<'_>,
) -> Result<TrackedSubjectRow, DbError> {
    let sql = format!(
        "INSERT INTO tracked_subjects (user_id, subject_type, value, is_competitor) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (user_id, subject_type, value) DO NOTHING \
         RETURNING {SUBJECT_COLUMNS}"
    );
    sqlx::query_as::<_, TrackedSubjectRow>(&sql)
        .bind(subject.user_id)
        .bind(subject.subject_type)
        .bind(subject.value)
        .bind(subject.is_competitor)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::Conflict)
}

/// Stops tracking a subject. Returns `true` if a row was deleted.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn untrack_subject(
    pool: &PgPool,
    user_id: Uuid,
    public_id: Uuid,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "DELETE FROM tracked_subjects WHERE user_id = $1 AND public_id = $2",
    )
    .bind(user_id)
    .bind(public_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
