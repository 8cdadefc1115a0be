use crate::DbError;
use sqlx::PgPool;
use uuid::Uuid;

/// Per-user alert channel preferences. Read-only input to the dispatcher.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertSettingsRow {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub email_enabled: bool,
    pub webhook_url: Option<String>,
    pub webhook_enabled: bool,
    pub sms_to: Option<String>,
    pub sms_enabled: bool,
}

const SETTINGS_COLUMNS: &str =
    "user_id, email, email_enabled, webhook_url, webhook_enabled, sms_to, sms_enabled";

/// Channel preferences for one user; `None` when the user never configured
/// alerting (the dispatcher then skips the mention).
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn get_alert_settings(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<AlertSettingsRow>, DbError> {
    let sql = format!("SELECT {SETTINGS_COLUMNS} FROM alert_settings WHERE user_id = $1");
    Ok(sqlx::query_as::<_, AlertSettingsRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

/// Creates or replaces a user's channel preferences.
///
/// # Errors
///
/// Returns `DbError` on database query failure.
pub async fn upsert_alert_settings(
    pool: &PgPool,
    settings: &AlertSettingsRow,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO alert_settings \
           (user_id, email, email_enabled, webhook_url, webhook_enabled, sms_to, sms_enabled) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (user_id) DO UPDATE SET \
           email = EXCLUDED.email, \
           email_enabled = EXCLUDED.email_enabled, \
           webhook_url = EXCLUDED.webhook_url, \
           webhook_enabled = EXCLUDED.webhook_enabled, \
           sms_to = EXCLUDED.sms_to, \
           sms_enabled = EXCLUDED.sms_enabled, \
           updated_at = NOW()",
    )
    .bind(settings.user_id)
    .bind(&settings.email)
    .bind(settings.email_enabled)
    .bind(&settings.webhook_url)
    .bind(settings.webhook_enabled)
    .bind(&settings.sms_to)
    .bind(settings.sms_enabled)
    .execute(pool)
    .await?;
    Ok(())
}
