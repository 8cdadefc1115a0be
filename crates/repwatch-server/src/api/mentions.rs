//! Read API for the dashboard layer: mentions by subject/source/time-range/
//! crisis-flag, newest first.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repwatch_db::MentionFilter;

use super::{map_db_error, normalize_limit, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct MentionQuery {
    pub subject: Option<String>,
    pub source: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub is_crisis: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MentionItem {
    pub public_id: Uuid,
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
    pub alerted_at: Option<DateTime<Utc>>,
}

pub async fn list_mentions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<MentionQuery>,
) -> impl IntoResponse {
    let filter = MentionFilter {
        subject: query.subject,
        source: query.source,
        since: query.since,
        until: query.until,
        is_crisis: query.is_crisis,
        limit: normalize_limit(query.limit),
    };

    match repwatch_db::list_mentions(&state.pool, &filter).await {
        Ok(rows) => {
            let items: Vec<MentionItem> = rows
                .into_iter()
                .map(|row| MentionItem {
                    public_id: row.public_id,
                    subject: row.subject,
                    source: row.source,
                    community: row.community,
                    external_ref: row.external_ref,
                    text: row.text,
                    author: row.author,
                    created_at: row.created_at,
                    sentiment: row.sentiment,
                    crisis_score: row.crisis_score,
                    is_crisis: row.is_crisis,
                    is_competitor: row.is_competitor,
                    alerted_at: row.alerted_at,
                })
                .collect();
            Json(ApiResponse {
                data: items,
                meta: ResponseMeta::new(req_id.0),
            })
            .into_response()
        }
        Err(e) => map_db_error(req_id.0, &e).into_response(),
    }
}
