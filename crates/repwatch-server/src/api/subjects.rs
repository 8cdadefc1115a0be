//! Tracked-subject lifecycle: explicit tracking and untracking.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use repwatch_core::SubjectType;
use repwatch_db::{DbError, NewTrackedSubject};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct SubjectListQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TrackSubjectBody {
    pub user_id: Uuid,
    pub subject_type: String,
    pub value: String,
    #[serde(default)]
    pub is_competitor: bool,
}

#[derive(Debug, Serialize)]
pub struct SubjectItem {
    pub public_id: Uuid,
    pub subject_type: String,
    pub value: String,
    pub is_competitor: bool,
    pub created_at: DateTime<Utc>,
}

impl From<repwatch_db::TrackedSubjectRow> for SubjectItem {
    fn from(row: repwatch_db::TrackedSubjectRow) -> Self {
        Self {
            public_id: row.public_id,
            subject_type: row.subject_type,
            value: row.value,
            is_competitor: row.is_competitor,
            created_at: row.created_at,
        }
    }
}

pub async fn list_subjects(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<SubjectListQuery>,
) -> impl IntoResponse {
    match repwatch_db::list_subjects_for_user(&state.pool, query.user_id).await {
        Ok(rows) => {
            let items: Vec<SubjectItem> = rows.into_iter().map(SubjectItem::from).collect();
            Json(ApiResponse {
                data: items,
                meta: ResponseMeta::new(req_id.0),
            })
            .into_response()
        }
        Err(e) => map_db_error(req_id.0, &e).into_response(),
    }
}

pub async fn track_subject(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<TrackSubjectBody>,
) -> impl IntoResponse {
    if SubjectType::parse(&body.subject_type).is_none() {
        return ApiError::new(
            req_id.0,
            "validation_error",
            format!("unknown subject type '{}'", body.subject_type),
        )
        .into_response();
    }
    let value = body.value.trim();
    if value.is_empty() {
        return ApiError::new(req_id.0, "validation_error", "value must not be empty")
            .into_response();
    }

    let new_subject = NewTrackedSubject {
        user_id: body.user_id,
        subject_type: &body.subject_type,
        value,
        is_competitor: body.is_competitor,
    };
    match repwatch_db::track_subject(&state.pool, &new_subject).await {
        Ok(row) => (
            StatusCode::CREATED,
            Json(ApiResponse {
                data: SubjectItem::from(row),
                meta: ResponseMeta::new(req_id.0),
            }),
        )
            .into_response(),
        Err(DbError::Conflict) => {
            ApiError::new(req_id.0, "conflict", "subject is already tracked").into_response()
        }
        Err(e) => map_db_error(req_id.0, &e).into_response(),
    }
}

pub async fn untrack_subject(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(public_id): Path<Uuid>,
    Query(query): Query<SubjectListQuery>,
) -> impl IntoResponse {
    match repwatch_db::untrack_subject(&state.pool, query.user_id, public_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => {
            ApiError::new(req_id.0, "not_found", "subject is not tracked").into_response()
        }
        Err(e) => map_db_error(req_id.0, &e).into_response(),
    }
}
