//! Inbound poll trigger. Returns 200 with the cycle report on any
//! completed run (even with per-subject failures), 409 when a cycle is
//! already in flight, and 500 only on fatal orchestrator-level errors.

use axum::{extract::State, response::IntoResponse, Extension, Json};

use repwatch_poller::CycleError;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

pub async fn run_poll_cycle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    match state.poller.run_cycle().await {
        Ok(report) => Json(ApiResponse {
            data: report,
            meta: ResponseMeta::new(req_id.0),
        })
        .into_response(),
        Err(CycleError::CycleInProgress) => ApiError::new(
            req_id.0,
            "cycle_in_progress",
            "a poll cycle is already running",
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "poll cycle failed fatally");
            ApiError::new(req_id.0, "internal_error", e.to_string()).into_response()
        }
    }
}
