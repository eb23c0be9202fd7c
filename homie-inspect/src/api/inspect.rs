//! Tenant inspection endpoints
//!
//! No owner identity here: the link id in the path is the capability.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::payload::{decode_photos, PhotoPayload};
use crate::error::ApiResult;
use crate::services::inspection_session::SessionView;
use crate::services::{OpenOutcome, SubmissionOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Room the photos were taken in; rejected if the session moved on
    #[serde(default)]
    pub room_id: Option<Uuid>,
    pub photos: Vec<PhotoPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /inspect/:home_id/links/:link_id/open
pub async fn open_link(
    State(state): State<AppState>,
    Path((home_id, link_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<OpenOutcome>> {
    Ok(Json(state.inspections.open(home_id, link_id).await?))
}

/// GET /inspect/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.inspections.view(session_id).await?))
}

/// POST /inspect/sessions/:session_id/analyze
pub async fn analyze_room(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<SessionView>> {
    let photos = decode_photos(&request.photos)?;
    Ok(Json(state.inspections.analyze(session_id, request.room_id, photos).await?))
}

/// POST /inspect/sessions/:session_id/confirm
pub async fn confirm_room(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    request: Option<Json<ConfirmRequest>>,
) -> ApiResult<Json<SessionView>> {
    let notes = request.and_then(|Json(r)| r.notes);
    Ok(Json(state.inspections.confirm(session_id, notes).await?))
}

/// POST /inspect/sessions/:session_id/next
pub async fn next_room(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.inspections.next(session_id).await?))
}

/// POST /inspect/sessions/:session_id/previous
pub async fn previous_room(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    Ok(Json(state.inspections.previous(session_id).await?))
}

/// POST /inspect/sessions/:session_id/submit
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SubmissionOutcome>> {
    let outcome = state.inspections.submit_session(session_id).await?;
    if let Some(warning) = &outcome.warning {
        state
            .record_error(format!("Report {}: {}", outcome.report_id, warning))
            .await;
    }
    Ok(Json(outcome))
}

pub fn inspect_routes() -> Router<AppState> {
    Router::new()
        .route("/inspect/:home_id/links/:link_id/open", post(open_link))
        .route("/inspect/sessions/:session_id", get(get_session))
        .route("/inspect/sessions/:session_id/analyze", post(analyze_room))
        .route("/inspect/sessions/:session_id/confirm", post(confirm_room))
        .route("/inspect/sessions/:session_id/next", post(next_room))
        .route("/inspect/sessions/:session_id/previous", post(previous_room))
        .route("/inspect/sessions/:session_id/submit", post(submit))
}
