//! Inspection report endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use homie_common::api::OwnerId;
use serde::Serialize;
use uuid::Uuid;

use super::Owner;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Home, InspectionReport};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeletedReportsResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedReportResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ResendResponse {
    pub email_sent: bool,
}

/// Report and its home, provided the caller owns the home
async fn owned_report(state: &AppState, owner: &OwnerId, report_id: Uuid) -> ApiResult<(Home, InspectionReport)> {
    let report = db::reports::get_report(&state.db, report_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Report {}", report_id)))?;
    let home = state.properties.owned_home(owner, report.home_id).await?;
    Ok((home, report))
}

/// GET /homes/:home_id/reports
pub async fn list_reports(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<Vec<InspectionReport>>> {
    let home = state.properties.owned_home(&owner, home_id).await?;
    Ok(Json(db::reports::list_reports_for_home(&state.db, home.id).await?))
}

/// DELETE /homes/:home_id/reports
pub async fn delete_all_reports(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<DeletedReportsResponse>> {
    let home = state.properties.owned_home(&owner, home_id).await?;
    let deleted = state.links.delete_all_reports(&home).await?;
    Ok(Json(DeletedReportsResponse { deleted }))
}

/// GET /reports/:report_id
pub async fn get_report(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Json<InspectionReport>> {
    let (_, report) = owned_report(&state, &owner, report_id).await?;
    Ok(Json(report))
}

/// DELETE /reports/:report_id
///
/// Reactivates the link the report was submitted through.
pub async fn delete_report(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Json<DeletedReportResponse>> {
    let (home, _) = owned_report(&state, &owner, report_id).await?;
    let deleted = state.links.delete_report(&home, report_id).await?;
    Ok(Json(DeletedReportResponse { deleted }))
}

/// POST /reports/:report_id/resend
pub async fn resend_report(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Json<ResendResponse>> {
    let (home, report) = owned_report(&state, &owner, report_id).await?;
    state.inspections.email_report(&report, &home).await?;
    Ok(Json(ResendResponse { email_sent: true }))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/homes/:home_id/reports", get(list_reports).delete(delete_all_reports))
        .route("/reports/:report_id", get(get_report).delete(delete_report))
        .route("/reports/:report_id/resend", post(resend_report))
}
