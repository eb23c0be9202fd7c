//! Tenant link endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Owner;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::TenantLink;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub tenant_name: String,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    pub link: TenantLink,
    pub inspection_url: String,
    pub short_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActiveCountResponse {
    pub active_count: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteLinkResponse {
    pub deleted_report_id: Option<Uuid>,
}

/// POST /homes/:home_id/links
pub async fn create_link(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
    Json(request): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<CreateLinkResponse>)> {
    if request.tenant_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Tenant name is required".to_string()));
    }
    let home = state.properties.owned_home(&owner, home_id).await?;

    let link = state
        .links
        .create_link(&home, &request.tenant_name, request.valid_until)
        .await?;
    let response = CreateLinkResponse {
        inspection_url: state.links.inspection_url(&link),
        short_url: link.short_url.clone(),
        link,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /homes/:home_id/links
pub async fn list_links(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TenantLink>>> {
    let home = state.properties.owned_home(&owner, home_id).await?;
    Ok(Json(db::links::list_links_for_home(&state.db, home.id).await?))
}

/// GET /homes/:home_id/links/active-count
pub async fn active_count(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<ActiveCountResponse>> {
    let home = state.properties.owned_home(&owner, home_id).await?;
    let active_count = db::links::count_active_links(&state.db, home.id, &Utc::now()).await?;
    Ok(Json(ActiveCountResponse { active_count }))
}

/// GET /homes/:home_id/links/:link_id
pub async fn get_link(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, link_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<TenantLink>> {
    let home = state.properties.owned_home(&owner, home_id).await?;
    Ok(Json(state.links.get_link(&home, link_id).await?))
}

/// DELETE /homes/:home_id/links/:link_id
///
/// Also deletes the report the link produced and drops any open session.
pub async fn delete_link(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, link_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DeleteLinkResponse>> {
    let home = state.properties.owned_home(&owner, home_id).await?;
    let deleted_report_id = state.links.delete_link(&home, link_id).await?;
    state.inspections.sessions().forget_link(link_id).await;
    Ok(Json(DeleteLinkResponse { deleted_report_id }))
}

pub fn link_routes() -> Router<AppState> {
    Router::new()
        .route("/homes/:home_id/links", get(list_links).post(create_link))
        .route("/homes/:home_id/links/active-count", get(active_count))
        .route("/homes/:home_id/links/:link_id", get(get_link).delete(delete_link))
}
