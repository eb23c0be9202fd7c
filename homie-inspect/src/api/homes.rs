//! Home endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use super::payload::PhotoPayload;
use super::Owner;
use crate::error::ApiResult;
use crate::models::Home;
use crate::services::HomeUpdate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHomeRequest {
    pub name: String,
    pub owner_email: String,
    #[serde(default)]
    pub owner_display_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Absent field keeps the value, `null` clears it
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateHomeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_display_name: Option<String>,
    #[serde(default)]
    pub owner_email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CoverRequest {
    pub photo: PhotoPayload,
}

/// POST /homes
pub async fn create_home(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<CreateHomeRequest>,
) -> ApiResult<(StatusCode, Json<Home>)> {
    let home = state
        .properties
        .create_home(
            &owner,
            &request.name,
            request.owner_display_name,
            &request.owner_email,
            request.address,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(home)))
}

/// GET /homes
pub async fn list_homes(State(state): State<AppState>, Owner(owner): Owner) -> ApiResult<Json<Vec<Home>>> {
    Ok(Json(state.properties.list_homes(&owner).await?))
}

/// GET /homes/:home_id
pub async fn get_home(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<Home>> {
    Ok(Json(state.properties.owned_home(&owner, home_id).await?))
}

/// PATCH /homes/:home_id
pub async fn update_home(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
    Json(request): Json<UpdateHomeRequest>,
) -> ApiResult<Json<Home>> {
    let update = HomeUpdate {
        name: request.name,
        owner_display_name: request.owner_display_name,
        owner_email: request.owner_email,
        address: request.address,
    };
    Ok(Json(state.properties.update_home(&owner, home_id, update).await?))
}

/// DELETE /homes/:home_id
pub async fn delete_home(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.properties.delete_home(&owner, home_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /homes/:home_id/cover
pub async fn set_cover(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
    Json(request): Json<CoverRequest>,
) -> ApiResult<Json<Home>> {
    let photo = request.photo.decode()?;
    Ok(Json(state.properties.set_cover(&owner, home_id, photo).await?))
}

/// DELETE /homes/:home_id/cover
pub async fn remove_cover(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<Home>> {
    Ok(Json(state.properties.remove_cover(&owner, home_id).await?))
}

pub fn home_routes() -> Router<AppState> {
    Router::new()
        .route("/homes", get(list_homes).post(create_home))
        .route(
            "/homes/:home_id",
            get(get_home).patch(update_home).delete(delete_home),
        )
        .route("/homes/:home_id/cover", put(set_cover).delete(remove_cover))
}
