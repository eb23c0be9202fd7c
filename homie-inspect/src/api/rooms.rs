//! Room endpoints, including photo upload and analysis

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::payload::{decode_photos, PhotoPayload};
use super::Owner;
use crate::error::ApiResult;
use crate::models::Room;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RoomNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadPhotosRequest {
    pub photos: Vec<PhotoPayload>,
}

#[derive(Debug, Deserialize)]
pub struct RemovePhotoQuery {
    pub url: String,
}

/// POST /homes/:home_id/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
    Json(request): Json<RoomNameRequest>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let room = state.properties.create_room(&owner, home_id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /homes/:home_id/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(home_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Room>>> {
    Ok(Json(state.properties.list_rooms(&owner, home_id).await?))
}

/// GET /homes/:home_id/rooms/:room_id
pub async fn get_room(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, room_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Room>> {
    let (_, room) = state.properties.owned_room(&owner, home_id, room_id).await?;
    Ok(Json(room))
}

/// PATCH /homes/:home_id/rooms/:room_id
pub async fn rename_room(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, room_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<RoomNameRequest>,
) -> ApiResult<Json<Room>> {
    let room = state
        .properties
        .rename_room(&owner, home_id, room_id, &request.name)
        .await?;
    Ok(Json(room))
}

/// DELETE /homes/:home_id/rooms/:room_id
pub async fn delete_room(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, room_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.properties.delete_room(&owner, home_id, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /homes/:home_id/rooms/:room_id/photos
///
/// Stores the photos and merges their inventory into the room's.
pub async fn upload_photos(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, room_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UploadPhotosRequest>,
) -> ApiResult<Json<Room>> {
    let photos = decode_photos(&request.photos)?;
    let (home, room) = state.properties.owned_room(&owner, home_id, room_id).await?;

    match state.rooms.upload_photos(&home, &room, photos).await {
        Ok(room) => Ok(Json(room)),
        Err(err) => {
            state.record_error(format!("Room {} upload: {}", room_id, err)).await;
            Err(err)
        }
    }
}

/// DELETE /homes/:home_id/rooms/:room_id/photos?url=…
///
/// Removes one photo and re-analyzes the remaining ones.
pub async fn remove_photo(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, room_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RemovePhotoQuery>,
) -> ApiResult<Json<Room>> {
    let (home, room) = state.properties.owned_room(&owner, home_id, room_id).await?;
    Ok(Json(state.rooms.remove_photo(&home, &room, &query.url).await?))
}

/// DELETE /homes/:home_id/rooms/:room_id/analysis
pub async fn clear_analysis(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path((home_id, room_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Room>> {
    let (home, room) = state.properties.owned_room(&owner, home_id, room_id).await?;
    Ok(Json(state.rooms.clear(&home, &room).await?))
}

pub fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/homes/:home_id/rooms", get(list_rooms).post(create_room))
        .route(
            "/homes/:home_id/rooms/:room_id",
            get(get_room).patch(rename_room).delete(delete_room),
        )
        .route(
            "/homes/:home_id/rooms/:room_id/photos",
            post(upload_photos).delete(remove_photo),
        )
        .route("/homes/:home_id/rooms/:room_id/analysis", delete(clear_analysis))
}
