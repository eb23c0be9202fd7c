//! Owner home and room management
//!
//! Deleting a home runs as a saga: photo storage first (best effort, already
//! missing files are fine), then every record of the home in a single
//! transaction.

use std::sync::Arc;

use homie_common::api::OwnerId;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Home, PhotoData, Room};
use crate::services::photo_store::{PhotoScope, PhotoStore, StorageError};
use crate::services::session_registry::SessionRegistry;
use crate::utils::retry_on_lock;

/// Fields an owner may change on a home
///
/// `address` distinguishes "leave as is" (`None`) from "clear"
/// (`Some(None)`).
#[derive(Debug, Default, Clone)]
pub struct HomeUpdate {
    pub name: Option<String>,
    pub owner_display_name: Option<String>,
    pub owner_email: Option<String>,
    pub address: Option<Option<String>>,
}

fn required(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Homes and rooms of owners
#[derive(Clone)]
pub struct PropertyManager {
    db: SqlitePool,
    photos: Arc<dyn PhotoStore>,
    sessions: SessionRegistry,
}

impl PropertyManager {
    pub fn new(db: SqlitePool, photos: Arc<dyn PhotoStore>, sessions: SessionRegistry) -> Self {
        Self { db, photos, sessions }
    }

    /// Home owned by `owner`
    ///
    /// A missing home is 404; somebody else's home is 403.
    pub async fn owned_home(&self, owner: &OwnerId, home_id: Uuid) -> ApiResult<Home> {
        let home = db::homes::get_home(&self.db, home_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Home {}", home_id)))?;
        if !home.is_owned_by(owner.as_str()) {
            tracing::warn!(home_id = %home_id, "Home access by non-owner denied");
            return Err(ApiError::PermissionDenied(format!("Home {} belongs to another owner", home_id)));
        }
        Ok(home)
    }

    /// Room of an owned home
    pub async fn owned_room(&self, owner: &OwnerId, home_id: Uuid, room_id: Uuid) -> ApiResult<(Home, Room)> {
        let home = self.owned_home(owner, home_id).await?;
        let room = self.room_of(&home, room_id).await?;
        Ok((home, room))
    }

    async fn room_of(&self, home: &Home, room_id: Uuid) -> ApiResult<Room> {
        match db::rooms::get_room(&self.db, room_id).await? {
            Some(room) if room.home_id == home.id => Ok(room),
            _ => Err(ApiError::NotFound(format!("Room {}", room_id))),
        }
    }

    pub async fn create_home(
        &self,
        owner: &OwnerId,
        name: &str,
        owner_display_name: Option<String>,
        owner_email: &str,
        address: Option<String>,
    ) -> ApiResult<Home> {
        let home = Home::new(
            owner.to_string(),
            required("name", name)?,
            optional(owner_display_name),
            required("owner_email", owner_email)?,
            optional(address),
        );
        db::homes::insert_home(&self.db, &home).await?;
        tracing::info!(home_id = %home.id, "Created home");
        Ok(home)
    }

    pub async fn list_homes(&self, owner: &OwnerId) -> ApiResult<Vec<Home>> {
        Ok(db::homes::list_homes_for_owner(&self.db, owner.as_str()).await?)
    }

    pub async fn update_home(&self, owner: &OwnerId, home_id: Uuid, update: HomeUpdate) -> ApiResult<Home> {
        let mut home = self.owned_home(owner, home_id).await?;

        if let Some(name) = update.name {
            home.name = required("name", &name)?;
        }
        if let Some(display) = update.owner_display_name {
            home.owner_display_name = required("owner_display_name", &display)?;
        }
        if let Some(email) = update.owner_email {
            home.owner_email = required("owner_email", &email)?;
        }
        if let Some(address) = update.address {
            home.address = optional(address);
        }

        db::homes::update_home(&self.db, &home).await?;
        Ok(home)
    }

    /// Replace the cover image, deleting the previous one
    pub async fn set_cover(&self, owner: &OwnerId, home_id: Uuid, photo: PhotoData) -> ApiResult<Home> {
        let mut home = self.owned_home(owner, home_id).await?;
        let scope = PhotoScope::Cover {
            owner_id: &home.owner_id,
            home_id: home.id,
        };
        let url = self.photos.put(scope, &photo).await?;

        let previous = home.cover_image_url.replace(url);
        db::homes::update_home(&self.db, &home).await?;
        if let Some(previous) = previous {
            self.delete_blob(&previous).await;
        }
        Ok(home)
    }

    pub async fn remove_cover(&self, owner: &OwnerId, home_id: Uuid) -> ApiResult<Home> {
        let mut home = self.owned_home(owner, home_id).await?;
        if let Some(previous) = home.cover_image_url.take() {
            db::homes::update_home(&self.db, &home).await?;
            self.delete_blob(&previous).await;
        }
        Ok(home)
    }

    /// Delete a home with its rooms, links, reports and photos
    pub async fn delete_home(&self, owner: &OwnerId, home_id: Uuid) -> ApiResult<()> {
        let home = self.owned_home(owner, home_id).await?;
        let rooms = db::rooms::list_rooms_for_home(&self.db, home.id).await?;

        // Storage first; records stay until every folder has been tried
        for room in &rooms {
            self.delete_scope(PhotoScope::Room {
                owner_id: &home.owner_id,
                room_id: room.id,
            })
            .await;
        }
        self.delete_scope(PhotoScope::Cover {
            owner_id: &home.owner_id,
            home_id: home.id,
        })
        .await;

        let max_wait = db::settings::get_db_max_lock_wait_ms(&self.db).await?;
        let pool = &self.db;
        retry_on_lock("delete_home", max_wait, || async {
            let mut tx = pool.begin().await?;
            db::homes::delete_home_records(&mut *tx, home_id).await?;
            tx.commit().await?;
            Ok::<_, homie_common::Error>(())
        })
        .await?;

        self.sessions.forget_home(home.id).await;
        tracing::info!(home_id = %home.id, rooms = rooms.len(), "Deleted home");
        Ok(())
    }

    pub async fn create_room(&self, owner: &OwnerId, home_id: Uuid, name: &str) -> ApiResult<Room> {
        let home = self.owned_home(owner, home_id).await?;
        let room = Room::new(home.id, required("name", name)?);
        db::rooms::insert_room(&self.db, &room).await?;
        tracing::info!(home_id = %home.id, room_id = %room.id, "Created room");
        Ok(room)
    }

    pub async fn list_rooms(&self, owner: &OwnerId, home_id: Uuid) -> ApiResult<Vec<Room>> {
        let home = self.owned_home(owner, home_id).await?;
        Ok(db::rooms::list_rooms_for_home(&self.db, home.id).await?)
    }

    pub async fn rename_room(&self, owner: &OwnerId, home_id: Uuid, room_id: Uuid, name: &str) -> ApiResult<Room> {
        let (_, room) = self.owned_room(owner, home_id, room_id).await?;
        let name = required("name", name)?;
        if !db::rooms::rename_room(&self.db, room.id, &name).await? {
            return Err(ApiError::NotFound(format!("Room {}", room_id)));
        }
        Ok(Room { name, ..room })
    }

    /// Delete a room's photos (best effort) and then the room
    pub async fn delete_room(&self, owner: &OwnerId, home_id: Uuid, room_id: Uuid) -> ApiResult<()> {
        let (home, room) = self.owned_room(owner, home_id, room_id).await?;
        if room.is_analyzing {
            tracing::warn!(room_id = %room.id, "Deleting room while an analysis is running");
        }

        self.delete_scope(PhotoScope::Room {
            owner_id: &home.owner_id,
            room_id: room.id,
        })
        .await;

        if !db::rooms::delete_room(&self.db, room.id).await? {
            return Err(ApiError::NotFound(format!("Room {}", room_id)));
        }
        tracing::info!(home_id = %home.id, room_id = %room.id, "Deleted room");
        Ok(())
    }

    async fn delete_scope(&self, scope: PhotoScope<'_>) {
        if let Err(err) = self.photos.delete_scope(scope).await {
            tracing::warn!(folder = %scope.folder(), error = %err, "Failed to delete photo folder");
        }
    }

    async fn delete_blob(&self, url: &str) {
        match self.photos.delete(url).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(err) => tracing::warn!(url = %url, error = %err, "Failed to delete photo"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::fixtures::PNG;
    use crate::services::photo_store::LocalPhotoStore;
    use homie_common::api::parse_owner_id;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, PropertyManager, OwnerId) {
        let dir = TempDir::new().unwrap();
        let pool = db::init_database_pool(&dir.path().join("test.db")).await.unwrap();
        let photos = Arc::new(LocalPhotoStore::new(dir.path().join("photos")));
        let manager = PropertyManager::new(pool, photos, SessionRegistry::new());
        (dir, manager, parse_owner_id(Some("owner-1")).unwrap())
    }

    fn png() -> PhotoData {
        PhotoData::validated("image/png", PNG.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_create_home_defaults_display_name() {
        let (_dir, manager, owner) = setup().await;
        let home = manager
            .create_home(&owner, " Maple Cottage ", None, "pat@example.com", Some("  ".into()))
            .await
            .unwrap();
        assert_eq!(home.name, "Maple Cottage");
        assert_eq!(home.owner_display_name, "Home Owner");
        assert!(home.address.is_none());

        let err = manager.create_home(&owner, "  ", None, "pat@example.com", None).await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_other_owner_is_denied() {
        let (_dir, manager, owner) = setup().await;
        let home = manager.create_home(&owner, "Maple", None, "pat@example.com", None).await.unwrap();
        let intruder = parse_owner_id(Some("owner-2")).unwrap();

        let err = manager.owned_home(&intruder, home.id).await.unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
        let err = manager.delete_home(&intruder, home.id).await.unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
        let err = manager.owned_home(&owner, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_home_sets_and_clears_address() {
        let (_dir, manager, owner) = setup().await;
        let home = manager.create_home(&owner, "Maple", None, "pat@example.com", None).await.unwrap();

        let update = HomeUpdate {
            address: Some(Some("1 Elm Street".into())),
            owner_display_name: Some("Pat".into()),
            ..Default::default()
        };
        let home = manager.update_home(&owner, home.id, update).await.unwrap();
        assert_eq!(home.address.as_deref(), Some("1 Elm Street"));
        assert_eq!(home.owner_display_name, "Pat");

        let update = HomeUpdate {
            address: Some(None),
            ..Default::default()
        };
        let home = manager.update_home(&owner, home.id, update).await.unwrap();
        assert!(home.address.is_none());
        assert_eq!(home.name, "Maple");
    }

    #[tokio::test]
    async fn test_cover_replacement_deletes_old_image() {
        let (dir, manager, owner) = setup().await;
        let home = manager.create_home(&owner, "Maple", None, "pat@example.com", None).await.unwrap();

        let first = manager.set_cover(&owner, home.id, png()).await.unwrap();
        let first_url = first.cover_image_url.clone().unwrap();
        let second = manager.set_cover(&owner, home.id, png()).await.unwrap();
        assert_ne!(second.cover_image_url.as_deref(), Some(first_url.as_str()));
        assert!(manager.photos.load(&first_url).await.is_err());

        let cleared = manager.remove_cover(&owner, home.id).await.unwrap();
        assert!(cleared.cover_image_url.is_none());
        drop(dir);
    }

    #[tokio::test]
    async fn test_delete_home_removes_rooms_and_photos() {
        let (_dir, manager, owner) = setup().await;
        let home = manager.create_home(&owner, "Maple", None, "pat@example.com", None).await.unwrap();
        let room = manager.create_room(&owner, home.id, "Kitchen").await.unwrap();
        let url = manager
            .photos
            .put(
                PhotoScope::Room {
                    owner_id: &home.owner_id,
                    room_id: room.id,
                },
                &png(),
            )
            .await
            .unwrap();

        manager.delete_home(&owner, home.id).await.unwrap();

        assert!(manager.photos.load(&url).await.is_err());
        assert!(db::rooms::get_room(&manager.db, room.id).await.unwrap().is_none());
        assert!(manager.list_homes(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_room_rename_and_delete() {
        let (_dir, manager, owner) = setup().await;
        let home = manager.create_home(&owner, "Maple", None, "pat@example.com", None).await.unwrap();
        let room = manager.create_room(&owner, home.id, "Kitchen").await.unwrap();

        let renamed = manager.rename_room(&owner, home.id, room.id, " Galley ").await.unwrap();
        assert_eq!(renamed.name, "Galley");
        assert_eq!(manager.list_rooms(&owner, home.id).await.unwrap()[0].name, "Galley");

        manager.delete_room(&owner, home.id, room.id).await.unwrap();
        let err = manager.delete_room(&owner, home.id, room.id).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
