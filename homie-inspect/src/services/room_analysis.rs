//! Owner room analysis workflows
//!
//! Uploads add to a room's inventory (only the new photos are described,
//! then merged in). Removing a photo re-describes every remaining photo and
//! replaces the inventory. Clearing drops photos and inventory together.
//!
//! Each workflow first claims the room with a timestamp token. Only the
//! holder of the claim can write the analysis, and a claim older than
//! `analysis_stale_after_secs` may be taken over.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use homie_common::events::{AnalysisMode, EventBus, HomeEvent};
use sqlx::SqlitePool;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::room::union_photo_urls;
use crate::models::{Home, InventoryItem, PhotoData, Room, RoomAnalysis};
use crate::services::discrepancy::without_structural;
use crate::services::inventory_merger;
use crate::services::photo_store::{PhotoScope, PhotoStore, StorageError};
use crate::services::vision_client::{VisionAnalysisGateway, VisionError};

/// Runs owner-side analysis of room photos
#[derive(Clone)]
pub struct RoomAnalyzer {
    db: SqlitePool,
    event_bus: EventBus,
    vision: Arc<dyn VisionAnalysisGateway>,
    photos: Arc<dyn PhotoStore>,
    vision_timeout: Duration,
}

/// A held analysis claim
struct Claim<'a> {
    home: &'a Home,
    room: &'a Room,
    token: DateTime<Utc>,
    mode: AnalysisMode,
}

impl RoomAnalyzer {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        vision: Arc<dyn VisionAnalysisGateway>,
        photos: Arc<dyn PhotoStore>,
        vision_timeout: Duration,
    ) -> Self {
        Self {
            db,
            event_bus,
            vision,
            photos,
            vision_timeout,
        }
    }

    /// Store photos and merge what they show into the room's inventory
    pub async fn upload_photos(&self, home: &Home, room: &Room, photos: Vec<PhotoData>) -> ApiResult<Room> {
        if photos.is_empty() {
            return Err(ApiError::BadRequest("At least one photo is required".to_string()));
        }

        let claim = self.claim(home, room, AnalysisMode::Incremental, photos.len()).await?;
        let scope = PhotoScope::Room {
            owner_id: &home.owner_id,
            room_id: room.id,
        };

        let mut stored = Vec::with_capacity(photos.len());
        let outcome = async {
            for photo in &photos {
                stored.push(self.photos.put(scope, photo).await?);
            }
            let found = self.describe(&photos).await?;

            // The claim keeps other workflows out, so this read is stable
            let current = self.current_room(room).await?;
            Ok::<_, ApiError>(RoomAnalysis {
                objects: inventory_merger::merge(&current.analyzed_objects, &found),
                photo_urls: union_photo_urls(&current.analyzed_photo_urls, &stored),
                analyzed_at: Some(Utc::now()),
            })
        }
        .await;

        // Once the analysis is written the room references the new photos
        if let Err(err) = self.commit(&claim, outcome).await {
            self.discard_photos(&stored).await;
            return Err(err);
        }
        self.current_room(room).await
    }

    /// Remove one photo and rebuild the inventory from the rest
    ///
    /// With no photos left the inventory is cleared without calling the
    /// vision model. The blob is deleted once the new inventory is written.
    pub async fn remove_photo(&self, home: &Home, room: &Room, url: &str) -> ApiResult<Room> {
        let scope = PhotoScope::Room {
            owner_id: &home.owner_id,
            room_id: room.id,
        };
        if !scope.contains(url) {
            return Err(ApiError::BadRequest(format!("Photo {} does not belong to this room", url)));
        }
        if !room.analyzed_photo_urls.iter().any(|u| u == url) {
            return Err(ApiError::NotFound(format!("Photo {}", url)));
        }

        let remaining: Vec<String> = room
            .analyzed_photo_urls
            .iter()
            .filter(|u| u.as_str() != url)
            .cloned()
            .collect();
        let mode = if remaining.is_empty() {
            AnalysisMode::Cleared
        } else {
            AnalysisMode::Full
        };

        let claim = self.claim(home, room, mode, remaining.len()).await?;
        let outcome = async {
            let current = self.current_room(room).await?;
            let remaining: Vec<String> = current
                .analyzed_photo_urls
                .into_iter()
                .filter(|u| u != url)
                .collect();
            if remaining.is_empty() {
                return Ok::<_, ApiError>(RoomAnalysis::cleared());
            }

            let mut photos = Vec::with_capacity(remaining.len());
            for stored in &remaining {
                photos.push(self.photos.load(stored).await?);
            }
            let objects = self.describe(&photos).await?;
            Ok(RoomAnalysis {
                objects,
                photo_urls: remaining,
                analyzed_at: Some(Utc::now()),
            })
        }
        .await;

        self.commit(&claim, outcome).await?;
        self.discard_photos(&[url.to_string()]).await;
        self.current_room(room).await
    }

    /// Reset the room's inventory and delete all its photos
    pub async fn clear(&self, home: &Home, room: &Room) -> ApiResult<Room> {
        let claim = self.claim(home, room, AnalysisMode::Cleared, 0).await?;
        self.commit(&claim, Ok(RoomAnalysis::cleared())).await?;

        let scope = PhotoScope::Room {
            owner_id: &home.owner_id,
            room_id: room.id,
        };
        if let Err(err) = self.photos.delete_scope(scope).await {
            tracing::warn!(room_id = %room.id, error = %err, "Failed to delete room photos");
        }
        self.current_room(room).await
    }

    async fn claim<'a>(
        &self,
        home: &'a Home,
        room: &'a Room,
        mode: AnalysisMode,
        photo_count: usize,
    ) -> ApiResult<Claim<'a>> {
        let stale_after = db::settings::get_analysis_stale_after_secs(&self.db).await?;
        let token = Utc::now();
        let stale_before = token - chrono::Duration::seconds(stale_after as i64);

        if !db::rooms::claim_analysis(&self.db, room.id, &token, &stale_before).await? {
            tracing::info!(room_id = %room.id, "Room is already being analyzed");
            return Err(ApiError::RoomBusy(room.id));
        }

        tracing::info!(room_id = %room.id, mode = ?mode, photo_count, "Room analysis started");
        self.event_bus.emit_lossy(HomeEvent::RoomAnalysisStarted {
            owner_id: home.owner_id.clone(),
            home_id: home.id,
            room_id: room.id,
            mode,
            photo_count,
            timestamp: Utc::now(),
        });

        Ok(Claim {
            home,
            room,
            token,
            mode,
        })
    }

    /// Write the analysis under the claim, or release it on failure
    ///
    /// `Ok` means the analysis was written.
    async fn commit(&self, claim: &Claim<'_>, outcome: ApiResult<RoomAnalysis>) -> ApiResult<()> {
        let room_id = claim.room.id;

        let analysis = match outcome {
            Ok(analysis) => analysis,
            Err(err) => return Err(self.abandon(claim, err).await),
        };

        match db::rooms::write_analysis(&self.db, room_id, &claim.token, &analysis).await {
            Ok(true) => {}
            Ok(false) => {
                let err = ApiError::RoomBusy(room_id);
                tracing::warn!(room_id = %room_id, "Analysis claim was taken over, result discarded");
                self.emit_failed(claim, &err);
                return Err(err);
            }
            Err(err) => return Err(self.abandon(claim, err.into()).await),
        }

        tracing::info!(
            room_id = %room_id,
            mode = ?claim.mode,
            objects = analysis.objects.len(),
            photos = analysis.photo_urls.len(),
            "Room analysis completed"
        );
        self.event_bus.emit_lossy(HomeEvent::RoomAnalysisCompleted {
            owner_id: claim.home.owner_id.clone(),
            home_id: claim.home.id,
            room_id,
            mode: claim.mode,
            object_count: analysis.objects.len(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Release the claim and report the failure
    async fn abandon(&self, claim: &Claim<'_>, err: ApiError) -> ApiError {
        let room_id = claim.room.id;
        if let Err(release_err) = db::rooms::release_analysis(&self.db, room_id, &claim.token).await {
            tracing::error!(room_id = %room_id, error = %release_err, "Failed to release analysis claim");
        }
        self.emit_failed(claim, &err);
        err
    }

    fn emit_failed(&self, claim: &Claim<'_>, err: &ApiError) {
        tracing::warn!(room_id = %claim.room.id, error = %err, "Room analysis failed");
        self.event_bus.emit_lossy(HomeEvent::RoomAnalysisFailed {
            owner_id: claim.home.owner_id.clone(),
            home_id: claim.home.id,
            room_id: claim.room.id,
            error: err.to_string(),
            timestamp: Utc::now(),
        });
    }

    async fn current_room(&self, room: &Room) -> ApiResult<Room> {
        db::rooms::get_room(&self.db, room.id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Room {}", room.id)))
    }

    /// Describe photos, bounded by the vision timeout
    async fn describe(&self, photos: &[PhotoData]) -> Result<Vec<InventoryItem>, VisionError> {
        let items = tokio::time::timeout(self.vision_timeout, self.vision.describe(photos))
            .await
            .map_err(|_| VisionError::Timeout(self.vision_timeout.as_secs()))??;
        Ok(inventory_merger::normalize(&without_structural(&items)))
    }

    /// Best-effort blob deletion
    async fn discard_photos(&self, urls: &[String]) {
        for url in urls {
            match self.photos.delete(url).await {
                Ok(()) => {}
                Err(StorageError::NotFound(_)) => {}
                Err(err) => tracing::warn!(url = %url, error = %err, "Failed to delete photo"),
            }
        }
    }
}
