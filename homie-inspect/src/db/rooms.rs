//! Room database operations
//!
//! Analysis writes are guarded by a claim: `claim_analysis` sets
//! `is_analyzing` and stamps `analysis_started_at`, and only the holder of
//! that stamp may write or release. A claim older than the stale cutoff may
//! be taken over by a new analysis.

use chrono::{DateTime, Utc};
use homie_common::time::{from_db, from_db_opt, to_db};
use homie_common::uuid_utils::parse_column;
use homie_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{InventoryItem, Room, RoomAnalysis};

const ROOM_COLUMNS: &str = "id, home_id, name, analyzed_objects, analyzed_photo_urls, is_analyzing, \
     analysis_started_at, last_analyzed_at, created_at";

fn row_to_room(row: &SqliteRow) -> Result<Room> {
    let objects: String = row.get("analyzed_objects");
    let photo_urls: String = row.get("analyzed_photo_urls");

    Ok(Room {
        id: parse_column("rooms.id", &row.get::<String, _>("id"))?,
        home_id: parse_column("rooms.home_id", &row.get::<String, _>("home_id"))?,
        name: row.get("name"),
        analyzed_objects: serde_json::from_str::<Vec<InventoryItem>>(&objects)?,
        analyzed_photo_urls: serde_json::from_str::<Vec<String>>(&photo_urls)?,
        is_analyzing: row.get::<i64, _>("is_analyzing") != 0,
        analysis_started_at: from_db_opt(row.get("analysis_started_at"))?,
        last_analyzed_at: from_db_opt(row.get("last_analyzed_at"))?,
        created_at: from_db(&row.get::<String, _>("created_at"))?,
    })
}

pub async fn insert_room(pool: &SqlitePool, room: &Room) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO rooms (id, home_id, name, analyzed_objects, analyzed_photo_urls, is_analyzing,
                           analysis_started_at, last_analyzed_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(room.id.to_string())
    .bind(room.home_id.to_string())
    .bind(&room.name)
    .bind(serde_json::to_string(&room.analyzed_objects)?)
    .bind(serde_json::to_string(&room.analyzed_photo_urls)?)
    .bind(room.is_analyzing as i64)
    .bind(room.analysis_started_at.as_ref().map(to_db))
    .bind(room.last_analyzed_at.as_ref().map(to_db))
    .bind(to_db(&room.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_room(pool: &SqlitePool, room_id: Uuid) -> Result<Option<Room>> {
    let row = sqlx::query(&format!("SELECT {} FROM rooms WHERE id = ?", ROOM_COLUMNS))
        .bind(room_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_room).transpose()
}

/// Rooms of a home in creation order
pub async fn list_rooms_for_home(pool: &SqlitePool, home_id: Uuid) -> Result<Vec<Room>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM rooms WHERE home_id = ? ORDER BY created_at ASC, rowid ASC",
        ROOM_COLUMNS
    ))
    .bind(home_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_room).collect()
}

pub async fn rename_room(pool: &SqlitePool, room_id: Uuid, name: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE rooms SET name = ? WHERE id = ?")
        .bind(name)
        .bind(room_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_room(pool: &SqlitePool, room_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
        .bind(room_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Try to take the analysis claim for a room
///
/// Succeeds when the room is idle or its current claim started before
/// `stale_before`. Returns false when another analysis holds the room.
pub async fn claim_analysis(
    pool: &SqlitePool,
    room_id: Uuid,
    claim: &DateTime<Utc>,
    stale_before: &DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rooms
        SET is_analyzing = 1, analysis_started_at = ?
        WHERE id = ?
          AND (is_analyzing = 0 OR analysis_started_at IS NULL OR analysis_started_at < ?)
        "#,
    )
    .bind(to_db(claim))
    .bind(room_id.to_string())
    .bind(to_db(stale_before))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Replace the room's analysis state and release the claim
///
/// Objects, photo URLs and the analysis time are written together. Returns
/// false if the claim was lost to another analysis, in which case nothing
/// is written.
pub async fn write_analysis(
    pool: &SqlitePool,
    room_id: Uuid,
    claim: &DateTime<Utc>,
    analysis: &RoomAnalysis,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rooms
        SET analyzed_objects = ?,
            analyzed_photo_urls = ?,
            last_analyzed_at = ?,
            is_analyzing = 0,
            analysis_started_at = NULL
        WHERE id = ? AND is_analyzing = 1 AND analysis_started_at = ?
        "#,
    )
    .bind(serde_json::to_string(&analysis.objects)?)
    .bind(serde_json::to_string(&analysis.photo_urls)?)
    .bind(analysis.analyzed_at.as_ref().map(to_db))
    .bind(room_id.to_string())
    .bind(to_db(claim))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Release a claim without touching the analysis state
pub async fn release_analysis(pool: &SqlitePool, room_id: Uuid, claim: &DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE rooms
        SET is_analyzing = 0, analysis_started_at = NULL
        WHERE id = ? AND analysis_started_at = ?
        "#,
    )
    .bind(room_id.to_string())
    .bind(to_db(claim))
    .execute(pool)
    .await?;

    Ok(())
}
