//! Home database operations

use homie_common::time::{from_db, to_db};
use homie_common::uuid_utils::parse_column;
use homie_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::Home;

fn row_to_home(row: &SqliteRow) -> Result<Home> {
    Ok(Home {
        id: parse_column("homes.id", &row.get::<String, _>("id"))?,
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        owner_display_name: row.get("owner_display_name"),
        owner_email: row.get("owner_email"),
        address: row.get("address"),
        cover_image_url: row.get("cover_image_url"),
        created_at: from_db(&row.get::<String, _>("created_at"))?,
    })
}

const HOME_COLUMNS: &str =
    "id, owner_id, name, owner_display_name, owner_email, address, cover_image_url, created_at";

pub async fn insert_home(pool: &SqlitePool, home: &Home) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO homes (id, owner_id, name, owner_display_name, owner_email, address, cover_image_url, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(home.id.to_string())
    .bind(&home.owner_id)
    .bind(&home.name)
    .bind(&home.owner_display_name)
    .bind(&home.owner_email)
    .bind(&home.address)
    .bind(&home.cover_image_url)
    .bind(to_db(&home.created_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_home(pool: &SqlitePool, home_id: Uuid) -> Result<Option<Home>> {
    let row = sqlx::query(&format!("SELECT {} FROM homes WHERE id = ?", HOME_COLUMNS))
        .bind(home_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_home).transpose()
}

/// Homes of one owner, newest first
pub async fn list_homes_for_owner(pool: &SqlitePool, owner_id: &str) -> Result<Vec<Home>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM homes WHERE owner_id = ? ORDER BY created_at DESC",
        HOME_COLUMNS
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_home).collect()
}

/// Write the editable fields of a home
pub async fn update_home(pool: &SqlitePool, home: &Home) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE homes
        SET name = ?, owner_display_name = ?, owner_email = ?, address = ?, cover_image_url = ?
        WHERE id = ?
        "#,
    )
    .bind(&home.name)
    .bind(&home.owner_display_name)
    .bind(&home.owner_email)
    .bind(&home.address)
    .bind(&home.cover_image_url)
    .bind(home.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a home and every row that belongs to it
///
/// Runs on the caller's connection so it can share a transaction.
pub async fn delete_home_records(conn: &mut SqliteConnection, home_id: Uuid) -> Result<()> {
    let id = home_id.to_string();

    sqlx::query(
        "DELETE FROM short_links WHERE link_id IN (SELECT id FROM tenant_links WHERE home_id = ?)",
    )
    .bind(&id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM inspection_reports WHERE home_id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM tenant_links WHERE home_id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM rooms WHERE home_id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM homes WHERE id = ?")
        .bind(&id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
