//! Tenant link database operations
//!
//! State-changing operations are single conditional UPDATEs so that the
//! check and the write cannot be separated by a concurrent writer.

use chrono::{DateTime, Utc};
use homie_common::time::{from_db, from_db_opt, to_db};
use homie_common::uuid_utils::parse_column;
use homie_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::TenantLink;

const LINK_COLUMNS: &str = "id, home_id, owner_display_name, tenant_name, created_at, valid_until, \
     is_active, access_count, last_accessed_at, report_id, short_url";

fn row_to_link(row: &SqliteRow) -> Result<TenantLink> {
    let report_id: Option<String> = row.get("report_id");
    Ok(TenantLink {
        id: parse_column("tenant_links.id", &row.get::<String, _>("id"))?,
        home_id: parse_column("tenant_links.home_id", &row.get::<String, _>("home_id"))?,
        owner_display_name: row.get("owner_display_name"),
        tenant_name: row.get("tenant_name"),
        created_at: from_db(&row.get::<String, _>("created_at"))?,
        valid_until: from_db_opt(row.get("valid_until"))?,
        is_active: row.get::<i64, _>("is_active") != 0,
        access_count: row.get("access_count"),
        last_accessed_at: from_db_opt(row.get("last_accessed_at"))?,
        report_id: report_id
            .as_deref()
            .map(|id| parse_column("tenant_links.report_id", id))
            .transpose()?,
        short_url: row.get("short_url"),
    })
}

pub async fn insert_link(pool: &SqlitePool, link: &TenantLink) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tenant_links (id, home_id, owner_display_name, tenant_name, created_at, valid_until,
                                  is_active, access_count, last_accessed_at, report_id, short_url)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(link.id.to_string())
    .bind(link.home_id.to_string())
    .bind(&link.owner_display_name)
    .bind(&link.tenant_name)
    .bind(to_db(&link.created_at))
    .bind(link.valid_until.as_ref().map(to_db))
    .bind(link.is_active as i64)
    .bind(link.access_count)
    .bind(link.last_accessed_at.as_ref().map(to_db))
    .bind(link.report_id.map(|id| id.to_string()))
    .bind(&link.short_url)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_link(conn: &mut SqliteConnection, link_id: Uuid) -> Result<Option<TenantLink>> {
    let row = sqlx::query(&format!("SELECT {} FROM tenant_links WHERE id = ?", LINK_COLUMNS))
        .bind(link_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_link).transpose()
}

pub async fn get_link(pool: &SqlitePool, link_id: Uuid) -> Result<Option<TenantLink>> {
    let mut conn = pool.acquire().await?;
    fetch_link(&mut *conn, link_id).await
}

/// Links of a home, newest first
pub async fn list_links_for_home(pool: &SqlitePool, home_id: Uuid) -> Result<Vec<TenantLink>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM tenant_links WHERE home_id = ? ORDER BY created_at DESC",
        LINK_COLUMNS
    ))
    .bind(home_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_link).collect()
}

/// Number of links of a home that can still be used
pub async fn count_active_links(pool: &SqlitePool, home_id: Uuid, now: &DateTime<Utc>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM tenant_links
        WHERE home_id = ? AND is_active = 1 AND (valid_until IS NULL OR valid_until > ?)
        "#,
    )
    .bind(home_id.to_string())
    .bind(to_db(now))
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn set_short_url(pool: &SqlitePool, link_id: Uuid, short_url: &str) -> Result<()> {
    sqlx::query("UPDATE tenant_links SET short_url = ? WHERE id = ?")
        .bind(short_url)
        .bind(link_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Count an access if the link is active and unexpired
///
/// Returns false when no row qualified.
pub async fn try_record_access(
    conn: &mut SqliteConnection,
    home_id: Uuid,
    link_id: Uuid,
    now: &DateTime<Utc>,
) -> Result<bool> {
    let now = to_db(now);
    let result = sqlx::query(
        r#"
        UPDATE tenant_links
        SET access_count = access_count + 1, last_accessed_at = ?
        WHERE id = ? AND home_id = ? AND is_active = 1
          AND (valid_until IS NULL OR valid_until > ?)
        "#,
    )
    .bind(&now)
    .bind(link_id.to_string())
    .bind(home_id.to_string())
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark an active link as consumed by `report_id`
///
/// Returns false when the link is missing or already consumed.
pub async fn try_consume(
    conn: &mut SqliteConnection,
    home_id: Uuid,
    link_id: Uuid,
    report_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tenant_links
        SET is_active = 0, report_id = ?
        WHERE id = ? AND home_id = ? AND is_active = 1
        "#,
    )
    .bind(report_id.to_string())
    .bind(link_id.to_string())
    .bind(home_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Make a link usable again and forget its report
pub async fn reactivate(conn: &mut SqliteConnection, link_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE tenant_links SET is_active = 1, report_id = NULL WHERE id = ?",
    )
    .bind(link_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Delete a link and its short code
pub async fn delete_link(conn: &mut SqliteConnection, link_id: Uuid) -> Result<bool> {
    sqlx::query("DELETE FROM short_links WHERE link_id = ?")
        .bind(link_id.to_string())
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query("DELETE FROM tenant_links WHERE id = ?")
        .bind(link_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}
