//! Short link database operations

use homie_common::time::to_db;
use homie_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Insert a code unless it is already taken
///
/// Returns false on a code collision.
pub async fn try_insert(
    pool: &SqlitePool,
    code: &str,
    target_path: &str,
    link_id: Option<Uuid>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO short_links (code, target_path, link_id, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(code) DO NOTHING
        "#,
    )
    .bind(code)
    .bind(target_path)
    .bind(link_id.map(|id| id.to_string()))
    .bind(to_db(&chrono::Utc::now()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Target path for a code
pub async fn resolve(pool: &SqlitePool, code: &str) -> Result<Option<String>> {
    let target: Option<String> = sqlx::query_scalar("SELECT target_path FROM short_links WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(target)
}
