//! Settings database operations
//!
//! Key-value accessors over the `settings` table. Values are stored as text
//! and parsed on read.

use sqlx::{Pool, Sqlite};
use homie_common::{Error, Result};

pub const VISION_API_KEY: &str = "vision_api_key";
pub const MAIL_API_KEY: &str = "mail_api_key";
pub const MAIL_API_SECRET: &str = "mail_api_secret";
pub const MAIL_SENDER_EMAIL: &str = "mail_sender_email";
pub const DB_MAX_LOCK_WAIT_MS: &str = "db_max_lock_wait_ms";
pub const ANALYSIS_STALE_AFTER_SECS: &str = "analysis_stale_after_secs";

pub const DEFAULT_DB_MAX_LOCK_WAIT_MS: u64 = 5000;
pub const DEFAULT_ANALYSIS_STALE_AFTER_SECS: u64 = 300;

/// Maximum time to retry a locked write
///
/// **Default:** 5000 ms
pub async fn get_db_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, DB_MAX_LOCK_WAIT_MS).await.map(|opt| opt.unwrap_or(DEFAULT_DB_MAX_LOCK_WAIT_MS))
}

/// Age after which an analysis claim is considered abandoned
///
/// **Default:** 300 s
pub async fn get_analysis_stale_after_secs(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, ANALYSIS_STALE_AFTER_SECS).await.map(|opt| opt.unwrap_or(DEFAULT_ANALYSIS_STALE_AFTER_SECS))
}

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (upsert)
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// In-memory database with the settings table (single connection)
    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let pool = setup_test_db().await;

        assert_eq!(get_db_max_lock_wait_ms(&pool).await.unwrap(), 5000);
        assert_eq!(get_analysis_stale_after_secs(&pool).await.unwrap(), 300);
        assert_eq!(get_setting::<String>(&pool, VISION_API_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let pool = setup_test_db().await;

        set_setting(&pool, ANALYSIS_STALE_AFTER_SECS, 60).await.unwrap();
        assert_eq!(get_analysis_stale_after_secs(&pool).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_set_is_upsert() {
        let pool = setup_test_db().await;

        set_setting(&pool, VISION_API_KEY, "old_key").await.unwrap();
        set_setting(&pool, VISION_API_KEY, "new_key").await.unwrap();

        let result: Option<String> = get_setting(&pool, VISION_API_KEY).await.unwrap();
        assert_eq!(result, Some("new_key".to_string()));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = ?")
            .bind(VISION_API_KEY)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let pool = setup_test_db().await;

        set_setting(&pool, DB_MAX_LOCK_WAIT_MS, "soon").await.unwrap();
        let err = get_db_max_lock_wait_ms(&pool).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
