//! Database access for homie-inspect
//!
//! One SQLite file in the root folder holds every table. List-valued columns
//! are stored as JSON text and timestamps as fixed-width RFC 3339 strings.

pub mod homes;
pub mod links;
pub mod reports;
pub mod rooms;
pub mod settings;
pub mod short_links;

use homie_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Initialize database connection pool, creating the file and tables if needed
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    connect(&db_url).await
}

/// Open a pool for `db_url` with the service's connection settings
pub async fn connect(db_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;
    Ok(pool)
}

/// Create all tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS homes (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            owner_display_name TEXT NOT NULL,
            owner_email TEXT NOT NULL,
            address TEXT,
            cover_image_url TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_homes_owner ON homes(owner_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            home_id TEXT NOT NULL REFERENCES homes(id),
            name TEXT NOT NULL,
            analyzed_objects TEXT NOT NULL DEFAULT '[]',
            analyzed_photo_urls TEXT NOT NULL DEFAULT '[]',
            is_analyzing INTEGER NOT NULL DEFAULT 0,
            analysis_started_at TEXT,
            last_analyzed_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rooms_home ON rooms(home_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenant_links (
            id TEXT PRIMARY KEY,
            home_id TEXT NOT NULL REFERENCES homes(id),
            owner_display_name TEXT NOT NULL,
            tenant_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            valid_until TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            access_count INTEGER NOT NULL DEFAULT 0,
            last_accessed_at TEXT,
            report_id TEXT,
            short_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_home ON tenant_links(home_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inspection_reports (
            id TEXT PRIMARY KEY,
            home_id TEXT NOT NULL REFERENCES homes(id),
            tenant_link_id TEXT NOT NULL,
            home_owner_name TEXT NOT NULL,
            home_name TEXT NOT NULL,
            inspected_by TEXT NOT NULL,
            inspection_date TEXT NOT NULL,
            rooms TEXT NOT NULL,
            overall_status TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_home ON inspection_reports(home_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS short_links (
            code TEXT PRIMARY KEY,
            target_path TEXT NOT NULL,
            link_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, homes, rooms, tenant_links, inspection_reports, short_links)");

    Ok(())
}
