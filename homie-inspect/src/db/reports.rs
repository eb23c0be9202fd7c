//! Inspection report database operations

use homie_common::time::{from_db, to_db};
use homie_common::uuid_utils::parse_column;
use homie_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{InspectionReport, OverallStatus, RoomInspectionReport};

const REPORT_COLUMNS: &str = "id, home_id, tenant_link_id, home_owner_name, home_name, inspected_by, \
     inspection_date, rooms, overall_status";

fn row_to_report(row: &SqliteRow) -> Result<InspectionReport> {
    let rooms: String = row.get("rooms");
    Ok(InspectionReport {
        id: parse_column("inspection_reports.id", &row.get::<String, _>("id"))?,
        home_id: parse_column("inspection_reports.home_id", &row.get::<String, _>("home_id"))?,
        tenant_link_id: parse_column(
            "inspection_reports.tenant_link_id",
            &row.get::<String, _>("tenant_link_id"),
        )?,
        home_owner_name: row.get("home_owner_name"),
        home_name: row.get("home_name"),
        inspected_by: row.get("inspected_by"),
        inspection_date: from_db(&row.get::<String, _>("inspection_date"))?,
        rooms: serde_json::from_str::<Vec<RoomInspectionReport>>(&rooms)?,
        overall_status: OverallStatus::from(row.get::<String, _>("overall_status")),
    })
}

/// Insert a report on the caller's connection
pub async fn insert_report(conn: &mut SqliteConnection, report: &InspectionReport) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO inspection_reports (id, home_id, tenant_link_id, home_owner_name, home_name,
                                        inspected_by, inspection_date, rooms, overall_status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.id.to_string())
    .bind(report.home_id.to_string())
    .bind(report.tenant_link_id.to_string())
    .bind(&report.home_owner_name)
    .bind(&report.home_name)
    .bind(&report.inspected_by)
    .bind(to_db(&report.inspection_date))
    .bind(serde_json::to_string(&report.rooms)?)
    .bind(report.overall_status.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_report(conn: &mut SqliteConnection, report_id: Uuid) -> Result<Option<InspectionReport>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM inspection_reports WHERE id = ?",
        REPORT_COLUMNS
    ))
    .bind(report_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(row_to_report).transpose()
}

pub async fn get_report(pool: &SqlitePool, report_id: Uuid) -> Result<Option<InspectionReport>> {
    let mut conn = pool.acquire().await?;
    fetch_report(&mut *conn, report_id).await
}

/// Reports of a home, newest first
pub async fn list_reports_for_home(pool: &SqlitePool, home_id: Uuid) -> Result<Vec<InspectionReport>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM inspection_reports WHERE home_id = ? ORDER BY inspection_date DESC",
        REPORT_COLUMNS
    ))
    .bind(home_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_report).collect()
}

pub async fn delete_report(conn: &mut SqliteConnection, report_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM inspection_reports WHERE id = ?")
        .bind(report_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}
