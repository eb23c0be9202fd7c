//! Tenant inspection flow
//!
//! Opens sessions from tenant links, runs per-room comparisons and performs
//! the submission: save report, consume link, email owner. The first two
//! happen in one transaction; the email is best-effort and only reported
//! back as a warning.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use homie_common::events::{EventBus, HomeEvent};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{Home, InspectionReport, OverallStatus, PhotoData};
use crate::services::discrepancy;
use crate::services::inspection_session::{InspectionSession, RoomSnapshot, SessionError, SessionView};
use crate::services::link_lifecycle::{self, LinkError, LinkLifecycleManager};
use crate::services::mail_client::{MailError, MailSender};
use crate::services::report_document;
use crate::services::session_registry::{SessionHandle, SessionRegistry};
use crate::services::vision_client::{VisionAnalysisGateway, VisionError};
use crate::utils::retry_on_lock;

/// Warning returned when the report was saved but the owner email failed
pub const EMAIL_WARNING: &str = "Report saved, but the owner could not be emailed";

/// Shown instead of an error when a consumed link is reopened
#[derive(Debug, Clone, Serialize)]
pub struct CompletionView {
    pub report_id: Uuid,
    pub home_name: String,
    pub inspected_by: String,
    pub inspection_date: chrono::DateTime<Utc>,
    pub overall_status: OverallStatus,
}

impl From<&InspectionReport> for CompletionView {
    fn from(report: &InspectionReport) -> Self {
        Self {
            report_id: report.id,
            home_name: report.home_name.clone(),
            inspected_by: report.inspected_by.clone(),
            inspection_date: report.inspection_date,
            overall_status: report.overall_status.clone(),
        }
    }
}

/// Result of opening a link
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OpenOutcome {
    Started { session: SessionView },
    AlreadyCompleted { completion: CompletionView },
}

/// Result of a successful submission
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub report_id: Uuid,
    pub overall_status: OverallStatus,
    pub discrepancy_count: usize,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Drives tenant inspection sessions
#[derive(Clone)]
pub struct InspectionSessionController {
    db: SqlitePool,
    event_bus: EventBus,
    vision: Arc<dyn VisionAnalysisGateway>,
    mailer: Arc<dyn MailSender>,
    links: LinkLifecycleManager,
    sessions: SessionRegistry,
    vision_timeout: Duration,
    dashboard_url: Option<String>,
}

impl InspectionSessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        vision: Arc<dyn VisionAnalysisGateway>,
        mailer: Arc<dyn MailSender>,
        links: LinkLifecycleManager,
        sessions: SessionRegistry,
        vision_timeout: Duration,
        dashboard_url: Option<String>,
    ) -> Self {
        Self {
            db,
            event_bus,
            vision,
            mailer,
            links,
            sessions,
            vision_timeout,
            dashboard_url,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Record a link access and start a fresh session at the first room
    ///
    /// A consumed link whose report still exists yields the completion view
    /// instead of [`ApiError::LinkInactive`].
    pub async fn open(&self, home_id: Uuid, link_id: Uuid) -> ApiResult<OpenOutcome> {
        let home = db::homes::get_home(&self.db, home_id)
            .await?
            .ok_or(ApiError::LinkNotFound)?;

        let link = match self.links.record_access(&home, link_id).await {
            Ok(link) => link,
            Err(LinkError::Inactive) => {
                if let Some(report) = self.bound_report(&home, link_id).await? {
                    tracing::info!(link_id = %link_id, report_id = %report.id, "Consumed link reopened");
                    return Ok(OpenOutcome::AlreadyCompleted {
                        completion: CompletionView::from(&report),
                    });
                }
                return Err(ApiError::LinkInactive);
            }
            Err(err) => return Err(err.into()),
        };

        let rooms: Vec<RoomSnapshot> = db::rooms::list_rooms_for_home(&self.db, home.id)
            .await?
            .into_iter()
            .map(|room| RoomSnapshot {
                id: room.id,
                name: room.name,
                expected_items: room.analyzed_objects,
            })
            .collect();

        let session = InspectionSession::new(&home, &link, rooms)?;
        let view = session.view();
        tracing::info!(
            home_id = %home.id,
            link_id = %link.id,
            session_id = %session.id,
            rooms = session.total_rooms(),
            "Inspection session started"
        );
        self.sessions.open(session).await;

        Ok(OpenOutcome::Started { session: view })
    }

    async fn bound_report(&self, home: &Home, link_id: Uuid) -> ApiResult<Option<InspectionReport>> {
        let Some(report_id) = db::links::get_link(&self.db, link_id)
            .await?
            .filter(|link| link.home_id == home.id)
            .and_then(|link| link.report_id)
        else {
            return Ok(None);
        };
        Ok(db::reports::get_report(&self.db, report_id).await?)
    }

    /// Session by id, or 404
    pub async fn session(&self, session_id: Uuid) -> ApiResult<SessionHandle> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Inspection session {}", session_id)))
    }

    pub async fn view(&self, session_id: Uuid) -> ApiResult<SessionView> {
        let handle = self.session(session_id).await?;
        let session = handle.lock().await;
        Ok(session.view())
    }

    /// Compare tenant photos of the current room against its snapshot
    ///
    /// The photos are only held for the duration of the call. The session is
    /// not locked while the vision model runs; the findings are dropped with
    /// [`SessionError::RoomChanged`] if the tenant moved on in the meantime.
    pub async fn analyze(
        &self,
        session_id: Uuid,
        room_id: Option<Uuid>,
        photos: Vec<PhotoData>,
    ) -> ApiResult<SessionView> {
        let handle = self.session(session_id).await?;

        let room = handle.lock().await.expect_room(room_id)?.clone();
        if photos.is_empty() {
            return Err(SessionError::NoPhotos.into());
        }

        let started = std::time::Instant::now();
        let findings = tokio::time::timeout(
            self.vision_timeout,
            discrepancy::compare_room(self.vision.as_ref(), &photos, &room.expected_items),
        )
        .await
        .map_err(|_| VisionError::Timeout(self.vision_timeout.as_secs()))??;

        tracing::info!(
            session_id = %session_id,
            room_id = %room.id,
            photos = photos.len(),
            discrepancies = findings.discrepancies.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Room compared"
        );

        let mut session = handle.lock().await;
        session.expect_room(Some(room.id))?;
        session.record_analysis(findings)?;
        Ok(session.view())
    }

    pub async fn confirm(&self, session_id: Uuid, tenant_notes: Option<String>) -> ApiResult<SessionView> {
        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        session.confirm(tenant_notes)?;
        Ok(session.view())
    }

    pub async fn next(&self, session_id: Uuid) -> ApiResult<SessionView> {
        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        session.next()?;
        Ok(session.view())
    }

    pub async fn previous(&self, session_id: Uuid) -> ApiResult<SessionView> {
        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        session.previous()?;
        Ok(session.view())
    }

    pub async fn submit_session(&self, session_id: Uuid) -> ApiResult<SubmissionOutcome> {
        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        self.submit(&mut session).await
    }

    /// Save the report, consume the link, then try to email the owner
    ///
    /// If another submission consumed the link first, nothing is saved and
    /// [`ApiError::LinkInactive`] is returned.
    pub async fn submit(&self, session: &mut InspectionSession) -> ApiResult<SubmissionOutcome> {
        let rooms = session.begin_submission()?;

        let report = InspectionReport {
            id: Uuid::new_v4(),
            home_id: session.home_id,
            home_owner_name: session.owner_display_name.clone(),
            home_name: session.home_name.clone(),
            inspected_by: session.tenant_name.clone(),
            inspection_date: Utc::now(),
            overall_status: OverallStatus::from_rooms(&rooms),
            rooms,
            tenant_link_id: session.link_id,
        };

        let max_wait = db::settings::get_db_max_lock_wait_ms(&self.db)
            .await
            .unwrap_or(db::settings::DEFAULT_DB_MAX_LOCK_WAIT_MS);
        let pool = &self.db;
        let report_ref = &report;

        let saved = retry_on_lock("submit_inspection", max_wait, || async {
            let mut tx = pool.begin().await?;
            db::reports::insert_report(&mut *tx, report_ref).await?;
            if let Err(err) =
                link_lifecycle::consume_in_tx(&mut *tx, report_ref.home_id, report_ref.tenant_link_id, report_ref.id)
                    .await
            {
                tx.rollback().await?;
                return Err(err);
            }
            tx.commit().await?;
            Ok(())
        })
        .await;

        if let Err(err) = saved {
            match &err {
                LinkError::Inactive | LinkError::NotFound => {
                    tracing::warn!(
                        session_id = %session.id,
                        link_id = %session.link_id,
                        error = %err,
                        "Submission rejected, link already used"
                    );
                    session.fail(err.to_string());
                }
                _ => session.abort_submission(),
            }
            return Err(err.into());
        }

        let home = db::homes::get_home(&self.db, report.home_id).await.ok().flatten();
        let owner_id = home.as_ref().map(|h| h.owner_id.clone()).unwrap_or_default();

        tracing::info!(
            home_id = %report.home_id,
            link_id = %report.tenant_link_id,
            report_id = %report.id,
            status = %report.overall_status,
            "Inspection submitted"
        );
        self.event_bus.emit_lossy(HomeEvent::LinkConsumed {
            owner_id: owner_id.clone(),
            home_id: report.home_id,
            link_id: report.tenant_link_id,
            report_id: report.id,
            timestamp: Utc::now(),
        });

        let email_result = match &home {
            Some(home) => self.email_report(&report, home).await,
            None => Err(MailError::Rejected("Home no longer exists".to_string())),
        };
        let email_sent = match email_result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(report_id = %report.id, error = %err, "Failed to email inspection report");
                false
            }
        };

        session.complete(report.id, email_sent);
        self.event_bus.emit_lossy(HomeEvent::InspectionSubmitted {
            owner_id,
            home_id: report.home_id,
            link_id: report.tenant_link_id,
            report_id: report.id,
            overall_status: report.overall_status.to_string(),
            email_sent,
            timestamp: Utc::now(),
        });

        Ok(SubmissionOutcome {
            report_id: report.id,
            discrepancy_count: report.discrepancy_count(),
            overall_status: report.overall_status,
            email_sent,
            warning: (!email_sent).then(|| EMAIL_WARNING.to_string()),
        })
    }

    /// Send a report to the home's owner
    pub async fn email_report(&self, report: &InspectionReport, home: &Home) -> Result<(), MailError> {
        let message = report_document::compose_email(report, home, self.dashboard_url.as_deref());
        self.mailer.send(&message).await?;
        tracing::info!(report_id = %report.id, to = %home.owner_email, "Inspection report emailed");
        Ok(())
    }
}
