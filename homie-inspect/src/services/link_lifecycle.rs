//! Tenant link lifecycle
//!
//! A link is ACTIVE until an inspection submitted through it binds a
//! report, which makes it CONSUMED. Deleting that report is the only way
//! back to ACTIVE. Every transition is a conditional UPDATE so that two
//! concurrent callers can never both win.
//!
//! Callers prove ownership by passing the [`Home`] they loaded and checked;
//! nothing here looks at the requester.

use chrono::{DateTime, Utc};
use homie_common::events::{EventBus, HomeEvent};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::db;
use crate::models::{Home, TenantLink};
use crate::utils::{retry_on_lock, LockContention};

/// Length of generated short codes
pub const SHORT_CODE_LEN: usize = 6;

/// Collisions tolerated before short link creation gives up
const MAX_SHORT_CODE_ATTEMPTS: usize = 32;

/// Link lifecycle errors
#[derive(Debug, Error)]
pub enum LinkError {
    /// No such link for this home
    #[error("Inspection link not found")]
    NotFound,

    /// The link was consumed by a submitted inspection
    #[error("Inspection link is no longer active")]
    Inactive,

    /// The link is past its validity window
    #[error("Inspection link has expired")]
    Expired,

    #[error(transparent)]
    Database(#[from] homie_common::Error),
}

impl From<sqlx::Error> for LinkError {
    fn from(err: sqlx::Error) -> Self {
        LinkError::Database(err.into())
    }
}

impl LockContention for LinkError {
    fn is_lock_contention(&self) -> bool {
        match self {
            LinkError::Database(err) => err.is_lock_contention(),
            _ => false,
        }
    }
}

/// Generate a random alphanumeric short code
pub fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Why a conditional link update matched no row
async fn classify_failure(
    conn: &mut SqliteConnection,
    home_id: Uuid,
    link_id: Uuid,
    now: DateTime<Utc>,
) -> Result<LinkError, LinkError> {
    let link = match db::links::fetch_link(conn, link_id).await? {
        Some(link) if link.home_id == home_id => link,
        _ => return Ok(LinkError::NotFound),
    };

    if !link.is_active {
        Ok(LinkError::Inactive)
    } else if link.is_expired_at(now) {
        Ok(LinkError::Expired)
    } else {
        // Reactivated between the update and this read
        Ok(LinkError::Inactive)
    }
}

/// Mark a link consumed by `report_id` inside the caller's transaction
///
/// Fails with [`LinkError::Inactive`] when another submission got there
/// first; the caller must roll back.
pub async fn consume_in_tx(
    conn: &mut SqliteConnection,
    home_id: Uuid,
    link_id: Uuid,
    report_id: Uuid,
) -> Result<(), LinkError> {
    if db::links::try_consume(conn, home_id, link_id, report_id).await? {
        return Ok(());
    }

    match db::links::fetch_link(conn, link_id).await? {
        Some(link) if link.home_id == home_id => Err(LinkError::Inactive),
        _ => Err(LinkError::NotFound),
    }
}

/// Link state transitions and link-scoped deletions
#[derive(Clone)]
pub struct LinkLifecycleManager {
    db: SqlitePool,
    event_bus: EventBus,
    public_base_url: String,
}

impl LinkLifecycleManager {
    pub fn new(db: SqlitePool, event_bus: EventBus, public_base_url: impl Into<String>) -> Self {
        Self {
            db,
            event_bus,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URL of a link's inspection page
    pub fn inspection_url(&self, link: &TenantLink) -> String {
        format!("{}{}", self.public_base_url, link.inspection_path())
    }

    async fn lock_wait_ms(&self) -> u64 {
        db::settings::get_db_max_lock_wait_ms(&self.db)
            .await
            .unwrap_or(db::settings::DEFAULT_DB_MAX_LOCK_WAIT_MS)
    }

    /// Issue a new link for `home` and give it a short URL
    pub async fn create_link(
        &self,
        home: &Home,
        tenant_name: &str,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<TenantLink, LinkError> {
        let mut link = TenantLink::new(
            home.id,
            home.owner_display_name.clone(),
            tenant_name.to_string(),
            valid_until,
        );
        db::links::insert_link(&self.db, &link).await?;

        let code = self.create_short_code(&link.inspection_path(), Some(link.id)).await?;
        let short_url = format!("{}/go/{}", self.public_base_url, code);
        db::links::set_short_url(&self.db, link.id, &short_url).await?;
        link.short_url = Some(short_url);

        tracing::info!(home_id = %home.id, link_id = %link.id, "Created inspection link");
        Ok(link)
    }

    /// Store `target_path` under a fresh code, retrying on collision
    pub async fn create_short_code(
        &self,
        target_path: &str,
        link_id: Option<Uuid>,
    ) -> Result<String, LinkError> {
        for attempt in 1..=MAX_SHORT_CODE_ATTEMPTS {
            let code = generate_short_code();
            if db::short_links::try_insert(&self.db, &code, target_path, link_id).await? {
                return Ok(code);
            }
            tracing::debug!(attempt, "Short code collision, retrying");
        }

        Err(LinkError::Database(homie_common::Error::Internal(format!(
            "No free short code after {} attempts",
            MAX_SHORT_CODE_ATTEMPTS
        ))))
    }

    /// Count a tenant opening the link
    ///
    /// The counter update is conditional on the link being active and
    /// unexpired, so the returned link reflects exactly this access.
    pub async fn record_access(&self, home: &Home, link_id: Uuid) -> Result<TenantLink, LinkError> {
        let home_id = home.id;
        let max_wait = self.lock_wait_ms().await;
        let pool = &self.db;

        let link = retry_on_lock("record_link_access", max_wait, || async {
            let now = Utc::now();
            let mut tx = pool.begin().await?;

            if !db::links::try_record_access(&mut *tx, home_id, link_id, &now).await? {
                let reason = classify_failure(&mut *tx, home_id, link_id, now).await?;
                tx.rollback().await?;
                return Err(reason);
            }

            let link = db::links::fetch_link(&mut *tx, link_id)
                .await?
                .ok_or(LinkError::NotFound)?;
            tx.commit().await?;
            Ok(link)
        })
        .await?;

        tracing::info!(
            home_id = %home_id,
            link_id = %link_id,
            access_count = link.access_count,
            "Inspection link opened"
        );
        self.event_bus.emit_lossy(HomeEvent::LinkAccessed {
            owner_id: home.owner_id.clone(),
            home_id,
            link_id,
            access_count: link.access_count,
            timestamp: Utc::now(),
        });

        Ok(link)
    }

    /// Link of `home`, or [`LinkError::NotFound`]
    pub async fn get_link(&self, home: &Home, link_id: Uuid) -> Result<TenantLink, LinkError> {
        match db::links::get_link(&self.db, link_id).await? {
            Some(link) if link.home_id == home.id => Ok(link),
            _ => Err(LinkError::NotFound),
        }
    }

    /// Delete a report and make its originating link usable again
    ///
    /// Both happen in one transaction. Returns false if the report does not
    /// belong to `home`.
    pub async fn delete_report(&self, home: &Home, report_id: Uuid) -> Result<bool, LinkError> {
        let max_wait = self.lock_wait_ms().await;
        let pool = &self.db;

        let reactivated = retry_on_lock("delete_report", max_wait, || async {
            let mut tx = pool.begin().await?;
            let report = match db::reports::fetch_report(&mut *tx, report_id).await? {
                Some(report) if report.home_id == home.id => report,
                _ => return Ok::<_, LinkError>(None),
            };

            db::reports::delete_report(&mut *tx, report_id).await?;
            let link_id = report.tenant_link_id;
            let reactivated = match db::links::fetch_link(&mut *tx, link_id).await? {
                Some(link) if link.report_id == Some(report_id) => {
                    db::links::reactivate(&mut *tx, link_id).await?
                }
                _ => false,
            };
            tx.commit().await?;
            Ok(Some(reactivated.then_some(link_id)))
        })
        .await?;

        let Some(reactivated) = reactivated else {
            return Ok(false);
        };

        tracing::info!(home_id = %home.id, report_id = %report_id, "Deleted inspection report");
        if let Some(link_id) = reactivated {
            self.emit_reactivated(home, link_id);
        }
        Ok(true)
    }

    /// Delete every report of `home`, reactivating their links
    pub async fn delete_all_reports(&self, home: &Home) -> Result<usize, LinkError> {
        let reports = db::reports::list_reports_for_home(&self.db, home.id).await?;
        let mut deleted = 0;
        for report in reports {
            if self.delete_report(home, report.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Delete a link together with the report it produced
    ///
    /// Returns the id of the deleted report, if there was one.
    pub async fn delete_link(&self, home: &Home, link_id: Uuid) -> Result<Option<Uuid>, LinkError> {
        let max_wait = self.lock_wait_ms().await;
        let pool = &self.db;

        let report_id = retry_on_lock("delete_link", max_wait, || async {
            let mut tx = pool.begin().await?;
            let link = match db::links::fetch_link(&mut *tx, link_id).await? {
                Some(link) if link.home_id == home.id => link,
                _ => return Err(LinkError::NotFound),
            };

            if let Some(report_id) = link.report_id {
                db::reports::delete_report(&mut *tx, report_id).await?;
            }
            db::links::delete_link(&mut *tx, link_id).await?;
            tx.commit().await?;
            Ok(link.report_id)
        })
        .await?;

        tracing::info!(
            home_id = %home.id,
            link_id = %link_id,
            report_id = ?report_id,
            "Deleted inspection link"
        );
        Ok(report_id)
    }

    fn emit_reactivated(&self, home: &Home, link_id: Uuid) {
        tracing::info!(home_id = %home.id, link_id = %link_id, "Inspection link reactivated");
        self.event_bus.emit_lossy(HomeEvent::LinkReactivated {
            owner_id: home.owner_id.clone(),
            home_id: home.id,
            link_id,
            timestamp: Utc::now(),
        });
    }
}
