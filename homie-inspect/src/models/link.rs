//! Tenant inspection link model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a link, derived from its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkState {
    /// Can be opened (subject to expiry)
    Active,
    /// An inspection was submitted through it
    Consumed,
}

/// Capability granting a tenant one inspection of one home
///
/// Invariant: `is_active` is false exactly when `report_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantLink {
    pub id: Uuid,
    pub home_id: Uuid,
    pub owner_display_name: String,
    pub tenant_name: String,
    pub created_at: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub report_id: Option<Uuid>,
    /// Shortened URL handed to the tenant, if one was created
    pub short_url: Option<String>,
}

impl TenantLink {
    pub fn new(
        home_id: Uuid,
        owner_display_name: String,
        tenant_name: String,
        valid_until: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            home_id,
            owner_display_name,
            tenant_name: tenant_name.trim().to_string(),
            created_at: Utc::now(),
            valid_until,
            is_active: true,
            access_count: 0,
            last_accessed_at: None,
            report_id: None,
            short_url: None,
        }
    }

    pub fn state(&self) -> LinkState {
        if self.is_active {
            LinkState::Active
        } else {
            LinkState::Consumed
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until <= now)
    }

    /// Path of the tenant-facing inspection page
    pub fn inspection_path(&self) -> String {
        format!("/inspect/{}/links/{}", self.home_id, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_link_is_active() {
        let link = TenantLink::new(Uuid::new_v4(), "Owner".to_string(), " Sam ".to_string(), None);
        assert_eq!(link.state(), LinkState::Active);
        assert_eq!(link.tenant_name, "Sam");
        assert!(link.report_id.is_none());
        assert!(!link.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let mut link = TenantLink::new(Uuid::new_v4(), "Owner".to_string(), "Sam".to_string(), Some(now));
        assert!(link.is_expired_at(now));
        link.valid_until = Some(now + Duration::seconds(1));
        assert!(!link.is_expired_at(now));
    }
}
