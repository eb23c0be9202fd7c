//! Home model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when an owner has not set one
pub const DEFAULT_OWNER_DISPLAY_NAME: &str = "Home Owner";

/// A property registered by an owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub owner_display_name: String,
    /// Address that receives inspection reports
    pub owner_email: String,
    pub address: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Home {
    pub fn new(
        owner_id: String,
        name: String,
        owner_display_name: Option<String>,
        owner_email: String,
        address: Option<String>,
    ) -> Self {
        let owner_display_name = owner_display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_OWNER_DISPLAY_NAME.to_string());
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name: name.trim().to_string(),
            owner_display_name,
            owner_email: owner_email.trim().to_string(),
            address: address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            cover_image_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }
}
