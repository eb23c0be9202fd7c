//! Room model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InventoryItem;

/// A room within a home, with its analyzed inventory
///
/// `analyzed_objects` is the owner's expected inventory. It is always
/// rewritten together with `analyzed_photo_urls` and `last_analyzed_at`
/// (see [`RoomAnalysis`]) so the three never drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub home_id: Uuid,
    pub name: String,
    pub analyzed_objects: Vec<InventoryItem>,
    /// Owner photos that have been analyzed, without duplicates
    pub analyzed_photo_urls: Vec<String>,
    pub is_analyzing: bool,
    /// When the current analysis claim was taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_started_at: Option<DateTime<Utc>>,
    pub last_analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(home_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            home_id,
            name: name.trim().to_string(),
            analyzed_objects: Vec::new(),
            analyzed_photo_urls: Vec::new(),
            is_analyzing: false,
            analysis_started_at: None,
            last_analyzed_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Complete analysis state written in a single update
#[derive(Debug, Clone, PartialEq)]
pub struct RoomAnalysis {
    pub objects: Vec<InventoryItem>,
    pub photo_urls: Vec<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl RoomAnalysis {
    /// State of a room with no photos and no inventory
    pub fn cleared() -> Self {
        Self {
            objects: Vec::new(),
            photo_urls: Vec::new(),
            analyzed_at: None,
        }
    }
}

/// Append `additions` to `existing`, skipping URLs already present
pub fn union_photo_urls(existing: &[String], additions: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for url in additions {
        if !merged.contains(url) {
            merged.push(url.clone());
        }
    }
    merged
}
