//! Inspection report model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Discrepancy, InventoryItem};

/// Overall outcome of an inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OverallStatus {
    AllClear,
    WithDiscrepancies,
    /// Status text written by another producer
    Other(String),
}

const ALL_CLEAR: &str = "Completed - All Clear";
const WITH_DISCREPANCIES: &str = "Completed with discrepancies";

impl OverallStatus {
    /// Status implied by a set of room results
    pub fn from_rooms(rooms: &[RoomInspectionReport]) -> Self {
        if rooms.iter().any(|r| !r.discrepancies.is_empty()) {
            OverallStatus::WithDiscrepancies
        } else {
            OverallStatus::AllClear
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OverallStatus::AllClear => ALL_CLEAR,
            OverallStatus::WithDiscrepancies => WITH_DISCREPANCIES,
            OverallStatus::Other(text) => text,
        }
    }
}

impl From<String> for OverallStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            ALL_CLEAR => OverallStatus::AllClear,
            WITH_DISCREPANCIES => OverallStatus::WithDiscrepancies,
            _ => OverallStatus::Other(value),
        }
    }
}

impl From<OverallStatus> for String {
    fn from(value: OverallStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-room section of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInspectionReport {
    pub room_id: Uuid,
    pub room_name: String,
    /// Snapshot of the owner's inventory when the inspection ran
    pub expected_items: Vec<InventoryItem>,
    pub discrepancies: Vec<Discrepancy>,
    pub missing_item_suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_notes: Option<String>,
}

impl RoomInspectionReport {
    /// Expected items the tenant's photos accounted for in full
    pub fn found_items(&self) -> Vec<&InventoryItem> {
        self.expected_items
            .iter()
            .filter(|item| {
                let key = item.key();
                !self
                    .discrepancies
                    .iter()
                    .any(|d| super::inventory::item_key(&d.name) == key)
            })
            .collect()
    }
}

/// Immutable result of a submitted inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub id: Uuid,
    pub home_id: Uuid,
    pub home_owner_name: String,
    pub home_name: String,
    pub inspected_by: String,
    pub inspection_date: DateTime<Utc>,
    pub rooms: Vec<RoomInspectionReport>,
    pub overall_status: OverallStatus,
    pub tenant_link_id: Uuid,
}

impl InspectionReport {
    pub fn discrepancy_count(&self) -> usize {
        self.rooms.iter().map(|r| r.discrepancies.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(discrepancies: Vec<Discrepancy>) -> RoomInspectionReport {
        RoomInspectionReport {
            room_id: Uuid::new_v4(),
            room_name: "Kitchen".to_string(),
            expected_items: vec![InventoryItem::new("Chair", 4), InventoryItem::new("Table", 1)],
            discrepancies,
            missing_item_suggestion: String::new(),
            tenant_notes: None,
        }
    }

    fn chair_missing() -> Discrepancy {
        Discrepancy {
            name: "chair".to_string(),
            expected_count: 4,
            actual_count: 2,
            note: "Less than expected".to_string(),
        }
    }

    #[test]
    fn test_overall_status_from_rooms() {
        assert_eq!(OverallStatus::from_rooms(&[room(vec![])]), OverallStatus::AllClear);
        assert_eq!(
            OverallStatus::from_rooms(&[room(vec![]), room(vec![chair_missing()])]),
            OverallStatus::WithDiscrepancies
        );
    }

    #[test]
    fn test_overall_status_serializes_as_text() {
        let json = serde_json::to_string(&OverallStatus::AllClear).unwrap();
        assert_eq!(json, "\"Completed - All Clear\"");
        let parsed: OverallStatus = serde_json::from_str("\"Completed with discrepancies\"").unwrap();
        assert_eq!(parsed, OverallStatus::WithDiscrepancies);
        let other: OverallStatus = serde_json::from_str("\"Pending\"").unwrap();
        assert_eq!(other.as_str(), "Pending");
    }

    #[test]
    fn test_found_items_excludes_discrepant_names_case_insensitively() {
        let report = room(vec![chair_missing()]);
        let found: Vec<_> = report.found_items().iter().map(|i| i.name.clone()).collect();
        assert_eq!(found, vec!["Table"]);
    }
}
