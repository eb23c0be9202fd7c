//! Event types for the Homie event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! domain events out to SSE subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// How a room analysis was run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Only newly uploaded photos were described and merged in
    Incremental,
    /// Every remaining photo was described and the inventory replaced
    Full,
    /// The inventory was cleared without calling the vision model
    Cleared,
}

/// Homie event types
///
/// Every event names the owner it belongs to so that subscribers can be
/// limited to their own homes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HomeEvent {
    /// A room claimed its analysis slot
    RoomAnalysisStarted {
        owner_id: String,
        home_id: Uuid,
        room_id: Uuid,
        mode: AnalysisMode,
        photo_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A room analysis wrote its inventory
    RoomAnalysisCompleted {
        owner_id: String,
        home_id: Uuid,
        room_id: Uuid,
        mode: AnalysisMode,
        object_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A room analysis failed and released its slot
    RoomAnalysisFailed {
        owner_id: String,
        home_id: Uuid,
        room_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A tenant opened an inspection link
    LinkAccessed {
        owner_id: String,
        home_id: Uuid,
        link_id: Uuid,
        access_count: i64,
        timestamp: DateTime<Utc>,
    },

    /// A tenant submitted an inspection and the link was consumed
    InspectionSubmitted {
        owner_id: String,
        home_id: Uuid,
        link_id: Uuid,
        report_id: Uuid,
        overall_status: String,
        email_sent: bool,
        timestamp: DateTime<Utc>,
    },

    /// A link was bound to a freshly saved report
    LinkConsumed {
        owner_id: String,
        home_id: Uuid,
        link_id: Uuid,
        report_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A report was deleted and its link became usable again
    LinkReactivated {
        owner_id: String,
        home_id: Uuid,
        link_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl HomeEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            HomeEvent::RoomAnalysisStarted { .. } => "RoomAnalysisStarted",
            HomeEvent::RoomAnalysisCompleted { .. } => "RoomAnalysisCompleted",
            HomeEvent::RoomAnalysisFailed { .. } => "RoomAnalysisFailed",
            HomeEvent::LinkAccessed { .. } => "LinkAccessed",
            HomeEvent::InspectionSubmitted { .. } => "InspectionSubmitted",
            HomeEvent::LinkConsumed { .. } => "LinkConsumed",
            HomeEvent::LinkReactivated { .. } => "LinkReactivated",
        }
    }

    /// Owner the event belongs to
    pub fn owner_id(&self) -> &str {
        match self {
            HomeEvent::RoomAnalysisStarted { owner_id, .. }
            | HomeEvent::RoomAnalysisCompleted { owner_id, .. }
            | HomeEvent::RoomAnalysisFailed { owner_id, .. }
            | HomeEvent::LinkAccessed { owner_id, .. }
            | HomeEvent::InspectionSubmitted { owner_id, .. }
            | HomeEvent::LinkConsumed { owner_id, .. }
            | HomeEvent::LinkReactivated { owner_id, .. } => owner_id,
        }
    }
}

/// Broadcast bus for [`HomeEvent`]s
///
/// Cloning is cheap; every clone shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HomeEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<HomeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: HomeEvent) -> Result<usize, broadcast::error::SendError<HomeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HomeEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reactivated(owner: &str) -> HomeEvent {
        HomeEvent::LinkReactivated {
            owner_id: owner.to_string(),
            home_id: Uuid::new_v4(),
            link_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(10);
        assert!(bus.emit(reactivated("owner-1")).is_err());
        // Lossy emit never fails
        bus.emit_lossy(reactivated("owner-1"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit(reactivated("owner-7")).unwrap(), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "LinkReactivated");
        assert_eq!(event.owner_id(), "owner-7");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = HomeEvent::RoomAnalysisStarted {
            owner_id: "o".to_string(),
            home_id: Uuid::nil(),
            room_id: Uuid::nil(),
            mode: AnalysisMode::Incremental,
            photo_count: 2,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RoomAnalysisStarted");
        assert_eq!(json["mode"], "incremental");
        assert_eq!(json["photo_count"], 2);
    }
}
