//! Tenant inspection session state machine
//!
//! A session walks the rooms of a home in order. Each room is analyzed
//! (possibly several times) and then confirmed, which freezes its
//! [`RoomInspectionReport`]. Submission is only possible from the last room
//! once every room is confirmed.
//!
//! Sessions live in memory only. Nothing is persisted until submission, so
//! abandoning a session leaves no trace beyond the link's access counter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Home, InventoryItem, RoomFindings, RoomInspectionReport, TenantLink};

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("This home has no rooms to inspect")]
    NoRooms,

    #[error("At least one photo is required to analyze a room")]
    NoPhotos,

    #[error("Inspection is not in progress ({0})")]
    NotInProgress(String),

    #[error("The current room has not been analyzed yet")]
    NoPendingAnalysis,

    #[error("Room '{0}' must be analyzed and confirmed first")]
    RoomNotConfirmed(String),

    #[error("Already at the first room")]
    AtFirstRoom,

    #[error("Already at the last room")]
    AtLastRoom,

    #[error("Please complete the inspection for all {total} rooms. Only {completed} completed.")]
    Incomplete { completed: usize, total: usize },

    #[error("The inspection has moved to a different room")]
    RoomChanged,
}

/// Room as it was when the session opened
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub name: String,
    pub expected_items: Vec<InventoryItem>,
}

/// Where a session stands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// The tenant is working on room `index`
    AwaitingRoom { index: usize },
    /// The report is being saved
    Submitting,
    /// The report was saved and the link consumed
    Complete { report_id: Uuid, email_sent: bool },
    /// Submission can no longer succeed
    Failed { reason: String },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingRoom { .. } => "awaiting room",
            SessionState::Submitting => "submitting",
            SessionState::Complete { .. } => "complete",
            SessionState::Failed { .. } => "failed",
        }
    }
}

/// One tenant's walk through a home
#[derive(Debug, Clone)]
pub struct InspectionSession {
    pub id: Uuid,
    pub home_id: Uuid,
    pub link_id: Uuid,
    pub home_name: String,
    pub owner_display_name: String,
    pub tenant_name: String,
    rooms: Vec<RoomSnapshot>,
    state: SessionState,
    pending: Vec<Option<RoomFindings>>,
    confirmed: Vec<Option<RoomInspectionReport>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InspectionSession {
    /// Start at the first room
    pub fn new(home: &Home, link: &TenantLink, rooms: Vec<RoomSnapshot>) -> Result<Self, SessionError> {
        if rooms.is_empty() {
            return Err(SessionError::NoRooms);
        }

        let now = Utc::now();
        let count = rooms.len();
        Ok(Self {
            id: Uuid::new_v4(),
            home_id: home.id,
            link_id: link.id,
            home_name: home.name.clone(),
            owner_display_name: link.owner_display_name.clone(),
            tenant_name: link.tenant_name.clone(),
            rooms,
            state: SessionState::AwaitingRoom { index: 0 },
            pending: vec![None; count],
            confirmed: vec![None; count],
            created_at: now,
            updated_at: now,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn rooms(&self) -> &[RoomSnapshot] {
        &self.rooms
    }

    pub fn total_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn completed_rooms(&self) -> usize {
        self.confirmed.iter().filter(|r| r.is_some()).count()
    }

    fn current_index(&self) -> Result<usize, SessionError> {
        match self.state {
            SessionState::AwaitingRoom { index } => Ok(index),
            ref other => Err(SessionError::NotInProgress(other.name().to_string())),
        }
    }

    /// Room the tenant is on
    pub fn current_room(&self) -> Result<&RoomSnapshot, SessionError> {
        let index = self.current_index()?;
        Ok(&self.rooms[index])
    }

    /// Check that a request still targets the current room
    pub fn expect_room(&self, room_id: Option<Uuid>) -> Result<&RoomSnapshot, SessionError> {
        let room = self.current_room()?;
        match room_id {
            Some(id) if id != room.id => Err(SessionError::RoomChanged),
            _ => Ok(room),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Store the findings for the current room
    ///
    /// Replaces any earlier findings. A room that was already confirmed
    /// must be confirmed again.
    pub fn record_analysis(&mut self, findings: RoomFindings) -> Result<(), SessionError> {
        let index = self.current_index()?;
        self.pending[index] = Some(findings);
        self.confirmed[index] = None;
        self.touch();
        Ok(())
    }

    /// Findings awaiting confirmation for the current room
    pub fn pending_findings(&self) -> Option<&RoomFindings> {
        let index = self.current_index().ok()?;
        self.pending[index].as_ref()
    }

    /// Accept the current room's findings, with an optional note
    pub fn confirm(&mut self, tenant_notes: Option<String>) -> Result<&RoomInspectionReport, SessionError> {
        let index = self.current_index()?;
        let findings = self.pending[index].clone().ok_or(SessionError::NoPendingAnalysis)?;
        let room = &self.rooms[index];
        let notes = tenant_notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let report = RoomInspectionReport {
            room_id: room.id,
            room_name: room.name.clone(),
            expected_items: room.expected_items.clone(),
            discrepancies: findings.discrepancies,
            missing_item_suggestion: findings.missing_item_suggestion,
            tenant_notes: notes,
        };
        self.touch();
        Ok(self.confirmed[index].insert(report))
    }

    /// Move to the next room once the current one is confirmed
    pub fn next(&mut self) -> Result<(), SessionError> {
        let index = self.current_index()?;
        if index + 1 >= self.rooms.len() {
            return Err(SessionError::AtLastRoom);
        }
        if self.confirmed[index].is_none() {
            return Err(SessionError::RoomNotConfirmed(self.rooms[index].name.clone()));
        }
        self.state = SessionState::AwaitingRoom { index: index + 1 };
        self.touch();
        Ok(())
    }

    /// Go back one room without discarding anything
    pub fn previous(&mut self) -> Result<(), SessionError> {
        let index = self.current_index()?;
        if index == 0 {
            return Err(SessionError::AtFirstRoom);
        }
        self.state = SessionState::AwaitingRoom { index: index - 1 };
        self.touch();
        Ok(())
    }

    /// Enter `Submitting` and hand out the confirmed room reports
    ///
    /// Only allowed on the last room with every room confirmed. A failed
    /// submission that can be retried puts the session back on the last
    /// room, see [`InspectionSession::abort_submission`].
    pub fn begin_submission(&mut self) -> Result<Vec<RoomInspectionReport>, SessionError> {
        let index = self.current_index()?;
        let total = self.rooms.len();
        let completed = self.completed_rooms();
        if index + 1 != total || completed != total {
            return Err(SessionError::Incomplete { completed, total });
        }

        let rooms = self.confirmed.iter().flatten().cloned().collect();
        self.state = SessionState::Submitting;
        self.touch();
        Ok(rooms)
    }

    /// Return to the last room after a retryable failure
    pub fn abort_submission(&mut self) {
        if self.state == SessionState::Submitting {
            self.state = SessionState::AwaitingRoom {
                index: self.rooms.len() - 1,
            };
            self.touch();
        }
    }

    pub fn complete(&mut self, report_id: Uuid, email_sent: bool) {
        self.state = SessionState::Complete { report_id, email_sent };
        self.touch();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.state = SessionState::Failed { reason: reason.into() };
        self.touch();
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Complete { .. } | SessionState::Failed { .. })
    }

    /// Serializable view for the tenant UI
    pub fn view(&self) -> SessionView {
        let current = self.current_index().ok().map(|index| {
            let room = &self.rooms[index];
            CurrentRoomView {
                index,
                id: room.id,
                name: room.name.clone(),
                expected_items: room.expected_items.clone(),
                pending: self.pending[index].clone(),
                confirmed: self.confirmed[index].clone(),
                is_last: index + 1 == self.rooms.len(),
            }
        });

        SessionView {
            session_id: self.id,
            home_id: self.home_id,
            link_id: self.link_id,
            home_name: self.home_name.clone(),
            owner_display_name: self.owner_display_name.clone(),
            tenant_name: self.tenant_name.clone(),
            state: self.state.clone(),
            total_rooms: self.total_rooms(),
            completed_rooms: self.completed_rooms(),
            current_room: current,
        }
    }
}

/// Current room as shown to the tenant
#[derive(Debug, Clone, Serialize)]
pub struct CurrentRoomView {
    pub index: usize,
    pub id: Uuid,
    pub name: String,
    pub expected_items: Vec<InventoryItem>,
    pub pending: Option<RoomFindings>,
    pub confirmed: Option<RoomInspectionReport>,
    pub is_last: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub home_id: Uuid,
    pub link_id: Uuid,
    pub home_name: String,
    pub owner_display_name: String,
    pub tenant_name: String,
    #[serde(flatten)]
    pub state: SessionState,
    pub total_rooms: usize,
    pub completed_rooms: usize,
    pub current_room: Option<CurrentRoomView>,
}
