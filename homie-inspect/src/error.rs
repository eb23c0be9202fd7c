//! Error types for homie-inspect

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::inspection_session::SessionError;
use crate::services::link_lifecycle::LinkError;
use crate::services::mail_client::MailError;
use crate::services::photo_store::StorageError;
use crate::services::vision_client::VisionError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No owner identity on an owner-only route (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Actor does not own the resource (403)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Tenant link does not exist for this home (404)
    #[error("Inspection link not found")]
    LinkNotFound,

    /// Tenant link was already used (410)
    #[error("Inspection link is no longer active")]
    LinkInactive,

    /// Tenant link is past its validity window (410)
    #[error("Inspection link has expired")]
    LinkExpired,

    /// Another analysis holds the room (409)
    #[error("Room {0} is already being analyzed")]
    RoomBusy(uuid::Uuid),

    /// Submission attempted before every room was inspected (409)
    #[error("Please complete the inspection for all {total} rooms. Only {completed} completed.")]
    IncompleteInspection { completed: usize, total: usize },

    /// The vision model failed or returned unusable output (502)
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// The mail provider refused or could not be reached (502)
    #[error("Mail delivery failed: {0}")]
    MailFailed(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// homie-common error
    #[error("Common error: {0}")]
    Common(#[from] homie_common::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::LinkNotFound => (StatusCode::NOT_FOUND, "LINK_NOT_FOUND"),
            ApiError::LinkInactive => (StatusCode::GONE, "LINK_INACTIVE"),
            ApiError::LinkExpired => (StatusCode::GONE, "LINK_EXPIRED"),
            ApiError::RoomBusy(_) => (StatusCode::CONFLICT, "ROOM_BUSY"),
            ApiError::IncompleteInspection { .. } => (StatusCode::CONFLICT, "INCOMPLETE_INSPECTION"),
            ApiError::AnalysisFailed(_) => (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED"),
            ApiError::MailFailed(_) => (StatusCode::BAD_GATEWAY, "MAIL_FAILED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Common(err) => match err {
                homie_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                homie_common::Error::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
                homie_common::Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                homie_common::Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
            },
        }
    }

    /// Stable machine-readable code, as sent in the response body
    pub fn code(&self) -> &'static str {
        self.parts().1
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "Request failed");
        }

        let message = match &self {
            ApiError::Unauthenticated(msg)
            | ApiError::PermissionDenied(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::AnalysisFailed(msg)
            | ApiError::MailFailed(msg)
            | ApiError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let ApiError::IncompleteInspection { completed, total } = &self {
            error["details"] = json!({ "completed": completed, "total": total });
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NotFound => ApiError::LinkNotFound,
            LinkError::Inactive => ApiError::LinkInactive,
            LinkError::Expired => ApiError::LinkExpired,
            LinkError::Database(e) => ApiError::Common(e),
        }
    }
}

impl From<VisionError> for ApiError {
    fn from(err: VisionError) -> Self {
        ApiError::AnalysisFailed(err.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::MailFailed(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidLocation(msg) => ApiError::BadRequest(msg),
            StorageError::NotFound(msg) => ApiError::NotFound(msg),
            StorageError::Io(e) => ApiError::Io(e),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Incomplete { completed, total } => {
                ApiError::IncompleteInspection { completed, total }
            }
            SessionError::NoPhotos | SessionError::AtFirstRoom | SessionError::AtLastRoom => {
                ApiError::BadRequest(err.to_string())
            }
            SessionError::NoRooms
            | SessionError::NotInProgress(_)
            | SessionError::NoPendingAnalysis
            | SessionError::RoomNotConfirmed(_)
            | SessionError::RoomChanged => ApiError::Conflict(err.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
