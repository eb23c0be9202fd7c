//! homie-inspect library interface
//!
//! Property inventory and move-out inspection service. Exposes the router
//! and state so integration tests can drive the full HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use homie_common::events::EventBus;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::{
    InspectionSessionController, LinkLifecycleManager, MailSender, PhotoStore, PropertyManager,
    RoomAnalyzer, SessionRegistry, VisionAnalysisGateway,
};

/// Largest accepted request body; photo uploads travel base64-encoded
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// External collaborators the workflows depend on
#[derive(Clone)]
pub struct Collaborators {
    pub vision: Arc<dyn VisionAnalysisGateway>,
    pub mailer: Arc<dyn MailSender>,
    pub photos: Arc<dyn PhotoStore>,
}

/// Runtime options for [`AppState`]
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// Directory served under `/photos`
    pub photos_dir: PathBuf,
    pub public_base_url: String,
    pub vision_timeout: Duration,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub properties: PropertyManager,
    pub rooms: RoomAnalyzer,
    pub links: LinkLifecycleManager,
    pub inspections: InspectionSessionController,
    pub photos_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, collaborators: Collaborators, options: StateOptions) -> Self {
        let public_base_url = options.public_base_url.trim_end_matches('/').to_string();
        let sessions = SessionRegistry::new();
        let links = LinkLifecycleManager::new(db.clone(), event_bus.clone(), public_base_url.clone());

        let properties = PropertyManager::new(db.clone(), collaborators.photos.clone(), sessions.clone());
        let rooms = RoomAnalyzer::new(
            db.clone(),
            event_bus.clone(),
            collaborators.vision.clone(),
            collaborators.photos.clone(),
            options.vision_timeout,
        );
        let inspections = InspectionSessionController::new(
            db.clone(),
            event_bus.clone(),
            collaborators.vision,
            collaborators.mailer,
            links.clone(),
            sessions,
            options.vision_timeout,
            Some(format!("{}/homes", public_base_url)),
        );

        Self {
            db,
            event_bus,
            properties,
            rooms,
            links,
            inspections,
            photos_dir: options.photos_dir,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for the health endpoint
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let photos = ServeDir::new(state.photos_dir.clone());

    Router::new()
        .merge(api::health_routes())
        .merge(api::event_routes())
        .merge(api::short_link_routes())
        .merge(api::home_routes())
        .merge(api::room_routes())
        .merge(api::link_routes())
        .merge(api::report_routes())
        .merge(api::inspect_routes())
        .nest_service(services::photo_store::PHOTO_URL_PREFIX, photos)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
