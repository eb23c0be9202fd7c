//! Server-Sent Events for owner dashboards
//!
//! Streams room analysis, link and submission events of the requesting
//! owner's homes.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;

use super::Owner;
use crate::AppState;

/// GET /events
pub async fn event_stream(
    State(state): State<AppState>,
    Owner(owner): Owner,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    homie_common::sse::create_owner_event_stream(
        "homie-inspect",
        state.event_bus.subscribe(),
        owner.to_string(),
    )
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
