//! Server-Sent Events (SSE) utilities

use crate::events::HomeEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const HEARTBEAT_SECS: u64 = 15;

/// Build the SSE wire event for a domain event
///
/// Returns `None` if the event cannot be serialized.
pub fn to_sse_event(event: &HomeEvent) -> Option<Event> {
    let event_type = event.event_type();
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event_type).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}

/// Create an SSE stream forwarding the events of a single owner
///
/// A `ConnectionStatus` event is sent first, followed by matching events and
/// a heartbeat comment every 15 seconds. Lagged receivers skip the missed
/// events and keep streaming.
pub fn create_owner_event_stream(
    service_name: &'static str,
    mut rx: broadcast::Receiver<HomeEvent>,
    owner_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(HEARTBEAT_SECS)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if event.owner_id() != owner_id {
                                continue;
                            }
                            if let Some(sse_event) = to_sse_event(&event) {
                                debug!("SSE: Broadcasting event: {}", event.event_type());
                                yield Ok(sse_event);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("SSE: Client lagged, skipped {} events", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("SSE: Event bus closed, ending {} stream", service_name);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(HEARTBEAT_SECS))
            .text("heartbeat"),
    )
}
