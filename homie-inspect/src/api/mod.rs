//! HTTP API handlers for homie-inspect
//!
//! Owner routes identify the owner through the `x-owner-id` header. Tenant
//! routes under `/inspect` are authorized by the link alone.

pub mod auth;
pub mod health;
pub mod homes;
pub mod inspect;
pub mod links;
pub mod payload;
pub mod reports;
pub mod rooms;
pub mod short_links;
pub mod sse;

pub use auth::Owner;
pub use health::health_routes;
pub use homes::home_routes;
pub use inspect::inspect_routes;
pub use links::link_routes;
pub use reports::report_routes;
pub use rooms::room_routes;
pub use short_links::short_link_routes;
pub use sse::event_routes;
