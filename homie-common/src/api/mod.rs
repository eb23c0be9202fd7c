//! Shared HTTP API helpers
//!
//! Pure functions only; framework-specific extractors live in the service crates.

pub mod auth;

pub use auth::{parse_owner_id, OwnerAuthError, OwnerId, OWNER_HEADER};
