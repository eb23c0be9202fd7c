//! # Homie Common Library
//!
//! Shared code for the Homie inventory and inspection services:
//! - Error types
//! - Event types (HomieEvent enum) and EventBus
//! - Owner identity helpers
//! - Configuration loading
//! - SSE and timestamp utilities

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
