//! Utility modules for homie-inspect

pub mod db_retry;

pub use db_retry::{retry_on_lock, LockContention};
