//! Owner identity
//!
//! Authentication itself is out of scope for the services. An upstream
//! gateway authenticates the owner and forwards the stable owner identifier
//! in the `x-owner-id` header. Tenants never carry an owner identity; they
//! are authorized by possession of a link.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the authenticated owner identifier
pub const OWNER_HEADER: &str = "x-owner-id";

const MAX_OWNER_ID_LEN: usize = 128;

/// Stable identifier of an authenticated owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for OwnerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<String> for OwnerId {
    fn eq(&self, other: &String) -> bool {
        &self.0 == other
    }
}

/// Owner identity errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerAuthError {
    /// Header absent or blank
    Missing,
    /// Header present but unusable
    Invalid(String),
}

impl fmt::Display for OwnerAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerAuthError::Missing => write!(f, "Missing {} header", OWNER_HEADER),
            OwnerAuthError::Invalid(reason) => write!(f, "Invalid {} header: {}", OWNER_HEADER, reason),
        }
    }
}

impl std::error::Error for OwnerAuthError {}

/// Validate a raw header value into an [`OwnerId`]
///
/// Identifiers are trimmed; they must be non-empty, at most 128 characters
/// and must not contain `/` or `..` since they are used as storage path
/// segments.
pub fn parse_owner_id(raw: Option<&str>) -> Result<OwnerId, OwnerAuthError> {
    let value = raw.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(OwnerAuthError::Missing);
    }
    if value.len() > MAX_OWNER_ID_LEN {
        return Err(OwnerAuthError::Invalid(format!(
            "longer than {} characters",
            MAX_OWNER_ID_LEN
        )));
    }
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        return Err(OwnerAuthError::Invalid("contains path separators".to_string()));
    }
    if value.chars().any(char::is_control) {
        return Err(OwnerAuthError::Invalid("contains control characters".to_string()));
    }
    Ok(OwnerId(value.to_string()))
}
