//! Photo payloads
//!
//! Photos travel inside JSON bodies as base64 with their declared type.
//! A `data:` URL prefix is accepted and stripped.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::PhotoData;

/// Most photos accepted in one request
pub const MAX_PHOTOS_PER_REQUEST: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoPayload {
    pub mime_type: String,
    /// Base64 image bytes
    pub data: String,
}

impl PhotoPayload {
    /// Decode and validate
    pub fn decode(&self) -> ApiResult<PhotoData> {
        let encoded = match self.data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => self.data.as_str(),
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ApiError::BadRequest(format!("Photo is not valid base64: {}", e)))?;

        PhotoData::validated(&self.mime_type, bytes).map_err(ApiError::BadRequest)
    }
}

/// Decode a batch of photos, rejecting empty and oversized batches
pub fn decode_photos(payloads: &[PhotoPayload]) -> ApiResult<Vec<PhotoData>> {
    if payloads.is_empty() {
        return Err(ApiError::BadRequest("At least one photo is required".to_string()));
    }
    if payloads.len() > MAX_PHOTOS_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "At most {} photos per request",
            MAX_PHOTOS_PER_REQUEST
        )));
    }
    payloads.iter().map(PhotoPayload::decode).collect()
}
