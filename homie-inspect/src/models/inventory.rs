//! Inventory and comparison value types

use serde::{Deserialize, Serialize};

/// One kind of object seen in a room, with how many of it there are
///
/// Names are free text. Two items are the same kind when their names match
/// after trimming and lowercasing; see [`InventoryItem::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    pub count: u32,
}

impl InventoryItem {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }

    /// Identity key used for matching (trimmed, lowercased name)
    pub fn key(&self) -> String {
        item_key(&self.name)
    }
}

/// Identity key for a free-text item name
pub fn item_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A shortfall between what the owner expects and what the tenant's photos show
///
/// Only shortfalls are reported: `actual_count < expected_count` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub name: String,
    pub expected_count: u32,
    pub actual_count: u32,
    pub note: String,
}

impl Discrepancy {
    pub fn is_fully_missing(&self) -> bool {
        self.actual_count == 0
    }

    pub fn shortfall(&self) -> u32 {
        self.expected_count.saturating_sub(self.actual_count)
    }
}

/// Result of comparing a room's photos against its expected inventory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomFindings {
    pub discrepancies: Vec<Discrepancy>,
    /// Single hint naming the most notable missing item; empty when nothing
    /// is missing
    pub missing_item_suggestion: String,
}

/// An uploaded image held in memory
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PhotoData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Image types accepted for upload
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Largest accepted photo (bytes)
pub const MAX_PHOTO_BYTES: usize = 15 * 1024 * 1024;

impl PhotoData {
    /// Validate an upload
    ///
    /// The declared type must be one of [`ALLOWED_IMAGE_TYPES`], the payload
    /// must be non-empty and no larger than [`MAX_PHOTO_BYTES`], and the bytes
    /// must sniff as the declared type.
    pub fn validated(mime_type: &str, bytes: Vec<u8>) -> Result<Self, String> {
        let mime_type = normalize_mime(mime_type);
        if !ALLOWED_IMAGE_TYPES.contains(&mime_type.as_str()) {
            return Err(format!(
                "Unsupported image type {:?}; accepted: {}",
                mime_type,
                ALLOWED_IMAGE_TYPES.join(", ")
            ));
        }
        if bytes.is_empty() {
            return Err("Photo is empty".to_string());
        }
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(format!(
                "Photo is {} bytes; limit is {} bytes",
                bytes.len(),
                MAX_PHOTO_BYTES
            ));
        }
        match infer::get(&bytes) {
            Some(kind) if kind.mime_type() == mime_type => {}
            Some(kind) => {
                return Err(format!(
                    "Photo declared as {} but content is {}",
                    mime_type,
                    kind.mime_type()
                ))
            }
            None => return Err(format!("Photo content is not a recognizable {}", mime_type)),
        }
        Ok(Self { mime_type, bytes })
    }

    /// File extension for the photo's type
    pub fn extension(&self) -> &'static str {
        extension_for(&self.mime_type)
    }
}

fn normalize_mime(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        _ => lowered,
    }
}

/// File extension for an accepted image type
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

/// Image type implied by a stored file name
pub fn mime_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Smallest byte prefixes `infer` recognizes for each accepted type
    pub const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, 0x4A, 0x46, 0x49, 0x46];
}
