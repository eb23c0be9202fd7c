//! Photo storage
//!
//! Photos are addressed by URL path (`/photos/<scope>/<file>`). The local
//! implementation keeps them under `<root>/photos` and the same tree is
//! served read-only by the HTTP router.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::models::inventory::mime_for_path;
use crate::models::PhotoData;

/// URL prefix under which stored photos are served
pub const PHOTO_URL_PREFIX: &str = "/photos";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid photo location: {0}")]
    InvalidLocation(String),

    #[error("Photo not found: {0}")]
    NotFound(String),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Folder a photo belongs to
#[derive(Debug, Clone, Copy)]
pub enum PhotoScope<'a> {
    /// Owner photos of a room
    Room { owner_id: &'a str, room_id: Uuid },
    /// Cover image of a home
    Cover { owner_id: &'a str, home_id: Uuid },
}

impl PhotoScope<'_> {
    /// Relative folder for the scope
    pub fn folder(&self) -> String {
        match self {
            PhotoScope::Room { owner_id, room_id } => format!("rooms/{}/{}", owner_id, room_id),
            PhotoScope::Cover { owner_id, home_id } => format!("covers/{}/{}", owner_id, home_id),
        }
    }

    /// True if `url` points into this scope's folder
    pub fn contains(&self, url: &str) -> bool {
        let prefix = format!("{}/{}/", PHOTO_URL_PREFIX, self.folder());
        url.starts_with(&prefix) && relative_path(url).is_ok()
    }
}

/// Blob storage for photos
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Store a photo and return its URL
    async fn put(&self, scope: PhotoScope<'_>, photo: &PhotoData) -> Result<String, StorageError>;

    /// Read a stored photo back
    async fn load(&self, url: &str) -> Result<PhotoData, StorageError>;

    /// Delete a photo; deleting an absent photo succeeds
    async fn delete(&self, url: &str) -> Result<(), StorageError>;

    /// Delete every photo in a scope; an absent folder succeeds
    async fn delete_scope(&self, scope: PhotoScope<'_>) -> Result<(), StorageError>;
}

/// Filesystem-backed [`PhotoStore`]
#[derive(Debug, Clone)]
pub struct LocalPhotoStore {
    root: PathBuf,
}

impl LocalPhotoStore {
    /// `root` is the directory served at [`PHOTO_URL_PREFIX`]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, url: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(relative_path(url)?))
    }
}

/// Validate a photo URL and return its path relative to the store root
fn relative_path(url: &str) -> Result<PathBuf, StorageError> {
    let rest = url
        .strip_prefix(PHOTO_URL_PREFIX)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(|| StorageError::InvalidLocation(url.to_string()))?;

    let relative = PathBuf::from(rest);
    let clean = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if rest.is_empty() || !clean {
        return Err(StorageError::InvalidLocation(url.to_string()));
    }
    Ok(relative)
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    async fn put(&self, scope: PhotoScope<'_>, photo: &PhotoData) -> Result<String, StorageError> {
        let folder = scope.folder();
        let file_name = format!("{}.{}", Uuid::new_v4(), photo.extension());
        let url = format!("{}/{}/{}", PHOTO_URL_PREFIX, folder, file_name);
        let path = self.path_for(&url)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &photo.bytes).await?;

        tracing::debug!(url = %url, bytes = photo.bytes.len(), "Stored photo");
        Ok(url)
    }

    async fn load(&self, url: &str) -> Result<PhotoData, StorageError> {
        let path = self.path_for(url)?;
        let mime_type = mime_for_path(url)
            .ok_or_else(|| StorageError::InvalidLocation(url.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(PhotoData {
                mime_type: mime_type.to_string(),
                bytes,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.path_for(url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(url = %url, "Photo already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_scope(&self, scope: PhotoScope<'_>) -> Result<(), StorageError> {
        let path = self.root.join(scope.folder());
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
