/// Catalog error types
use crate::types::TrackId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `CatalogError`
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors raised by a `Catalog` implementation
///
/// These never affect playback state; callers surface them as-is.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Track not found in the catalog
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Path cannot be cataloged (no file name, not audio, ...)
    #[error("Invalid track path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors (reading track bytes, scanning files)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
