/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Audio track as stored in the catalog
///
/// Immutable once read from the catalog. Playback code keeps copies and never
/// writes back through them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// File path on disk
    pub path: PathBuf,

    /// Track title
    pub title: String,

    /// Artist name (empty when unknown)
    #[serde(default)]
    pub artist: String,

    /// Album name (empty when unknown)
    #[serde(default)]
    pub album: String,

    /// Track duration as reported by the catalog
    #[serde(default, with = "duration_secs")]
    pub duration: Duration,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(title: impl Into<String>, path: PathBuf) -> Self {
        Self {
            id: TrackId::generate(),
            path,
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration: Duration::ZERO,
        }
    }

    /// Create a track for a file, titled after its file stem
    ///
    /// Returns `None` when the path has no usable file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let title = path.file_stem()?.to_str()?.to_string();
        Some(Self::new(title, path.to_path_buf()))
    }

    /// Replace the identifier
    #[must_use]
    pub fn with_id(mut self, id: impl Into<TrackId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the artist
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    /// Set the album
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    /// Set the duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

// Durations are persisted as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if secs.is_finite() && secs >= 0.0 {
            Ok(Duration::from_secs_f64(secs))
        } else {
            Err(serde::de::Error::custom(format!("invalid duration: {secs}")))
        }
    }
}
