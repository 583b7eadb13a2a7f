//! Track catalog collaborator
//!
//! The catalog owns the persisted track list. Playback code only enumerates
//! it, asks for neighbours and reads track bytes; it never mutates tracks.

use crate::error::{CatalogError, Result};
use crate::types::{Track, TrackId};
use std::collections::HashMap;
use std::path::Path;

/// Direction used when asking the catalog for a neighbouring track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// The track after the reference track
    #[default]
    Next,
    /// The track before the reference track
    Previous,
}

/// Persisted collection of tracks
///
/// Implementations are substituted freely (storage-backed in production,
/// `MemoryCatalog` or a mock in tests), so playback code takes a
/// `Box<dyn Catalog>` rather than any concrete store.
pub trait Catalog {
    /// Prepare the backing store
    fn init(&mut self) -> Result<()>;

    /// Enumerate every track in catalog order
    fn read_all(&self) -> Result<Vec<Track>>;

    /// Add the audio file at `path`, returning the new catalog entry
    fn add(&mut self, path: &Path) -> Result<Track>;

    /// Remove the track with the given id
    fn remove(&mut self, id: &TrackId) -> Result<()>;

    /// Neighbour of `track` in catalog order
    ///
    /// Returns `None` when `track` is not cataloged or has no neighbour in
    /// that direction.
    fn next(&self, track: &Track, step: Step) -> Option<Track>;

    /// Raw encoded bytes of a track
    fn read_bytes(&self, track: &Track) -> Result<Vec<u8>> {
        Ok(std::fs::read(&track.path)?)
    }
}

/// In-process catalog
///
/// Keeps tracks in insertion order. Byte payloads can be attached per track
/// so callers that have no file on disk can still be played; tracks without a
/// payload are read from their path.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tracks: Vec<Track>,
    payloads: HashMap<TrackId, Vec<u8>>,
    initialized: bool,
}

impl MemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding `tracks` in order
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            ..Self::default()
        }
    }

    /// Append an already-built track
    pub fn insert(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Attach in-memory bytes returned by `read_bytes` for `id`
    pub fn set_payload(&mut self, id: TrackId, bytes: Vec<u8>) {
        self.payloads.insert(id, bytes);
    }

    /// Number of cataloged tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Whether `init` has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Catalog for MemoryCatalog {
    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        tracing::debug!(tracks = self.tracks.len(), "memory catalog initialized");
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.clone())
    }

    fn add(&mut self, path: &Path) -> Result<Track> {
        let track =
            Track::from_path(path).ok_or_else(|| CatalogError::InvalidPath(path.to_path_buf()))?;
        tracing::debug!(id = %track.id, path = %path.display(), "track added");
        self.tracks.push(track.clone());
        Ok(track)
    }

    fn remove(&mut self, id: &TrackId) -> Result<()> {
        let before = self.tracks.len();
        self.tracks.retain(|track| &track.id != id);
        if self.tracks.len() == before {
            return Err(CatalogError::TrackNotFound(id.clone()));
        }
        self.payloads.remove(id);
        Ok(())
    }

    fn next(&self, track: &Track, step: Step) -> Option<Track> {
        let index = self.tracks.iter().position(|t| t.id == track.id)?;
        let neighbour = match step {
            Step::Next => index.checked_add(1)?,
            Step::Previous => index.checked_sub(1)?,
        };
        self.tracks.get(neighbour).cloned()
    }

    fn read_bytes(&self, track: &Track) -> Result<Vec<u8>> {
        if let Some(bytes) = self.payloads.get(&track.id) {
            return Ok(bytes.clone());
        }
        Ok(std::fs::read(&track.path)?)
    }
}
