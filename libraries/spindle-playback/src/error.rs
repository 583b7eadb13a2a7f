//! Error types for playback management

use spindle_core::{CatalogError, TrackId};
use thiserror::Error;

/// The output primitive rejected the encoded audio
///
/// Raised for unsupported or corrupt input. The engine state is left exactly
/// as it was before the `open` that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to decode audio data: {message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    /// Create a decode error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable cause
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised by an output primitive outside of decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// No usable audio subsystem on the host
    #[error("Audio output unavailable: {0}")]
    Unavailable(String),

    /// A source could not be started
    #[error("Failed to start source: {0}")]
    Start(String),
}

/// Dispatcher misuse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A handler dispatched while another dispatch was in flight
    #[error("Re-entrant dispatch rejected")]
    Reentrant,

    /// `dispatch` called before `register`
    #[error("No handler registered")]
    NoHandler,

    /// A second handler was registered
    #[error("A handler is already registered")]
    AlreadyRegistered,
}

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Audio could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Catalog collaborator failure; playback state is unaffected
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The output primitive is missing or broken
    #[error(transparent)]
    OutputUnavailable(#[from] OutputError),

    /// Track is not in the loaded catalog
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Track cannot be removed while it is loaded for playback
    #[error("Track is in use: {0}")]
    TrackInUse(TrackId),

    /// Dispatcher misuse
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
