/// Transport state
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport mode of the player
///
/// `Seeking` is transient: it is entered and left inside a single synchronous
/// engine call and is never the resting state between two actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing is sounding; position is reset
    #[default]
    Stopped,

    /// A source is live and the position advances with wall-clock time
    Playing,

    /// Halted mid-track; position is remembered
    Paused,

    /// Restarting the source at a new offset
    Seeking,
}

impl PlaybackState {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Seeking => "seeking",
        }
    }

    /// Whether a source handle is alive in this state
    pub fn has_live_source(&self) -> bool {
        matches!(self, Self::Playing | Self::Seeking)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
