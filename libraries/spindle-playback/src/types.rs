//! Configuration types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the playback engine and controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume (0-100, default: 100)
    pub volume: u8,

    /// Interval of the position/end-of-track poll while playing
    /// (milliseconds, default: 1000)
    pub poll_interval_ms: u64,
}

impl PlaybackConfig {
    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 100,
            poll_interval_ms: 1000,
        }
    }
}
