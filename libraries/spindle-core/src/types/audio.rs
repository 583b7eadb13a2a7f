/// Audio-related types
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }
}

/// Audio format information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate
    pub sample_rate: SampleRate,

    /// Number of channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,
}

impl AudioFormat {
    /// Create a new audio format
    pub fn new(sample_rate: SampleRate, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

/// Fully decoded audio, ready to be started at any offset
///
/// Samples are f32 in [-1.0, 1.0], interleaved `[L, R, L, R, ...]` for stereo.
/// The sample storage is shared, so clones are cheap and every source created
/// from the same decode plays the same memory.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    format: AudioFormat,
}

impl AudioBuffer {
    /// Create a new audio buffer
    pub fn new(samples: impl Into<Arc<[f32]>>, format: AudioFormat) -> Self {
        Self {
            samples: samples.into(),
            format,
        }
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Shared handle to the interleaved samples
    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    /// Audio format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Get the number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        match self.format.channels {
            0 => 0,
            channels => self.samples.len() / channels as usize,
        }
    }

    /// Get the duration in seconds
    pub fn duration_secs(&self) -> f64 {
        match self.format.sample_rate.as_hz() {
            0 => 0.0,
            hz => self.frames() as f64 / hz as f64,
        }
    }

    /// Get the duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    /// Interleaved sample index of the frame at `offset`, clamped to the end
    pub fn sample_index_at(&self, offset: Duration) -> usize {
        let frame = (offset.as_secs_f64() * self.format.sample_rate.as_hz() as f64) as usize;
        (frame.min(self.frames())) * self.format.channels as usize
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the length in samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }
}
