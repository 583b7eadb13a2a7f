//! Audio output primitive
//!
//! Abstracts the platform audio layer down to the three things it reliably
//! offers: decode a byte buffer, start a one-shot source at an offset, and
//! stop that source. There is no native pause and no native seek; the engine
//! builds both on top of these capabilities.
//!
//! Asynchronous completions (decode results, natural end of a source) are not
//! delivered as callbacks into the engine. The primitive posts an
//! [`OutputSignal`] on the channel it was constructed with, and the owner of
//! the event loop feeds the signal back through the dispatcher. Every signal
//! carries the token or generation it was issued under so the engine can
//! recognise and drop stale ones.

use crate::error::{DecodeError, OutputError};
use crossbeam_channel::{Receiver, Sender};
use spindle_core::AudioBuffer;
use std::fmt;
use std::time::Duration;

/// Identity of one live source
///
/// Issued in strictly increasing order by the engine; a natural-end signal is
/// honoured only if its generation matches the source that is live right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Wrap a raw counter value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Identity of one `open` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecodeToken(u64);

impl DecodeToken {
    /// Wrap a raw counter value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DecodeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decode#{}", self.0)
    }
}

/// Asynchronous completion posted by an output primitive
#[derive(Debug, Clone)]
pub enum OutputSignal {
    /// A decode requested under `token` finished
    Decoded {
        /// Token passed to [`AudioOutput::decode`]
        token: DecodeToken,
        /// Decoded audio, or why the primitive rejected the bytes
        result: Result<AudioBuffer, DecodeError>,
    },

    /// The source created under `generation` played to its end
    Ended {
        /// Generation passed to [`AudioOutput::create_source`]
        generation: Generation,
    },
}

/// Sending half of the signal channel, handed to the primitive
pub type SignalSender = Sender<OutputSignal>;

/// Receiving half of the signal channel, drained by the event loop
pub type SignalReceiver = Receiver<OutputSignal>;

/// Create the channel an output primitive posts its signals on
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    crossbeam_channel::unbounded()
}

/// Platform audio layer
///
/// Implementations: `CpalOutput` on desktop, `test_utils::FakeOutput` in tests.
pub trait AudioOutput {
    /// Check that the audio subsystem is usable
    ///
    /// Called once when the engine is constructed so that a missing device
    /// fails early instead of on the first `play`.
    fn probe(&self) -> Result<(), OutputError> {
        Ok(())
    }

    /// Start decoding `bytes`
    ///
    /// Must not block on the decode. Completion is reported exactly once as
    /// [`OutputSignal::Decoded`] carrying `token`.
    fn decode(&mut self, bytes: Vec<u8>, token: DecodeToken);

    /// Create a one-shot source over `buffer`
    ///
    /// The source stays silent until [`SourceHandle::start`]. When it plays to
    /// the end it posts [`OutputSignal::Ended`] with `generation`, unless it
    /// was disowned first.
    fn create_source(&mut self, buffer: &AudioBuffer, generation: Generation)
        -> Box<dyn SourceHandle>;

    /// Set output gain (0.0 - 1.0)
    fn set_gain(&mut self, gain: f32);

    /// Current output gain (0.0 - 1.0)
    fn gain(&self) -> f32;

    /// Frequency spectrum of the most recent output, one byte per bin
    fn spectrum(&self) -> Vec<u8>;
}

/// One start-once playback instance
pub trait SourceHandle {
    /// Generation this source was created under
    fn generation(&self) -> Generation;

    /// Begin playback at `offset` into the buffer
    ///
    /// A source can be started at most once.
    fn start(&mut self, offset: Duration) -> Result<(), OutputError>;

    /// Withdraw the natural-end signal
    ///
    /// After this the source never posts [`OutputSignal::Ended`], so a
    /// programmatic stop cannot be mistaken for the track finishing.
    fn disown(&mut self);

    /// Silence the source and release its device resources
    fn stop(&mut self);
}
