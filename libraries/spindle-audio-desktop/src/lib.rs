//! Desktop audio output implementation using CPAL
//!
//! This crate provides `CpalOutput`, the `AudioOutput` primitive the
//! playback engine runs on for cross-platform desktop playback.
//!
//! # Features
//!
//! - Cross-platform audio output using CPAL
//! - Decoding of any Symphonia-supported format from memory
//! - Automatic sample rate conversion to the device rate
//! - Gain control and a byte frequency spectrum of the output
//!
//! # Example
//!
//! ```no_run
//! use spindle_audio_desktop::CpalOutput;
//! use spindle_playback::{signal_channel, PlaybackConfig, PlaybackEngine, SystemClock};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (signals_tx, signals) = signal_channel();
//! let output = CpalOutput::new(signals_tx)?;
//!
//! let mut engine = PlaybackEngine::new(
//!     Box::new(output),
//!     Box::new(SystemClock::new()),
//!     &PlaybackConfig::default(),
//! )?;
//!
//! engine.open(std::fs::read("/music/song.flac")?);
//! if let Some(event) = engine.handle_signal(signals.recv()?) {
//!     println!("{event:?}");
//! }
//! engine.play(None);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod analyser;
pub mod decode;
mod error;
mod output;

pub use analyser::{SpectrumAnalyser, SpectrumConfig};
pub use error::{AudioError, Result};
pub use output::{CpalOutput, CpalSource};
