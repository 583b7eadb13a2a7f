//! Spindle - Playback Engine
//!
//! Platform-agnostic playback core for Spindle.
//!
//! This crate provides:
//! - Full transport (play, pause, stop, seek, volume) over an output that can
//!   only start a source once and stop it
//! - Position tracking from timestamps instead of device polling
//! - Protection against stale completions (superseded decodes, sources that
//!   finish after being replaced)
//! - Automatic advance to the next catalog track
//! - A single-threaded action dispatcher and change listeners for UIs
//!
//! # Architecture
//!
//! `spindle-playback` does not talk to any audio backend:
//! - No dependency on CPAL or symphonia
//! - No dependency on catalog storage
//!
//! The audio layer is provided through [`AudioOutput`]; asynchronous
//! completions come back as [`OutputSignal`]s that the event loop dispatches
//! as [`Action::Output`].
//!
//! # Example: Play a Track
//!
//! ```rust
//! use spindle_core::{MemoryCatalog, PlaybackState, Track};
//! use spindle_playback::test_utils::FakeOutput;
//! use spindle_playback::{
//!     signal_channel, Action, ActionDispatcher, ManualClock, PlaybackConfig,
//!     PlaybackController, PlaybackEngine,
//! };
//! use std::cell::RefCell;
//! use std::path::PathBuf;
//! use std::rc::Rc;
//!
//! let (signals_tx, signals) = signal_channel();
//! let (output, probe) = FakeOutput::new(signals_tx);
//! let config = PlaybackConfig::default();
//! let engine = PlaybackEngine::new(Box::new(output), Box::new(ManualClock::new()), &config)?;
//!
//! let track = Track::new("Song", PathBuf::from("/music/song.flac")).with_id("song");
//! let mut catalog = MemoryCatalog::with_tracks(vec![track.clone()]);
//! catalog.set_payload(track.id.clone(), FakeOutput::encode(180.0));
//!
//! let controller = Rc::new(RefCell::new(PlaybackController::new(
//!     engine,
//!     Box::new(catalog),
//!     &config,
//! )));
//! let dispatcher = ActionDispatcher::new();
//! dispatcher.register(Rc::clone(&controller))?;
//!
//! dispatcher.dispatch(Action::InitCatalog)?;
//! dispatcher.dispatch(Action::Play(Some(track)))?;
//!
//! // The decode finishes on the output's side
//! probe.complete_next_decode();
//! for signal in signals.try_iter() {
//!     dispatcher.dispatch(Action::Output(signal))?;
//! }
//!
//! assert_eq!(controller.borrow().play_state(), PlaybackState::Playing);
//! # Ok::<(), spindle_playback::PlaybackError>(())
//! ```

mod clock;
mod controller;
mod dispatcher;
mod engine;
mod error;
mod events;
mod output;
pub mod test_utils;
pub mod types;

// Public exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::PlaybackController;
pub use dispatcher::{Action, ActionDispatcher, ActionHandler};
pub use engine::{PlaybackEngine, PlaybackSession};
pub use error::{DecodeError, DispatchError, OutputError, PlaybackError, Result};
pub use events::{ChangeListeners, EngineEvent, ListenerId, Snapshot};
pub use output::{
    signal_channel, AudioOutput, DecodeToken, Generation, OutputSignal, SignalReceiver,
    SignalSender, SourceHandle,
};
pub use types::PlaybackConfig;
