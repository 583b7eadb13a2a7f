//! Action dispatcher
//!
//! Every user command, output signal and poll tick enters the playback core
//! as an [`Action`] through one [`ActionDispatcher`]. Dispatch is synchronous
//! and single-threaded; a handler that dispatches while it is being
//! dispatched to is a programming error.

use crate::{
    controller::PlaybackController,
    error::{DispatchError, Result},
    output::OutputSignal,
};
use spindle_core::{Step, Track, TrackId};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{error, trace};

/// Commands understood by the playback core
#[derive(Debug, Clone)]
pub enum Action {
    /// Play the given track, or resume when `None`
    Play(Option<Track>),
    /// Pause playback
    Pause,
    /// Stop playback
    Stop,
    /// Seek to a position in seconds
    Seek(f64),
    /// Set volume (0-100)
    Volume(u8),
    /// Move the selection cursor
    SelectTrack(Track),
    /// Add audio files to the catalog
    AddTracks(Vec<PathBuf>),
    /// Remove a track from the catalog
    RemoveTrack(TrackId),
    /// Initialise the catalog
    InitCatalog,
    /// Clear the selection and unload
    Unselect,
    /// Previous/next track
    Skip(Step),
    /// Completion posted by the output primitive
    Output(OutputSignal),
    /// Poll timer fired
    Tick,
}

impl Action {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Action::Play(_) => "play",
            Action::Pause => "pause",
            Action::Stop => "stop",
            Action::Seek(_) => "seek",
            Action::Volume(_) => "volume",
            Action::SelectTrack(_) => "select_track",
            Action::AddTracks(_) => "add_tracks",
            Action::RemoveTrack(_) => "remove_track",
            Action::InitCatalog => "init_catalog",
            Action::Unselect => "unselect",
            Action::Skip(_) => "skip",
            Action::Output(_) => "output",
            Action::Tick => "tick",
        }
    }
}

/// Receiver of dispatched actions
pub trait ActionHandler {
    /// Handle one action
    fn handle(&mut self, action: Action) -> Result<()>;
}

impl ActionHandler for PlaybackController {
    fn handle(&mut self, action: Action) -> Result<()> {
        self.apply(action)
    }
}

/// Shared handler, so a UI can keep reading the controller it registered
impl<H: ActionHandler> ActionHandler for Rc<RefCell<H>> {
    fn handle(&mut self, action: Action) -> Result<()> {
        self.borrow_mut().handle(action)
    }
}

#[derive(Default)]
struct DispatcherInner {
    handler: RefCell<Option<Box<dyn ActionHandler>>>,
    dispatching: Cell<bool>,
}

/// Single-threaded action dispatcher
///
/// Cloning yields another handle onto the same dispatcher.
#[derive(Clone, Default)]
pub struct ActionDispatcher {
    inner: Rc<DispatcherInner>,
}

/// Clears the in-flight flag when dispatch returns or unwinds
struct InFlight<'a>(&'a Cell<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl ActionDispatcher {
    /// Create a dispatcher with no handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler pipeline; only one is allowed
    pub fn register(
        &self,
        handler: impl ActionHandler + 'static,
    ) -> std::result::Result<(), DispatchError> {
        let mut slot = self
            .inner
            .handler
            .try_borrow_mut()
            .map_err(|_| DispatchError::Reentrant)?;
        if slot.is_some() {
            return Err(DispatchError::AlreadyRegistered);
        }
        *slot = Some(Box::new(handler));
        Ok(())
    }

    /// Whether a handler is registered
    pub fn is_registered(&self) -> bool {
        match self.inner.handler.try_borrow() {
            Ok(slot) => slot.is_some(),
            // Borrowed mutably only while dispatching to a handler
            Err(_) => true,
        }
    }

    /// Synchronously hand `action` to the registered handler
    ///
    /// # Panics
    ///
    /// In debug builds, when called from inside a handler. Release builds log
    /// and return `DispatchError::Reentrant` instead.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        if self.inner.dispatching.get() {
            if cfg!(debug_assertions) {
                panic!("re-entrant dispatch of `{}`", action.name());
            }
            error!(action = action.name(), "Re-entrant dispatch rejected");
            return Err(DispatchError::Reentrant.into());
        }

        let mut slot = self.inner.handler.borrow_mut();
        let handler = slot.as_mut().ok_or(DispatchError::NoHandler)?;

        self.inner.dispatching.set(true);
        let _in_flight = InFlight(&self.inner.dispatching);

        trace!(action = action.name(), "Dispatch");
        handler.handle(action)
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("registered", &self.is_registered())
            .field("dispatching", &self.inner.dispatching.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<&'static str>,
    }

    impl ActionHandler for Recorder {
        fn handle(&mut self, action: Action) -> Result<()> {
            self.seen.push(action.name());
            Ok(())
        }
    }

    #[test]
    fn dispatch_without_handler_fails() {
        let dispatcher = ActionDispatcher::new();
        let err = dispatcher.dispatch(Action::Stop).unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::Dispatch(DispatchError::NoHandler)
        ));
    }

    #[test]
    fn second_registration_is_rejected() {
        let dispatcher = ActionDispatcher::new();
        dispatcher.register(Recorder::default()).unwrap();
        assert_eq!(
            dispatcher.register(Recorder::default()),
            Err(DispatchError::AlreadyRegistered)
        );
    }

    #[test]
    fn shared_handler_stays_readable() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let dispatcher = ActionDispatcher::new();
        dispatcher.register(Rc::clone(&recorder)).unwrap();

        dispatcher.dispatch(Action::Pause).unwrap();
        dispatcher.clone().dispatch(Action::Tick).unwrap();

        assert_eq!(recorder.borrow().seen, vec!["pause", "tick"]);
    }
}
