//! Playback events
//!
//! Two kinds of notification leave the playback core:
//! - [`EngineEvent`]: what the engine observed while handling an output
//!   signal, consumed by the controller
//! - change notifications: the controller calls every registered listener
//!   with a [`Snapshot`] after each state-affecting operation

use crate::error::DecodeError;
use crate::output::{DecodeToken, Generation};
use serde::{Deserialize, Serialize};
use spindle_core::{PlaybackState, Track};

/// Outcome of feeding an output signal to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The pending open under `token` finished and the buffer is loaded
    Opened {
        /// Token returned by `open`/`open_track`
        token: DecodeToken,
    },

    /// The pending open under `token` was rejected by the decoder
    OpenFailed {
        /// Token returned by `open`/`open_track`
        token: DecodeToken,
        /// Decoder error
        error: DecodeError,
    },

    /// The live source played to its end
    Ended {
        /// Generation of the finished source
        generation: Generation,
    },
}

/// Read-only view of the player handed to change listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Logical play state
    pub state: PlaybackState,
    /// Track currently loaded, if any
    pub current: Option<Track>,
    /// Position in seconds
    pub position: f64,
    /// Duration in seconds (0 when nothing is known)
    pub duration: f64,
    /// Volume (0-100)
    pub volume: u8,
}

/// Identifies a registered change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Snapshot)>;

/// Registered change listeners, called in registration order
#[derive(Default)]
pub struct ChangeListeners {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl ChangeListeners {
    /// Create an empty listener set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`
    pub fn add(&mut self, listener: impl FnMut(&Snapshot) + 'static) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Call every listener with `snapshot`
    pub fn notify(&mut self, snapshot: &Snapshot) {
        for (_, listener) in &mut self.listeners {
            listener(snapshot);
        }
    }
}

impl std::fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
