//! Playback controller - the player state machine
//!
//! Owns the engine and the catalog, tracks the logical play state, the
//! selection and the poll timer, and notifies change listeners after every
//! operation that can affect what a UI shows.
//!
//! Playing a track is two-phase: `on_play` reads the bytes and opens them,
//! and playback starts only when the matching `Opened` event comes back
//! through [`PlaybackController::handle_output`].

use crate::{
    dispatcher::Action,
    engine::PlaybackEngine,
    error::{PlaybackError, Result},
    events::{ChangeListeners, EngineEvent, ListenerId, Snapshot},
    output::{DecodeToken, OutputSignal},
    types::PlaybackConfig,
};
use spindle_core::{Catalog, PlaybackState, Step, Track, TrackId};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Periodic position/end-of-track check, armed only while playing
#[derive(Debug, Clone, Copy)]
struct PollTimer {
    armed: bool,
    interval: Duration,
}

/// Player state machine over an engine and a catalog
pub struct PlaybackController {
    engine: PlaybackEngine,
    catalog: Box<dyn Catalog>,

    /// Logical play state shown to the UI
    state: PlaybackState,

    /// Cached catalog contents, in catalog order
    tracks: Vec<Track>,

    /// Selection cursor in the track list
    selected: Option<Track>,

    poll: PollTimer,

    /// Open issued by `on_play` whose completion should start playback
    awaiting: Option<DecodeToken>,

    /// State carried by the last change notification
    notified: PlaybackState,

    listeners: ChangeListeners,
}

impl PlaybackController {
    /// Create a controller
    pub fn new(engine: PlaybackEngine, catalog: Box<dyn Catalog>, config: &PlaybackConfig) -> Self {
        Self {
            engine,
            catalog,
            state: PlaybackState::Stopped,
            notified: PlaybackState::Stopped,
            tracks: Vec::new(),
            selected: None,
            poll: PollTimer {
                armed: false,
                interval: config.poll_interval(),
            },
            awaiting: None,
            listeners: ChangeListeners::new(),
        }
    }

    // ===== Transport =====

    /// Play `track`, or resume when `None`
    ///
    /// With a track, playback starts once its decode completes. A catalog
    /// read failure is returned without touching playback state.
    pub fn on_play(&mut self, track: Option<Track>) -> Result<()> {
        match track {
            Some(track) => self.open_and_play(track),
            None => self.resume(),
        }
    }

    fn open_and_play(&mut self, track: Track) -> Result<()> {
        let bytes = self.catalog.read_bytes(&track)?;
        info!(id = %track.id, title = %track.title, "Opening track");
        self.selected = Some(track.clone());
        self.awaiting = Some(self.engine.open_track(track, bytes));
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.engine.state() == PlaybackState::Playing {
            debug!("Resume ignored, already playing");
            return Ok(());
        }
        if let Some(token) = self.awaiting {
            debug!(%token, "Resume ignored, a track is still loading");
            return Ok(());
        }

        // Stopped on a different selection: play the selection instead
        if self.engine.state() == PlaybackState::Stopped {
            let loaded = self.engine.current_track().map(|track| &track.id);
            if let Some(selected) = &self.selected {
                if loaded != Some(&selected.id) {
                    let selected = selected.clone();
                    return self.open_and_play(selected);
                }
            }
        }

        self.start_engine();
        self.emit_change();
        Ok(())
    }

    fn start_engine(&mut self) {
        if self.engine.play(None) {
            self.poll.armed = true;
            self.state = PlaybackState::Playing;
        } else {
            self.state = self.engine.state();
        }
    }

    /// Pause; only acts while playing
    pub fn on_pause(&mut self) -> Result<()> {
        if self.engine.state() != PlaybackState::Playing {
            debug!(state = %self.engine.state(), "Pause ignored");
            return Ok(());
        }

        self.engine.pause();
        self.poll.armed = false;
        self.state = PlaybackState::Paused;
        self.emit_change();
        Ok(())
    }

    /// Stop and rewind; always notifies, even when already stopped
    pub fn on_stop(&mut self) -> Result<()> {
        self.halt();
        self.emit_change();
        Ok(())
    }

    fn halt(&mut self) {
        self.poll.armed = false;
        self.awaiting = None;
        self.engine.stop();
        self.state = PlaybackState::Stopped;
    }

    /// Seek to `seconds` (clamped)
    pub fn on_seek(&mut self, seconds: f64) -> Result<()> {
        let applied = self.engine.seek(seconds);
        debug!(requested = seconds, applied, "Seek");
        self.state = self.engine.state();
        if self.state != PlaybackState::Playing {
            self.poll.armed = false;
        }
        self.emit_change();
        Ok(())
    }

    /// Set volume (0-100); out-of-range levels are ignored
    pub fn on_volume(&mut self, level: u8) -> Result<()> {
        self.engine.set_volume(level);
        self.emit_change();
        Ok(())
    }

    /// Current track finished: advance to the next one or stop
    ///
    /// A track requested while the old one was still playing keeps loading
    /// and starts when its decode lands.
    pub fn on_track_ended(&mut self) -> Result<()> {
        if let Some(token) = self.awaiting {
            debug!(%token, "Track ended while the next one is loading");
            self.poll.armed = false;
            self.engine.rewind();
            self.state = PlaybackState::Stopped;
            self.emit_change();
            return Ok(());
        }

        let finished = self.engine.current_track().cloned();
        self.halt();

        let next = finished
            .as_ref()
            .and_then(|track| self.catalog.next(track, Step::Next));

        match next {
            Some(next) => {
                info!(id = %next.id, "Advancing to next track");
                if let Err(e) = self.open_and_play(next) {
                    self.emit_change();
                    return Err(e);
                }
                Ok(())
            }
            None => {
                info!("End of catalog reached");
                self.emit_change();
                Ok(())
            }
        }
    }

    /// Poll timer fired
    ///
    /// Detects the end of the track by position and otherwise refreshes
    /// listeners with the elapsed time.
    pub fn tick(&mut self) -> Result<()> {
        if !self.poll.armed {
            return Ok(());
        }

        if self.engine.current_position() >= self.engine.duration() {
            debug!("Poll detected end of track");
            return self.on_track_ended();
        }

        self.emit_change();
        Ok(())
    }

    /// Feed an output signal through the engine and react to what it saw
    pub fn handle_output(&mut self, signal: OutputSignal) -> Result<()> {
        let Some(event) = self.engine.handle_signal(signal) else {
            return Ok(());
        };

        match event {
            EngineEvent::Opened { token } => {
                if self.awaiting == Some(token) {
                    self.awaiting = None;
                    self.start_engine();
                } else {
                    self.state = self.engine.state();
                }
                self.emit_change();
                Ok(())
            }
            EngineEvent::OpenFailed { token, error } => {
                if self.awaiting == Some(token) {
                    self.awaiting = None;
                    // An auto-advance halted playback before this open
                    if self.state != self.notified {
                        self.emit_change();
                    }
                }
                Err(PlaybackError::Decode(error))
            }
            EngineEvent::Ended { .. } => self.on_track_ended(),
        }
    }

    // ===== Catalog =====

    /// Initialise the catalog and load its tracks
    pub fn init_catalog(&mut self) -> Result<()> {
        self.catalog.init()?;
        self.tracks = self.catalog.read_all()?;
        if self.selected.is_none() {
            self.selected = self.tracks.first().cloned();
        }
        info!(tracks = self.tracks.len(), "Catalog loaded");
        self.emit_change();
        Ok(())
    }

    /// Add audio files to the catalog
    ///
    /// Every path is attempted; the first failure is returned afterwards.
    pub fn add_tracks(&mut self, paths: Vec<PathBuf>) -> Result<()> {
        let mut first_error = None;
        let mut added = 0usize;

        for path in paths {
            match self.catalog.add(&path) {
                Ok(track) => {
                    debug!(id = %track.id, "Track added");
                    added += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to add track");
                    first_error.get_or_insert(e);
                }
            }
        }

        if added > 0 {
            self.tracks = self.catalog.read_all()?;
            if self.selected.is_none() {
                self.selected = self.tracks.first().cloned();
            }
        }
        self.emit_change();

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Move the selection cursor to `track`
    pub fn select_track(&mut self, track: Track) -> Result<()> {
        if self.selected.as_ref().map(|s| &s.id) == Some(&track.id) {
            return Ok(());
        }
        if !self.tracks.iter().any(|t| t.id == track.id) {
            return Err(PlaybackError::TrackNotFound(track.id));
        }

        self.selected = Some(track);
        self.emit_change();
        Ok(())
    }

    /// Remove a track from the catalog
    ///
    /// Refused while that track is playing or paused.
    pub fn remove_track(&mut self, id: &TrackId) -> Result<()> {
        let loaded = self.engine.current_track().is_some_and(|t| &t.id == id);
        if loaded && self.engine.state() != PlaybackState::Stopped {
            return Err(PlaybackError::TrackInUse(id.clone()));
        }

        self.catalog.remove(id)?;
        self.tracks.retain(|t| &t.id != id);
        if self.selected.as_ref().is_some_and(|t| &t.id == id) {
            self.selected = None;
        }
        if loaded {
            self.engine.close();
        }
        info!(%id, "Track removed");
        self.emit_change();
        Ok(())
    }

    /// Clear the selection and unload the engine
    pub fn unselect(&mut self) -> Result<()> {
        self.halt();
        self.engine.close();
        self.selected = None;
        self.emit_change();
        Ok(())
    }

    /// Previous/next track
    ///
    /// While stopped only the selection moves; otherwise the neighbour plays.
    pub fn skip(&mut self, step: Step) -> Result<()> {
        let reference = self
            .engine
            .current_track()
            .or(self.selected.as_ref())
            .cloned();
        let Some(neighbour) = reference.and_then(|track| self.catalog.next(&track, step)) else {
            debug!(?step, "No track to skip to");
            return Ok(());
        };

        if self.state == PlaybackState::Stopped && self.awaiting.is_none() {
            self.selected = Some(neighbour);
            self.emit_change();
            return Ok(());
        }
        self.open_and_play(neighbour)
    }

    /// Apply one dispatched action
    pub fn apply(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Play(track) => self.on_play(track),
            Action::Pause => self.on_pause(),
            Action::Stop => self.on_stop(),
            Action::Seek(seconds) => self.on_seek(seconds),
            Action::Volume(level) => self.on_volume(level),
            Action::SelectTrack(track) => self.select_track(track),
            Action::AddTracks(paths) => self.add_tracks(paths),
            Action::RemoveTrack(id) => self.remove_track(&id),
            Action::InitCatalog => self.init_catalog(),
            Action::Unselect => self.unselect(),
            Action::Skip(step) => self.skip(step),
            Action::Output(signal) => self.handle_output(signal),
            Action::Tick => self.tick(),
        }
    }

    // ===== Listeners =====

    /// Register a change listener
    pub fn add_change_listener(&mut self, listener: impl FnMut(&Snapshot) + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Unregister a change listener; returns whether it was registered
    pub fn remove_change_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn emit_change(&mut self) {
        let snapshot = self.snapshot();
        self.notified = snapshot.state;
        self.listeners.notify(&snapshot);
    }

    // ===== Accessors =====

    /// Track of the loaded audio
    pub fn current(&self) -> Option<&Track> {
        self.engine.current_track()
    }

    /// Logical play state
    pub fn play_state(&self) -> PlaybackState {
        self.state
    }

    /// Duration in seconds
    ///
    /// Uses the decoded audio when loaded, else the catalog duration of the
    /// current track.
    pub fn duration(&self) -> f64 {
        let decoded = self.engine.duration();
        if decoded > 0.0 {
            return decoded;
        }
        self.current().map_or(0.0, Track::duration_seconds)
    }

    /// Position in seconds
    pub fn playback_time(&self) -> f64 {
        self.engine.current_position()
    }

    /// Volume (0-100)
    pub fn volume(&self) -> u8 {
        self.engine.volume()
    }

    /// Frequency spectrum of the current output
    pub fn spectrum(&self) -> Vec<u8> {
        self.engine.spectrum()
    }

    /// Cached catalog contents
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Selected track
    pub fn selected(&self) -> Option<&Track> {
        self.selected.as_ref()
    }

    /// Whether the poll timer is running
    pub fn poll_armed(&self) -> bool {
        self.poll.armed
    }

    /// Interval the poll timer should fire at
    pub fn poll_interval(&self) -> Duration {
        self.poll.interval
    }

    /// Whether a track open is waiting for its decode
    pub fn is_loading(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Underlying engine
    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Read-only view for listeners and UIs
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            current: self.current().cloned(),
            position: self.playback_time(),
            duration: self.duration(),
            volume: self.volume(),
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("engine", &self.engine)
            .field("tracks", &self.tracks.len())
            .field("selected", &self.selected.as_ref().map(|t| &t.id))
            .field("poll", &self.poll)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
