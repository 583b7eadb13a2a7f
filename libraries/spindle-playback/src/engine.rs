//! Playback engine - start/stop primitive to full transport
//!
//! The output primitive can only start a source once and stop it. Pause is
//! implemented as "remember the position, stop the source"; resume and seek
//! while playing create a fresh source at the remembered offset. Position is
//! derived from a baseline plus the wall-clock time elapsed since that
//! baseline was taken.
//!
//! Every source carries a [`Generation`] and every open a [`DecodeToken`].
//! Signals that arrive for anything but the live generation or the pending
//! token are stale and are dropped without touching the session.

use crate::{
    clock::Clock,
    error::{DecodeError, Result},
    events::EngineEvent,
    output::{AudioOutput, DecodeToken, Generation, OutputSignal, SourceHandle},
    types::PlaybackConfig,
};
use spindle_core::{AudioBuffer, PlaybackState, Track};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Playback session bookkeeping
///
/// Owned by the engine; readers get it through [`PlaybackEngine::session`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    /// Track whose audio is loaded, if it was opened through `open_track`
    pub current_track: Option<Track>,

    /// Position at the moment of the last transition (seconds)
    pub position_baseline_seconds: f64,

    /// Clock reading when the baseline was taken (milliseconds)
    pub baseline_timestamp_millis: u64,

    /// Volume (0-100)
    pub volume: u8,

    /// Transport state
    pub state: PlaybackState,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_track: None,
            position_baseline_seconds: 0.0,
            baseline_timestamp_millis: 0,
            volume: 100,
            state: PlaybackState::Stopped,
        }
    }
}

#[derive(Debug)]
struct PendingOpen {
    token: DecodeToken,
    track: Option<Track>,
}

/// Transport over a start-once output primitive
pub struct PlaybackEngine {
    output: Box<dyn AudioOutput>,
    clock: Box<dyn Clock>,

    /// Decoded audio of the loaded track
    buffer: Option<AudioBuffer>,

    session: PlaybackSession,

    /// Live source; `Some` exactly while Playing or Seeking
    source: Option<Box<dyn SourceHandle>>,

    /// Open awaiting its decode completion
    pending: Option<PendingOpen>,

    last_generation: u64,
    last_token: u64,
}

impl PlaybackEngine {
    /// Create an engine over `output`
    ///
    /// Probes the output immediately so that a host without audio fails here
    /// rather than on the first `play`.
    pub fn new(
        output: Box<dyn AudioOutput>,
        clock: Box<dyn Clock>,
        config: &PlaybackConfig,
    ) -> Result<Self> {
        output.probe()?;

        let mut engine = Self {
            output,
            clock,
            buffer: None,
            session: PlaybackSession::default(),
            source: None,
            pending: None,
            last_generation: 0,
            last_token: 0,
        };
        engine.apply_volume(config.volume.min(100));
        Ok(engine)
    }

    /// Decode `bytes` without associating a track
    pub fn open(&mut self, bytes: Vec<u8>) -> DecodeToken {
        self.request_decode(bytes, None)
    }

    /// Decode `bytes` as the audio of `track`
    pub fn open_track(&mut self, track: Track, bytes: Vec<u8>) -> DecodeToken {
        self.request_decode(bytes, Some(track))
    }

    fn request_decode(&mut self, bytes: Vec<u8>, track: Option<Track>) -> DecodeToken {
        self.last_token += 1;
        let token = DecodeToken::new(self.last_token);

        if let Some(superseded) = self.pending.replace(PendingOpen { token, track }) {
            debug!(superseded = %superseded.token, %token, "Pending open superseded");
        }

        debug!(%token, bytes = bytes.len(), "Decode requested");
        self.output.decode(bytes, token);
        token
    }

    /// Unload the current audio
    ///
    /// Stops playback, forgets the buffer and the current track, and
    /// invalidates any pending open.
    pub fn close(&mut self) {
        self.stop();
        self.buffer = None;
        self.session.current_track = None;
        debug!("Engine closed");
    }

    /// Start playback at `at` seconds, or at the stored position
    ///
    /// Returns `false` without side effects when already playing, when
    /// nothing is loaded, or when the primitive refuses to start the source.
    pub fn play(&mut self, at: Option<f64>) -> bool {
        if self.session.state == PlaybackState::Playing {
            debug!(generation = ?self.live_generation(), "Play ignored, already playing");
            return false;
        }

        let offset = at.unwrap_or(self.session.position_baseline_seconds);
        self.start_source(offset)
    }

    fn start_source(&mut self, at: f64) -> bool {
        let Some(buffer) = self.buffer.as_ref() else {
            warn!("Play requested with nothing loaded");
            return false;
        };

        let offset = clamp_position(at, buffer.duration_secs());
        let generation = Generation::new(self.last_generation + 1);
        let mut source = self.output.create_source(buffer, generation);

        if let Err(e) = source.start(Duration::from_secs_f64(offset)) {
            error!(%generation, error = %e, "Failed to start source");
            source.disown();
            return false;
        }

        self.last_generation = generation.get();
        self.source = Some(source);
        self.session.position_baseline_seconds = offset;
        self.session.baseline_timestamp_millis = self.clock.now_millis();
        self.session.state = PlaybackState::Playing;
        debug!(%generation, offset, "Playing");
        true
    }

    /// Pause playback, keeping the position
    ///
    /// Only acts while playing; returns whether it did.
    pub fn pause(&mut self) -> bool {
        if self.session.state != PlaybackState::Playing {
            return false;
        }

        let position = self.current_position();
        self.release_source();
        self.session.position_baseline_seconds = position;
        self.session.baseline_timestamp_millis = self.clock.now_millis();
        self.session.state = PlaybackState::Paused;
        debug!(position, "Paused");
        true
    }

    /// Stop playback and rewind
    ///
    /// Unconditional and idempotent. Also invalidates a pending open, whose
    /// completion will then be dropped; the loaded buffer is kept.
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(token = %pending.token, "Pending open cancelled by stop");
        }

        self.rewind();
        debug!("Stopped");
    }

    /// Stop the live source and rewind, leaving any pending open in flight
    pub fn rewind(&mut self) {
        self.release_source();
        self.session.position_baseline_seconds = 0.0;
        self.session.baseline_timestamp_millis = self.clock.now_millis();
        self.session.state = PlaybackState::Stopped;
    }

    /// Move to `to` seconds, clamped into the loaded duration
    ///
    /// While playing the old source is disowned and stopped before the new
    /// one starts. Returns the position actually applied.
    pub fn seek(&mut self, to: f64) -> f64 {
        let target = clamp_position(to, self.duration());

        if self.session.state != PlaybackState::Playing {
            self.session.position_baseline_seconds = target;
            self.session.baseline_timestamp_millis = self.clock.now_millis();
            debug!(target, state = %self.session.state, "Seek moved baseline");
            return target;
        }

        self.release_source();
        self.session.state = PlaybackState::Seeking;
        self.session.position_baseline_seconds = target;
        self.session.baseline_timestamp_millis = self.clock.now_millis();

        if !self.start_source(target) {
            warn!(target, "Restart after seek failed, pausing");
            self.session.state = PlaybackState::Paused;
        }
        target
    }

    /// Current position in seconds
    pub fn current_position(&self) -> f64 {
        match self.session.state {
            PlaybackState::Playing => {
                let elapsed_ms = self
                    .clock
                    .now_millis()
                    .saturating_sub(self.session.baseline_timestamp_millis);
                let position =
                    self.session.position_baseline_seconds + elapsed_ms as f64 / 1000.0;
                clamp_position(position, self.duration())
            }
            _ => self.session.position_baseline_seconds,
        }
    }

    /// Feed an asynchronous completion from the output primitive
    ///
    /// Returns `None` for stale signals.
    pub fn handle_signal(&mut self, signal: OutputSignal) -> Option<EngineEvent> {
        match signal {
            OutputSignal::Decoded { token, result } => self.complete_open(token, result),
            OutputSignal::Ended { generation } => self.complete_source(generation),
        }
    }

    fn complete_open(
        &mut self,
        token: DecodeToken,
        result: std::result::Result<AudioBuffer, DecodeError>,
    ) -> Option<EngineEvent> {
        let pending = match self.pending.take() {
            Some(pending) if pending.token == token => pending,
            other => {
                self.pending = other;
                debug!(%token, "Dropping stale decode completion");
                return None;
            }
        };

        match result {
            Ok(buffer) => {
                self.release_source();
                info!(
                    %token,
                    track = pending.track.as_ref().map(|t| t.title.as_str()),
                    duration = buffer.duration_secs(),
                    "Audio loaded"
                );
                self.buffer = Some(buffer);
                self.session.current_track = pending.track;
                self.session.position_baseline_seconds = 0.0;
                self.session.baseline_timestamp_millis = self.clock.now_millis();
                self.session.state = PlaybackState::Stopped;
                Some(EngineEvent::Opened { token })
            }
            Err(error) => {
                warn!(%token, %error, "Decode failed");
                Some(EngineEvent::OpenFailed { token, error })
            }
        }
    }

    fn complete_source(&mut self, generation: Generation) -> Option<EngineEvent> {
        if self.live_generation() != Some(generation) {
            debug!(%generation, live = ?self.live_generation(), "Dropping stale end signal");
            return None;
        }

        self.rewind();
        debug!(%generation, "Source ended");
        Some(EngineEvent::Ended { generation })
    }

    /// Disown then stop the live source, if any
    fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.disown();
            source.stop();
        }
    }

    /// Set volume (0-100)
    ///
    /// Out-of-range levels are ignored; returns whether the level was applied.
    pub fn set_volume(&mut self, level: u8) -> bool {
        if level > 100 {
            warn!(level, "Ignoring out-of-range volume");
            return false;
        }
        self.apply_volume(level);
        true
    }

    fn apply_volume(&mut self, level: u8) {
        self.session.volume = level;
        self.output.set_gain(f32::from(level) / 100.0);
    }

    /// Current volume (0-100)
    pub fn volume(&self) -> u8 {
        self.session.volume
    }

    /// Frequency spectrum of the current output
    pub fn spectrum(&self) -> Vec<u8> {
        self.output.spectrum()
    }

    /// Duration of the loaded audio in seconds, 0 when nothing is loaded
    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, AudioBuffer::duration_secs)
    }

    /// Transport state
    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    /// Session bookkeeping
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Track of the loaded audio
    pub fn current_track(&self) -> Option<&Track> {
        self.session.current_track.as_ref()
    }

    /// Generation of the live source
    pub fn live_generation(&self) -> Option<Generation> {
        self.source.as_ref().map(|source| source.generation())
    }

    /// Whether decoded audio is loaded
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Whether an open is awaiting its completion
    pub fn has_pending_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Token of the open awaiting completion
    pub fn pending_token(&self) -> Option<DecodeToken> {
        self.pending.as_ref().map(|pending| pending.token)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.release_source();
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("session", &self.session)
            .field("loaded", &self.is_loaded())
            .field("live_generation", &self.live_generation())
            .field("pending", &self.pending_token())
            .finish_non_exhaustive()
    }
}

/// Clamp `seconds` into `[0, duration]`; NaN maps to 0
fn clamp_position(seconds: f64, duration: f64) -> f64 {
    if seconds.is_nan() {
        return 0.0;
    }
    seconds.clamp(0.0, duration.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::output::{signal_channel, SignalReceiver};
    use crate::test_utils::{drain, FakeOutput, FakeOutputProbe};

    struct Rig {
        engine: PlaybackEngine,
        probe: FakeOutputProbe,
        clock: ManualClock,
        signals: SignalReceiver,
    }

    impl Rig {
        fn new() -> Self {
            let (tx, signals) = signal_channel();
            let (output, probe) = FakeOutput::new(tx);
            let clock = ManualClock::new();
            let engine = PlaybackEngine::new(
                Box::new(output),
                Box::new(clock.clone()),
                &PlaybackConfig::default(),
            )
            .unwrap();
            Self {
                engine,
                probe,
                clock,
                signals,
            }
        }

        fn pump(&mut self) -> Vec<EngineEvent> {
            drain(&self.signals)
                .into_iter()
                .filter_map(|signal| self.engine.handle_signal(signal))
                .collect()
        }

        fn load(&mut self, secs: f64) {
            self.engine.open(FakeOutput::encode(secs));
            self.probe.complete_next_decode();
            self.pump();
        }
    }

    #[test]
    fn clamp_handles_nan_and_bounds() {
        assert_eq!(clamp_position(f64::NAN, 10.0), 0.0);
        assert_eq!(clamp_position(-3.0, 10.0), 0.0);
        assert_eq!(clamp_position(12.0, 10.0), 10.0);
        assert_eq!(clamp_position(4.0, 0.0), 0.0);
    }

    #[test]
    fn construction_fails_without_output() {
        let (tx, _rx) = signal_channel();
        let (output, probe) = FakeOutput::new(tx);
        probe.set_available(false);

        let result = PlaybackEngine::new(
            Box::new(output),
            Box::new(ManualClock::new()),
            &PlaybackConfig::default(),
        );

        assert!(matches!(
            result,
            Err(crate::error::PlaybackError::OutputUnavailable(_))
        ));
    }

    #[test]
    fn initial_volume_reaches_output() {
        let (tx, _rx) = signal_channel();
        let (output, probe) = FakeOutput::new(tx);
        let config = PlaybackConfig {
            volume: 40,
            ..PlaybackConfig::default()
        };

        let engine =
            PlaybackEngine::new(Box::new(output), Box::new(ManualClock::new()), &config).unwrap();

        assert_eq!(engine.volume(), 40);
        assert!((probe.gain() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn open_loads_stopped_at_zero() {
        let mut rig = Rig::new();
        let token = rig.engine.open(FakeOutput::encode(150.0));
        assert!(rig.engine.has_pending_open());

        rig.probe.complete_next_decode();
        let events = rig.pump();

        assert_eq!(events, vec![EngineEvent::Opened { token }]);
        assert!(rig.engine.is_loaded());
        assert!(!rig.engine.has_pending_open());
        assert_eq!(rig.engine.state(), PlaybackState::Stopped);
        assert_eq!(rig.engine.duration(), 150.0);
        assert_eq!(rig.engine.current_position(), 0.0);
    }

    #[test]
    fn failed_decode_leaves_state_alone() {
        let mut rig = Rig::new();
        rig.load(20.0);
        assert!(rig.engine.play(None));

        let token = rig.engine.open(b"garbage".to_vec());
        rig.probe.complete_next_decode();
        let events = rig.pump();

        assert!(matches!(
            events.as_slice(),
            [EngineEvent::OpenFailed { token: t, .. }] if *t == token
        ));
        assert_eq!(rig.engine.state(), PlaybackState::Playing);
        assert_eq!(rig.engine.duration(), 20.0);
    }

    #[test]
    fn superseded_open_is_dropped() {
        let mut rig = Rig::new();
        let first = rig.engine.open(FakeOutput::encode(10.0));
        let second = rig.engine.open(FakeOutput::encode(30.0));

        rig.probe.complete_all_decodes();
        let events = rig.pump();

        assert_ne!(first, second);
        assert_eq!(events, vec![EngineEvent::Opened { token: second }]);
        assert_eq!(rig.engine.duration(), 30.0);
    }

    #[test]
    fn play_without_audio_returns_false() {
        let mut rig = Rig::new();
        assert!(!rig.engine.play(None));
        assert_eq!(rig.engine.state(), PlaybackState::Stopped);
        assert!(rig.probe.sources().is_empty());
    }

    #[test]
    fn start_failure_is_not_a_transition() {
        let mut rig = Rig::new();
        rig.load(10.0);
        rig.probe.fail_next_start();

        assert!(!rig.engine.play(None));
        assert_eq!(rig.engine.state(), PlaybackState::Stopped);
        assert_eq!(rig.engine.live_generation(), None);

        assert!(rig.engine.play(None));
        assert_eq!(rig.engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn play_at_offset_is_clamped() {
        let mut rig = Rig::new();
        rig.load(10.0);

        assert!(rig.engine.play(Some(99.0)));

        assert_eq!(rig.engine.current_position(), 10.0);
        assert_eq!(
            rig.probe.sources()[0].started_at,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn pause_folds_elapsed_time() {
        let mut rig = Rig::new();
        rig.load(100.0);
        rig.engine.play(None);
        rig.clock.advance_secs(12.5);

        assert!(rig.engine.pause());
        rig.clock.advance_secs(30.0);

        assert_eq!(rig.engine.state(), PlaybackState::Paused);
        assert_eq!(rig.engine.current_position(), 12.5);
        assert!(rig.probe.live_sources().is_empty());
        assert!(!rig.engine.pause());
    }

    #[test]
    fn seek_while_paused_only_moves_baseline() {
        let mut rig = Rig::new();
        rig.load(100.0);
        rig.engine.play(None);
        rig.engine.pause();

        assert_eq!(rig.engine.seek(42.0), 42.0);

        assert_eq!(rig.engine.state(), PlaybackState::Paused);
        assert_eq!(rig.engine.current_position(), 42.0);
        assert_eq!(rig.probe.sources().len(), 1);
    }

    #[test]
    fn seek_while_playing_replaces_source() {
        let mut rig = Rig::new();
        rig.load(100.0);
        rig.engine.play(None);
        let before = rig.engine.live_generation().unwrap();

        assert_eq!(rig.engine.seek(f64::NAN), 0.0);

        let sources = rig.probe.sources();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].disowned && sources[0].stopped);
        assert!(rig.engine.live_generation().unwrap() > before);
        assert_eq!(rig.engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn failed_restart_after_seek_pauses_at_target() {
        let mut rig = Rig::new();
        rig.load(100.0);
        rig.engine.play(None);
        rig.probe.fail_next_start();

        rig.engine.seek(30.0);

        assert_eq!(rig.engine.state(), PlaybackState::Paused);
        assert_eq!(rig.engine.current_position(), 30.0);
        assert_eq!(rig.engine.live_generation(), None);
    }

    #[test]
    fn natural_end_rewinds() {
        let mut rig = Rig::new();
        rig.load(5.0);
        rig.engine.play(None);
        let generation = rig.engine.live_generation().unwrap();

        assert!(rig.probe.finish(generation));
        let events = rig.pump();

        assert_eq!(events, vec![EngineEvent::Ended { generation }]);
        assert_eq!(rig.engine.state(), PlaybackState::Stopped);
        assert_eq!(rig.engine.current_position(), 0.0);
    }

    #[test]
    fn stop_cancels_pending_open_but_keeps_buffer() {
        let mut rig = Rig::new();
        rig.load(8.0);
        rig.engine.open(FakeOutput::encode(60.0));

        rig.engine.stop();
        rig.probe.complete_next_decode();
        let events = rig.pump();

        assert!(events.is_empty());
        assert_eq!(rig.engine.duration(), 8.0);
        assert!(!rig.engine.has_pending_open());
    }

    #[test]
    fn rewind_keeps_pending_open() {
        let mut rig = Rig::new();
        rig.load(8.0);
        assert!(rig.engine.play(None));
        let token = rig.engine.open(FakeOutput::encode(60.0));

        rig.engine.rewind();
        assert_eq!(rig.engine.state(), PlaybackState::Stopped);
        assert!(rig.probe.live_sources().is_empty());

        rig.probe.complete_next_decode();
        let events = rig.pump();

        assert!(matches!(events.as_slice(), [EngineEvent::Opened { token: t }] if *t == token));
        assert_eq!(rig.engine.duration(), 60.0);
    }

    #[test]
    fn close_unloads() {
        let mut rig = Rig::new();
        let track = Track::new("Song", "/m/song.flac".into());
        rig.engine.open_track(track.clone(), FakeOutput::encode(8.0));
        rig.probe.complete_next_decode();
        rig.pump();
        assert_eq!(rig.engine.current_track(), Some(&track));

        rig.engine.close();

        assert!(!rig.engine.is_loaded());
        assert_eq!(rig.engine.current_track(), None);
        assert_eq!(rig.engine.duration(), 0.0);
    }

    #[test]
    fn volume_out_of_range_is_ignored() {
        let mut rig = Rig::new();
        assert!(rig.engine.set_volume(25));
        assert!(!rig.engine.set_volume(101));
        assert_eq!(rig.engine.volume(), 25);
        assert!((rig.probe.gain() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn dropping_engine_silences_source() {
        let mut rig = Rig::new();
        rig.load(10.0);
        rig.engine.play(None);
        let probe = rig.probe.clone();

        drop(rig);

        assert!(probe.live_sources().is_empty());
    }
}
