//! Engine transport tests
//!
//! Drive `PlaybackEngine` against the fake output with a manual clock, the
//! way the event loop would: issue a command, let the output post its
//! signals, feed them back through `handle_signal`.

use spindle_core::{PlaybackState, Track};
use spindle_playback::test_utils::{drain, FakeOutput, FakeOutputProbe};
use spindle_playback::{
    signal_channel, EngineEvent, ManualClock, PlaybackConfig, PlaybackEngine, SignalReceiver,
};
use std::path::PathBuf;
use std::time::Duration;

struct Harness {
    engine: PlaybackEngine,
    probe: FakeOutputProbe,
    clock: ManualClock,
    signals: SignalReceiver,
}

impl Harness {
    fn new() -> Self {
        let (tx, signals) = signal_channel();
        let (output, probe) = FakeOutput::new(tx);
        let clock = ManualClock::new();
        let engine = PlaybackEngine::new(
            Box::new(output),
            Box::new(clock.clone()),
            &PlaybackConfig::default(),
        )
        .expect("fake output is available");
        Self {
            engine,
            probe,
            clock,
            signals,
        }
    }

    /// Harness with a track of `secs` seconds loaded
    fn loaded(secs: f64) -> Self {
        let mut harness = Self::new();
        let track = Track::new("Track", PathBuf::from("/m/track.flac"));
        harness
            .engine
            .open_track(track, FakeOutput::encode(secs));
        harness.probe.complete_next_decode();
        assert_eq!(harness.pump().len(), 1);
        harness
    }

    fn pump(&mut self) -> Vec<EngineEvent> {
        drain(&self.signals)
            .into_iter()
            .filter_map(|signal| self.engine.handle_signal(signal))
            .collect()
    }
}

#[test]
fn play_pause_resume_tracks_wall_clock() {
    let mut h = Harness::loaded(150.0);

    assert!(h.engine.play(None));
    h.clock.advance(Duration::from_secs(60));
    assert_eq!(h.engine.current_position(), 60.0);

    assert!(h.engine.pause());
    assert_eq!(h.engine.current_position(), 60.0);
    assert!(h.probe.live_sources().is_empty());

    // Time passing while paused does not move the position
    h.clock.advance(Duration::from_secs(45));
    assert_eq!(h.engine.current_position(), 60.0);

    assert!(h.engine.play(None));
    let live = h.probe.live_sources();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].started_at, Some(Duration::from_secs(60)));

    h.clock.advance_secs(2.5);
    assert_eq!(h.engine.current_position(), 62.5);
}

#[test]
fn play_while_playing_keeps_generation() {
    let mut h = Harness::loaded(30.0);
    assert!(h.engine.play(None));
    let generation = h.engine.live_generation();

    assert!(!h.engine.play(None));
    assert!(!h.engine.play(Some(10.0)));

    assert_eq!(h.engine.live_generation(), generation);
    assert_eq!(h.probe.sources().len(), 1);
}

#[test]
fn seek_ignores_late_completion_of_replaced_source() {
    let mut h = Harness::loaded(150.0);
    h.engine.play(Some(80.0));
    let old = h.engine.live_generation().unwrap();

    assert_eq!(h.engine.seek(30.0), 30.0);
    let new = h.engine.live_generation().unwrap();
    assert!(new > old);

    // The replaced source was disowned, so it cannot finish on its own
    assert!(!h.probe.finish(old));
    // A completion already in flight is still recognised as stale
    h.probe.force_ended(old);
    assert!(h.pump().is_empty());

    assert_eq!(h.engine.state(), PlaybackState::Playing);
    assert_eq!(h.engine.current_position(), 30.0);
    assert_eq!(h.probe.live_sources().len(), 1);
}

#[test]
fn seek_clamps_into_duration() {
    let mut h = Harness::loaded(100.0);

    assert_eq!(h.engine.seek(-5.0), 0.0);
    assert_eq!(h.engine.seek(250.0), 100.0);
    assert_eq!(h.engine.seek(f64::NAN), 0.0);
    assert_eq!(h.engine.seek(f64::INFINITY), 100.0);
}

#[test]
fn stop_is_idempotent() {
    let mut h = Harness::loaded(20.0);
    h.engine.play(None);
    h.clock.advance_secs(5.0);

    h.engine.stop();
    let after_first = h.engine.session().clone();
    h.engine.stop();

    assert_eq!(h.engine.session(), &after_first);
    assert_eq!(h.engine.state(), PlaybackState::Stopped);
    assert_eq!(h.engine.current_position(), 0.0);
    assert!(h.probe.live_sources().is_empty());
}

#[test]
fn stop_keeps_track_reference() {
    let mut h = Harness::loaded(20.0);
    h.engine.play(None);

    h.engine.stop();

    assert!(h.engine.current_track().is_some());
    assert!(h.engine.is_loaded());
}

#[test]
fn position_is_clamped_at_end() {
    let mut h = Harness::loaded(10.0);
    h.engine.play(Some(8.0));

    h.clock.advance_secs(30.0);

    assert_eq!(h.engine.current_position(), 10.0);
}

#[test]
fn natural_end_of_live_source_stops_engine() {
    let mut h = Harness::loaded(10.0);
    h.engine.play(None);
    let generation = h.engine.live_generation().unwrap();

    assert!(h.probe.finish(generation));
    let events = h.pump();

    assert_eq!(events, vec![EngineEvent::Ended { generation }]);
    assert_eq!(h.engine.state(), PlaybackState::Stopped);
    assert_eq!(h.engine.live_generation(), None);

    // A duplicate end for the same generation is stale now
    h.probe.force_ended(generation);
    assert!(h.pump().is_empty());
}

#[test]
fn decode_pending_during_stop_is_dropped() {
    let mut h = Harness::loaded(10.0);
    let before = h.engine.session().clone();
    let next = Track::new("Next", PathBuf::from("/m/next.flac"));

    h.engine.open_track(next, FakeOutput::encode(99.0));
    h.engine.stop();
    h.probe.complete_next_decode();

    assert!(h.pump().is_empty());
    assert_eq!(h.engine.session().current_track, before.current_track);
    assert_eq!(h.engine.duration(), 10.0);
}

#[test]
fn opening_new_audio_silences_current_source() {
    let mut h = Harness::loaded(10.0);
    h.engine.play(None);

    h.engine.open(FakeOutput::encode(40.0));
    // Still playing the old audio until the decode lands
    assert_eq!(h.engine.state(), PlaybackState::Playing);

    h.probe.complete_next_decode();
    h.pump();

    assert_eq!(h.engine.state(), PlaybackState::Stopped);
    assert_eq!(h.engine.duration(), 40.0);
    assert!(h.probe.live_sources().is_empty());
    assert!(h.probe.sources()[0].disowned);
}
