//! Dispatcher pipeline tests
//!
//! Run the whole core the way an application does: one dispatcher, the
//! controller registered behind `Rc<RefCell<_>>`, output signals fed back as
//! `Action::Output`.

use spindle_core::{MemoryCatalog, PlaybackState, Step, Track};
use spindle_playback::test_utils::{FakeOutput, FakeOutputProbe};
use spindle_playback::{
    signal_channel, Action, ActionDispatcher, ActionHandler, DispatchError, ManualClock,
    PlaybackConfig, PlaybackController, PlaybackEngine, PlaybackError, SignalReceiver,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

struct App {
    dispatcher: ActionDispatcher,
    controller: Rc<RefCell<PlaybackController>>,
    probe: FakeOutputProbe,
    clock: ManualClock,
    signals: SignalReceiver,
}

impl App {
    fn new(tracks: &[Track]) -> Self {
        let mut catalog = MemoryCatalog::with_tracks(tracks.to_vec());
        for t in tracks {
            catalog.set_payload(t.id.clone(), FakeOutput::encode(t.duration_seconds()));
        }
        let (tx, signals) = signal_channel();
        let (output, probe) = FakeOutput::new(tx);
        let clock = ManualClock::new();
        let config = PlaybackConfig::default();
        let engine =
            PlaybackEngine::new(Box::new(output), Box::new(clock.clone()), &config).unwrap();
        let controller = Rc::new(RefCell::new(PlaybackController::new(
            engine,
            Box::new(catalog),
            &config,
        )));

        let dispatcher = ActionDispatcher::new();
        dispatcher.register(Rc::clone(&controller)).unwrap();
        dispatcher.dispatch(Action::InitCatalog).unwrap();

        Self {
            dispatcher,
            controller,
            probe,
            clock,
            signals,
        }
    }

    /// Let the output finish its decodes and route every signal back in
    fn run_pending(&self) {
        self.probe.complete_all_decodes();
        for signal in self.signals.try_iter() {
            self.dispatcher.dispatch(Action::Output(signal)).unwrap();
        }
    }

    fn state(&self) -> PlaybackState {
        self.controller.borrow().play_state()
    }
}

fn track(id: &str, secs: u64) -> Track {
    Track::new(id, PathBuf::from(format!("/music/{id}.ogg")))
        .with_id(id)
        .with_duration(Duration::from_secs(secs))
}

#[test]
fn full_session_through_dispatcher() {
    let a = track("a", 20);
    let b = track("b", 20);
    let app = App::new(&[a.clone(), b.clone()]);

    app.dispatcher.dispatch(Action::Play(Some(a.clone()))).unwrap();
    app.run_pending();
    assert_eq!(app.state(), PlaybackState::Playing);

    app.clock.advance_secs(5.0);
    app.dispatcher.dispatch(Action::Seek(15.0)).unwrap();
    app.dispatcher.dispatch(Action::Pause).unwrap();
    assert_eq!(app.state(), PlaybackState::Paused);
    assert_eq!(app.controller.borrow().playback_time(), 15.0);

    app.dispatcher.dispatch(Action::Skip(Step::Next)).unwrap();
    app.run_pending();
    assert_eq!(app.controller.borrow().current(), Some(&b));
    assert_eq!(app.state(), PlaybackState::Playing);

    app.dispatcher.dispatch(Action::Volume(55)).unwrap();
    app.dispatcher.dispatch(Action::Stop).unwrap();
    assert_eq!(app.state(), PlaybackState::Stopped);
    assert_eq!(app.controller.borrow().volume(), 55);
}

#[test]
fn poll_ticks_chain_tracks() {
    let a = track("a", 3);
    let b = track("b", 3);
    let app = App::new(&[a.clone(), b.clone()]);
    app.dispatcher.dispatch(Action::Play(Some(a))).unwrap();
    app.run_pending();

    for _ in 0..3 {
        app.clock.advance(app.controller.borrow().poll_interval());
        app.dispatcher.dispatch(Action::Tick).unwrap();
    }
    app.run_pending();

    assert_eq!(app.controller.borrow().current(), Some(&b));
    assert_eq!(app.state(), PlaybackState::Playing);
}

#[test]
fn errors_reach_the_caller() {
    let app = App::new(&[track("a", 5)]);

    let err = app
        .dispatcher
        .dispatch(Action::SelectTrack(track("missing", 1)))
        .unwrap_err();

    assert!(matches!(err, PlaybackError::TrackNotFound(_)));
    // The dispatcher is usable again afterwards
    app.dispatcher.dispatch(Action::Stop).unwrap();
}

struct Echo {
    dispatcher: ActionDispatcher,
}

impl ActionHandler for Echo {
    fn handle(&mut self, action: Action) -> spindle_playback::Result<()> {
        match action {
            Action::Pause => self.dispatcher.dispatch(Action::Stop),
            _ => Ok(()),
        }
    }
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "re-entrant dispatch"))]
fn reentrant_dispatch_is_rejected() {
    let dispatcher = ActionDispatcher::new();
    dispatcher
        .register(Echo {
            dispatcher: dispatcher.clone(),
        })
        .unwrap();

    let err = dispatcher.dispatch(Action::Pause).unwrap_err();

    assert!(matches!(
        err,
        PlaybackError::Dispatch(DispatchError::Reentrant)
    ));
}
