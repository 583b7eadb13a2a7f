//! Test doubles for the output primitive
//!
//! `FakeOutput` behaves like a real primitive from the engine's point of view:
//! decodes complete asynchronously (when the test says so) and sources post
//! their natural end on the signal channel. The paired `FakeOutputProbe` lets
//! the test drive those completions and inspect what the engine did.
//!
//! Encoded audio is a tiny text format produced by [`FakeOutput::encode`];
//! anything else is rejected with a `DecodeError`.

use crate::error::{DecodeError, OutputError};
use crate::output::{
    AudioOutput, DecodeToken, Generation, OutputSignal, SignalReceiver, SignalSender, SourceHandle,
};
use spindle_core::{AudioBuffer, AudioFormat, SampleRate};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Sample rate of fake decoded buffers; low to keep test memory small
pub const FAKE_SAMPLE_RATE: u32 = 10;

const ENCODING_PREFIX: &str = "fake-audio:";

/// What the fake knows about one source the engine created
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// Generation the engine assigned
    pub generation: Generation,
    /// Offset passed to `start`, if started
    pub started_at: Option<Duration>,
    /// Whether `stop` was called
    pub stopped: bool,
    /// Whether `disown` was called
    pub disowned: bool,
}

impl SourceRecord {
    /// Started and not yet stopped
    pub fn is_live(&self) -> bool {
        self.started_at.is_some() && !self.stopped
    }
}

#[derive(Debug)]
struct FakeState {
    available: bool,
    gain: f32,
    spectrum: Vec<u8>,
    fail_next_start: bool,
    decodes: VecDeque<(DecodeToken, Vec<u8>)>,
    sources: Vec<SourceRecord>,
}

impl FakeState {
    fn source_mut(&mut self, generation: Generation) -> Option<&mut SourceRecord> {
        self.sources
            .iter_mut()
            .find(|record| record.generation == generation)
    }
}

/// Scriptable in-memory output primitive
pub struct FakeOutput {
    state: Rc<RefCell<FakeState>>,
    signals: SignalSender,
}

/// Test-side handle onto a `FakeOutput`
#[derive(Clone)]
pub struct FakeOutputProbe {
    state: Rc<RefCell<FakeState>>,
    signals: SignalSender,
}

impl FakeOutput {
    /// Create a fake posting on `signals`, plus its probe
    pub fn new(signals: SignalSender) -> (Self, FakeOutputProbe) {
        let state = Rc::new(RefCell::new(FakeState {
            available: true,
            gain: 1.0,
            spectrum: vec![0; 64],
            fail_next_start: false,
            decodes: VecDeque::new(),
            sources: Vec::new(),
        }));
        let probe = FakeOutputProbe {
            state: Rc::clone(&state),
            signals: signals.clone(),
        };
        (Self { state, signals }, probe)
    }

    /// Encode a track of the given length in the fake format
    pub fn encode(duration_secs: f64) -> Vec<u8> {
        format!("{ENCODING_PREFIX}{duration_secs}").into_bytes()
    }

    fn decode_bytes(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::new("fake decoder: not utf-8"))?;
        let secs: f64 = text
            .strip_prefix(ENCODING_PREFIX)
            .and_then(|rest| rest.parse().ok())
            .filter(|secs: &f64| secs.is_finite() && *secs >= 0.0)
            .ok_or_else(|| DecodeError::new("fake decoder: unrecognised data"))?;
        let frames = (secs * f64::from(FAKE_SAMPLE_RATE)).round() as usize;
        Ok(AudioBuffer::new(
            vec![0.0; frames],
            AudioFormat::new(SampleRate::new(FAKE_SAMPLE_RATE), 1),
        ))
    }
}

impl AudioOutput for FakeOutput {
    fn probe(&self) -> Result<(), OutputError> {
        if self.state.borrow().available {
            Ok(())
        } else {
            Err(OutputError::Unavailable("fake output disabled".into()))
        }
    }

    fn decode(&mut self, bytes: Vec<u8>, token: DecodeToken) {
        self.state.borrow_mut().decodes.push_back((token, bytes));
    }

    fn create_source(
        &mut self,
        _buffer: &AudioBuffer,
        generation: Generation,
    ) -> Box<dyn SourceHandle> {
        self.state.borrow_mut().sources.push(SourceRecord {
            generation,
            started_at: None,
            stopped: false,
            disowned: false,
        });
        Box::new(FakeSource {
            generation,
            state: Rc::clone(&self.state),
        })
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.borrow_mut().gain = gain;
    }

    fn gain(&self) -> f32 {
        self.state.borrow().gain
    }

    fn spectrum(&self) -> Vec<u8> {
        self.state.borrow().spectrum.clone()
    }
}

struct FakeSource {
    generation: Generation,
    state: Rc<RefCell<FakeState>>,
}

impl SourceHandle for FakeSource {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn start(&mut self, offset: Duration) -> Result<(), OutputError> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_next_start) {
            return Err(OutputError::Start("fake start failure".into()));
        }
        let record = state
            .source_mut(self.generation)
            .ok_or_else(|| OutputError::Start("unknown source".into()))?;
        if record.started_at.is_some() {
            return Err(OutputError::Start("source already started".into()));
        }
        record.started_at = Some(offset);
        Ok(())
    }

    fn disown(&mut self) {
        if let Some(record) = self.state.borrow_mut().source_mut(self.generation) {
            record.disowned = true;
        }
    }

    fn stop(&mut self) {
        if let Some(record) = self.state.borrow_mut().source_mut(self.generation) {
            record.stopped = true;
        }
    }
}

impl FakeOutputProbe {
    /// Make `probe()` fail, as on a host with no audio device
    pub fn set_available(&self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    /// Make the next `SourceHandle::start` fail
    pub fn fail_next_start(&self) {
        self.state.borrow_mut().fail_next_start = true;
    }

    /// Set the spectrum returned by the output
    pub fn set_spectrum(&self, spectrum: Vec<u8>) {
        self.state.borrow_mut().spectrum = spectrum;
    }

    /// Number of decodes requested and not yet completed
    pub fn pending_decodes(&self) -> usize {
        self.state.borrow().decodes.len()
    }

    /// Complete the oldest pending decode, posting its result
    pub fn complete_next_decode(&self) -> Option<DecodeToken> {
        let (token, bytes) = self.state.borrow_mut().decodes.pop_front()?;
        let result = FakeOutput::decode_bytes(&bytes);
        self.post(OutputSignal::Decoded { token, result });
        Some(token)
    }

    /// Complete every pending decode in request order
    pub fn complete_all_decodes(&self) -> Vec<DecodeToken> {
        std::iter::from_fn(|| self.complete_next_decode()).collect()
    }

    /// Play the source of `generation` to its end
    ///
    /// Posts `Ended` only if the source is live and still owned, like a real
    /// device would. Returns whether a signal was posted.
    pub fn finish(&self, generation: Generation) -> bool {
        let post = {
            let mut state = self.state.borrow_mut();
            match state.source_mut(generation) {
                Some(record) if record.is_live() && !record.disowned => {
                    record.stopped = true;
                    true
                }
                _ => false,
            }
        };
        if post {
            self.post(OutputSignal::Ended { generation });
        }
        post
    }

    /// Post `Ended` for `generation` unconditionally
    ///
    /// Models a completion that was already in flight when the source was
    /// disowned.
    pub fn force_ended(&self, generation: Generation) {
        self.post(OutputSignal::Ended { generation });
    }

    /// Every source created so far, oldest first
    pub fn sources(&self) -> Vec<SourceRecord> {
        self.state.borrow().sources.clone()
    }

    /// Sources currently sounding
    pub fn live_sources(&self) -> Vec<SourceRecord> {
        self.state
            .borrow()
            .sources
            .iter()
            .filter(|record| record.is_live())
            .cloned()
            .collect()
    }

    /// Gain last applied by the engine
    pub fn gain(&self) -> f32 {
        self.state.borrow().gain
    }

    fn post(&self, signal: OutputSignal) {
        // The receiver lives as long as the test harness
        let _ = self.signals.send(signal);
    }
}

/// Take every signal currently queued on `signals`
pub fn drain(signals: &SignalReceiver) -> Vec<OutputSignal> {
    signals.try_iter().collect()
}
