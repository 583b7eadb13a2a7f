/// CPAL-based output primitive (audio thread owns the stream)
use crate::analyser::{SpectrumAnalyser, SpectrumConfig, SpectrumTap};
use crate::decode;
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use spindle_core::AudioBuffer;
use spindle_playback::{
    AudioOutput, DecodeError, DecodeToken, Generation, OutputError, OutputSignal, SignalSender,
    SourceHandle,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// How long `start` waits for the audio thread to open the stream
const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands sent to the audio thread
enum AudioCommand {
    /// Open a stream playing `playhead`, replacing any current stream
    Start {
        playhead: Arc<Playhead>,
        reply: Sender<Result<()>>,
    },
    /// Close the stream of `generation` if it is still current
    Stop { generation: Generation },
    /// Shutdown the audio thread
    Shutdown,
}

/// One source's read position over shared samples
struct Playhead {
    generation: Generation,
    samples: Arc<[f32]>,
    channels: usize,
    /// Next frame to play
    frame: AtomicUsize,
    /// Cleared by `disown`; the end signal is posted only while set
    owned: AtomicBool,
    /// Set once the end signal has been posted
    finished: AtomicBool,
    signals: SignalSender,
}

impl Playhead {
    fn total_frames(&self) -> usize {
        self.samples.len() / self.channels
    }
}

/// State shared between the main thread and the audio callback
struct Shared {
    /// Gain as `f32` bits
    gain: AtomicU32,
    tap: SpectrumTap,
}

/// CPAL audio output
///
/// Implements `AudioOutput` for the playback engine.
///
/// **Architecture**: a dedicated audio thread owns the CPAL `Stream`. Sources
/// talk to it over a command channel, which avoids Send/Sync issues with
/// CPAL's `Stream` type across platforms. Decoding runs on short-lived worker
/// threads. Completions are posted as `OutputSignal`s on the channel given
/// at construction.
pub struct CpalOutput {
    /// Channel to send commands to the audio thread
    command_tx: Sender<AudioCommand>,
    /// Sample rate of the output device
    sample_rate: u32,
    /// Channel count of the output device
    channels: u16,
    shared: Arc<Shared>,
    analyser: SpectrumAnalyser,
    signals: SignalSender,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Create an output on the default device
    ///
    /// # Errors
    /// Returns an error if no audio device is found or configuration fails
    pub fn new(signals: SignalSender) -> Result<Self> {
        Self::with_spectrum(signals, &SpectrumConfig::default())
    }

    /// Create an output on the default device with analyser settings
    pub fn with_spectrum(signals: SignalSender, spectrum: &SpectrumConfig) -> Result<Self> {
        let analyser = SpectrumAnalyser::new(spectrum)?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound)?;

        // Get the default output configuration
        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate();
        let config = config.config();
        let channels = config.channels;

        let shared = Arc::new(Shared {
            gain: AtomicU32::new(1.0f32.to_bits()),
            tap: SpectrumTap::new(analyser.fft_size() * 4),
        });
        let (command_tx, command_rx) = bounded::<AudioCommand>(32);

        let shared_for_thread = Arc::clone(&shared);
        let audio_thread = thread::Builder::new()
            .name("spindle-audio".into())
            .spawn(move || Self::audio_thread_run(device, config, shared_for_thread, command_rx))
            .map_err(|e| AudioError::ThreadError(e.to_string()))?;

        debug!(sample_rate, channels, "Audio output ready");
        Ok(Self {
            command_tx,
            sample_rate,
            channels,
            shared,
            analyser,
            signals,
            audio_thread: Some(audio_thread),
        })
    }

    /// Device sample rate; decoded audio is resampled to it
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Audio thread main loop
    ///
    /// Owns the CPAL stream. At most one stream exists; starting a source
    /// drops the previous one first.
    fn audio_thread_run(
        device: Device,
        config: StreamConfig,
        shared: Arc<Shared>,
        command_rx: Receiver<AudioCommand>,
    ) {
        let mut current: Option<(Generation, Stream)> = None;

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                AudioCommand::Start { playhead, reply } => {
                    current = None;
                    shared.tap.clear();

                    let generation = playhead.generation;
                    let result = Self::open_stream(&device, &config, playhead, Arc::clone(&shared))
                        .map(|stream| {
                            current = Some((generation, stream));
                        });
                    if let Err(e) = &result {
                        error!(%generation, error = %e, "Failed to open stream");
                    }
                    // The source may have given up waiting
                    let _ = reply.send(result);
                }
                AudioCommand::Stop { generation } => {
                    if current.as_ref().is_some_and(|(live, _)| *live == generation) {
                        current = None;
                        shared.tap.clear();
                    }
                }
                AudioCommand::Shutdown => break,
            }
        }
        drop(current);
        debug!("Audio thread stopped");
    }

    fn open_stream(
        device: &Device,
        config: &StreamConfig,
        playhead: Arc<Playhead>,
        shared: Arc<Shared>,
    ) -> Result<Stream> {
        let out_channels = config.channels as usize;
        let stream = device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                Self::audio_callback(data, out_channels, &playhead, &shared);
            },
            |err| error!(error = %err, "Audio stream error"),
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    /// Audio callback function (runs in real-time audio thread)
    fn audio_callback(
        output: &mut [f32],
        out_channels: usize,
        playhead: &Playhead,
        shared: &Shared,
    ) {
        let gain = f32::from_bits(shared.gain.load(Ordering::Relaxed));
        let in_channels = playhead.channels;
        let total = playhead.total_frames();
        let mut frame = playhead.frame.load(Ordering::Relaxed);

        let mut mono = [0.0f32; 256];
        let mut mono_len = 0;

        for out_frame in output.chunks_mut(out_channels.max(1)) {
            if frame >= total {
                out_frame.fill(0.0);
                continue;
            }

            let input = &playhead.samples[frame * in_channels..(frame + 1) * in_channels];
            // Mono is duplicated, extra input channels are dropped
            for (ch, out) in out_frame.iter_mut().enumerate() {
                *out = input[ch.min(in_channels - 1)] * gain;
            }

            mono[mono_len] = input.iter().sum::<f32>() / in_channels as f32 * gain;
            mono_len += 1;
            if mono_len == mono.len() {
                shared.tap.push(mono);
                mono_len = 0;
            }
            frame += 1;
        }
        shared.tap.push(mono[..mono_len].iter().copied());
        playhead.frame.store(frame, Ordering::Relaxed);

        if frame >= total
            && playhead.owned.load(Ordering::Acquire)
            && !playhead.finished.swap(true, Ordering::AcqRel)
        {
            let _ = playhead.signals.send(OutputSignal::Ended {
                generation: playhead.generation,
            });
        }
    }
}

impl AudioOutput for CpalOutput {
    fn probe(&self) -> std::result::Result<(), OutputError> {
        match &self.audio_thread {
            Some(handle) if !handle.is_finished() => Ok(()),
            _ => Err(AudioError::ThreadError("audio thread exited".into()).into()),
        }
    }

    fn decode(&mut self, bytes: Vec<u8>, token: DecodeToken) {
        let signals = self.signals.clone();
        let target_rate = self.sample_rate;

        let spawned = thread::Builder::new()
            .name("spindle-decode".into())
            .spawn(move || {
                let result =
                    decode::decode_bytes(bytes, Some(target_rate)).map_err(DecodeError::from);
                if let Err(e) = &result {
                    warn!(%token, error = %e, "Decode failed");
                }
                let _ = signals.send(OutputSignal::Decoded { token, result });
            });

        if let Err(e) = spawned {
            error!(%token, error = %e, "Failed to spawn decode thread");
            let _ = self.signals.send(OutputSignal::Decoded {
                token,
                result: Err(DecodeError::new(format!("decode thread: {e}"))),
            });
        }
    }

    fn create_source(
        &mut self,
        buffer: &AudioBuffer,
        generation: Generation,
    ) -> Box<dyn SourceHandle> {
        let format = buffer.format();
        if format.sample_rate.as_hz() != self.sample_rate {
            warn!(
                buffer_rate = format.sample_rate.as_hz(),
                device_rate = self.sample_rate,
                "Buffer rate differs from device rate"
            );
        }

        let playhead = Arc::new(Playhead {
            generation,
            samples: buffer.shared_samples(),
            channels: usize::from(format.channels.max(1)),
            frame: AtomicUsize::new(0),
            owned: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            signals: self.signals.clone(),
        });

        Box::new(CpalSource {
            buffer: buffer.clone(),
            playhead,
            command_tx: self.command_tx.clone(),
            started: false,
        })
    }

    fn set_gain(&mut self, gain: f32) {
        let gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
        self.shared.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.shared.gain.load(Ordering::Relaxed))
    }

    fn spectrum(&self) -> Vec<u8> {
        self.analyser.analyse(&self.shared.tap.snapshot())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        // Send shutdown command
        let _ = self.command_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Source started at most once on the audio thread
pub struct CpalSource {
    buffer: AudioBuffer,
    playhead: Arc<Playhead>,
    command_tx: Sender<AudioCommand>,
    started: bool,
}

impl SourceHandle for CpalSource {
    fn generation(&self) -> Generation {
        self.playhead.generation
    }

    fn start(&mut self, offset: Duration) -> std::result::Result<(), OutputError> {
        if self.started {
            return Err(OutputError::Start("source already started".into()));
        }
        self.started = true;

        let frame = self.buffer.sample_index_at(offset) / self.playhead.channels;
        self.playhead.frame.store(frame, Ordering::Relaxed);

        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(AudioCommand::Start {
                playhead: Arc::clone(&self.playhead),
                reply: reply_tx,
            })
            .map_err(|_| AudioError::ThreadError("audio thread exited".into()))?;

        reply_rx
            .recv_timeout(START_TIMEOUT)
            .map_err(|e| AudioError::ThreadError(e.to_string()))??;
        Ok(())
    }

    fn disown(&mut self) {
        self.playhead.owned.store(false, Ordering::Release);
    }

    fn stop(&mut self) {
        if self.started {
            let _ = self.command_tx.send(AudioCommand::Stop {
                generation: self.playhead.generation,
            });
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.disown();
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_playback::signal_channel;

    #[test]
    fn create_output() {
        // This test might fail in CI without audio devices
        let (tx, _rx) = signal_channel();
        match CpalOutput::new(tx) {
            Ok(output) => {
                assert_eq!(output.gain(), 1.0);
                assert!(output.probe().is_ok());
            }
            Err(AudioError::DeviceNotFound | AudioError::DeviceError(_)) => {
                // Expected in headless environments
            }
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }

    #[test]
    fn gain_is_clamped() {
        let (tx, _rx) = signal_channel();
        let Ok(mut output) = CpalOutput::new(tx) else {
            return; // Skip test if no device
        };

        output.set_gain(0.5);
        assert_eq!(output.gain(), 0.5);
        output.set_gain(3.0);
        assert_eq!(output.gain(), 1.0);
        output.set_gain(f32::NAN);
        assert_eq!(output.gain(), 0.0);
    }

    #[test]
    fn source_starts_once_and_ends_with_signal() {
        let (tx, rx) = signal_channel();
        let Ok(mut output) = CpalOutput::new(tx) else {
            return; // Skip test if no device
        };

        // 50 ms of silence at the device rate
        let rate = output.sample_rate();
        let format = spindle_core::AudioFormat::new(spindle_core::SampleRate::new(rate), 1);
        let buffer = AudioBuffer::new(vec![0.0; rate as usize / 20], format);

        let mut source = output.create_source(&buffer, Generation::new(1));
        if source.start(Duration::ZERO).is_err() {
            return; // Device refused a stream (busy or headless)
        }
        assert!(source.start(Duration::ZERO).is_err());

        let signal = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            signal,
            OutputSignal::Ended { generation } if generation == Generation::new(1)
        ));
    }

    #[test]
    fn disowned_source_stays_silent() {
        let (tx, rx) = signal_channel();
        let Ok(mut output) = CpalOutput::new(tx) else {
            return; // Skip test if no device
        };

        let rate = output.sample_rate();
        let format = spindle_core::AudioFormat::new(spindle_core::SampleRate::new(rate), 1);
        let buffer = AudioBuffer::new(vec![0.0; rate as usize / 20], format);

        let mut source = output.create_source(&buffer, Generation::new(7));
        source.disown();
        if source.start(Duration::ZERO).is_err() {
            return;
        }

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }
}
