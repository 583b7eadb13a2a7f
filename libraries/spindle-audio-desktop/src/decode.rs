//! In-memory decoding with Symphonia
//!
//! The playback engine hands over the complete encoded file, so the whole
//! track is decoded up front into one interleaved f32 buffer and, when the
//! device runs at a different rate, resampled once with rubato. Sources then
//! start at any offset without touching the decoder again.
//!
//! Supported containers and codecs are whatever Symphonia's `all` feature
//! provides (MP3, FLAC, OGG/Vorbis, WAV, AAC/M4A, ...).

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use spindle_core::{AudioBuffer, AudioFormat, SampleRate};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode a complete encoded file
///
/// When `target_rate` is given and differs from the file's rate, the result
/// is resampled to it.
pub fn decode_bytes(bytes: Vec<u8>, target_rate: Option<u32>) -> Result<AudioBuffer> {
    let decoded = decode_native(bytes)?;
    match target_rate {
        Some(rate) if rate != decoded.format().sample_rate.as_hz() => resample(&decoded, rate),
        _ => Ok(decoded),
    }
}

/// Decode without changing the sample rate
fn decode_native(bytes: Vec<u8>) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .default_track()
        .ok_or_else(|| AudioError::UnsupportedFormat("no audio track found".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        // Skip packets from other tracks
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(error = e, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        // Normalises every sample format to interleaved f32
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let sample_rate = sample_rate
        .ok_or_else(|| AudioError::UnsupportedFormat("unknown sample rate".into()))?;
    let channels = channels
        .filter(|&c| c > 0)
        .ok_or_else(|| AudioError::UnsupportedFormat("unknown channel layout".into()))?;

    let format = AudioFormat::new(SampleRate::new(sample_rate), channels);
    let buffer = AudioBuffer::new(samples, format);
    debug!(
        sample_rate,
        channels,
        frames = buffer.frames(),
        "Decoded audio"
    );
    Ok(buffer)
}

/// Resample a whole buffer to `target_rate`
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    let format = buffer.format();
    let source_rate = format.sample_rate.as_hz();
    let channels = format.channels as usize;
    let frames = buffer.frames();
    let target_format = AudioFormat::new(SampleRate::new(target_rate), format.channels);

    if frames == 0 || source_rate == 0 || channels == 0 {
        return Ok(AudioBuffer::new(Vec::new(), target_format));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        2.0,
        params,
        frames,
        channels,
    )
    .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    // Deinterleave input samples
    let input = buffer.samples();
    let mut deinterleaved = vec![Vec::with_capacity(frames); channels];
    for frame in input.chunks_exact(channels) {
        for (channel, sample) in deinterleaved.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    let resampled = resampler
        .process(&deinterleaved, None)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    // Interleave output samples
    let output_frames = resampled.first().map_or(0, Vec::len);
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_frames {
        for channel in &resampled {
            interleaved.push(channel[frame_idx]);
        }
    }

    debug!(source_rate, target_rate, output_frames, "Resampled audio");
    Ok(AudioBuffer::new(interleaved, target_format))
}
