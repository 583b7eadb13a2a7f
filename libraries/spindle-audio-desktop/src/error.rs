/// Audio output errors
use spindle_playback::{DecodeError, OutputError};
use thiserror::Error;

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Device not found
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to play stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// The audio thread is gone or did not answer
    #[error("Audio thread unavailable: {0}")]
    ThreadError(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt or undecodable audio data
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Invalid analyser configuration
    #[error("Invalid spectrum configuration: {0}")]
    InvalidSpectrum(String),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match err {
            SymphoniaError::Unsupported(what) => AudioError::UnsupportedFormat(what.to_string()),
            other => AudioError::DecodeError(other.to_string()),
        }
    }
}

impl From<AudioError> for OutputError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::DeviceNotFound
            | AudioError::DeviceError(_)
            | AudioError::ThreadError(_) => OutputError::Unavailable(err.to_string()),
            other => OutputError::Start(other.to_string()),
        }
    }
}

impl From<AudioError> for DecodeError {
    fn from(err: AudioError) -> Self {
        DecodeError::new(err.to_string())
    }
}
