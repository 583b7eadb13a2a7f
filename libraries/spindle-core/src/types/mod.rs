//! Domain types

mod audio;
mod ids;
mod playback_state;
mod track;

pub use audio::{AudioBuffer, AudioFormat, SampleRate};
pub use ids::TrackId;
pub use playback_state::PlaybackState;
pub use track::Track;
