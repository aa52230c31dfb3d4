//! Audio mixing
//!
//! Playback buffers are handed to the real-time callback through ring
//! buffers. The callback keeps the voices it is playing in an intrusive list
//! over a preallocated slab and returns finished voices through a second ring,
//! so it never locks, allocates or frees.

mod buffer;
mod mixer;

#[cfg(feature = "audio-backend")]
pub mod backend;

pub use buffer::AudioBuffer;
pub use mixer::{AudioMixer, MixerCallback};

use thiserror::Error;

/// Output channels; every buffer and output block is interleaved stereo
pub const CHANNELS: usize = 2;

/// Audio errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// More buffers were submitted than the callback has admitted
    #[error("Audio submission queue full ({capacity} buffers)")]
    QueueFull {
        /// Capacity of the submission queue
        capacity: usize,
    },

    /// No output device is available
    #[error("No audio output device available")]
    NoOutputDevice,

    /// The output stream could not be built or started
    #[error("Audio stream error: {0}")]
    Stream(String),
}
