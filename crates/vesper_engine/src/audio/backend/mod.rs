//! Audio output device driving the mixer callback

mod cpal_output;

pub use cpal_output::AudioOutput;
