use crate::audio::{AudioError, MixerCallback, CHANNELS};
use crate::config::AudioConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

/// Running output stream on the default device
///
/// The stream stops when this is dropped.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioOutput {
    /// Open the default output device and start playing `callback`
    pub fn start(callback: MixerCallback, config: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoOutputDevice)?;

        let stream_config = cpal::StreamConfig {
            channels: CHANNELS as u16,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.frames_per_buffer),
        };
        let block = config.frames_per_buffer as usize * CHANNELS;

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::Stream(format!("Failed to get default config: {e}")))?;

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, callback, block)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, callback, block)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, callback, block)?,
            other => return Err(AudioError::Stream(format!("Unsupported sample format {other:?}"))),
        };

        stream
            .play()
            .map_err(|e| AudioError::Stream(format!("Failed to start stream: {e}")))?;

        log::info!(
            "Audio output started: {} Hz, {} frames per block",
            config.sample_rate,
            config.frames_per_buffer
        );
        Ok(Self {
            stream,
            sample_rate: config.sample_rate,
        })
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pause playback
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::Stream(format!("Failed to pause stream: {e}")))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: MixerCallback,
    block: usize,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    // Samples are mixed in f32 then converted; sized up front so the
    // callback only grows it if the device ignores the fixed block size.
    let mut scratch = vec![0.0f32; block];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let mixed = &mut scratch[..data.len()];
                callback.render(mixed);
                for (sample, &value) in data.iter_mut().zip(mixed.iter()) {
                    *sample = T::from_sample(value);
                }
            },
            |err| log::error!("Audio stream error: {err}"),
            None,
        )
        .map_err(|e| AudioError::Stream(format!("Failed to build stream: {e}")))
}
