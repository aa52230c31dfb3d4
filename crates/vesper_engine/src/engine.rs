//! Engine assembly
//!
//! Wires the scene bridge, simulation loop, model loader and audio mixer
//! together from one [`EngineConfig`] and runs the simulation thread next to
//! a frame loop.

use crate::audio::{AudioError, AudioMixer, MixerCallback};
use crate::config::{ConfigError, EngineConfig};
use crate::input::InputSource;
use crate::render::{FrameBackend, FrameLoop, RenderError};
use crate::scene::{BridgeError, DescriptorFactory, ModelLoader, SceneBridge};
use crate::scheduler::SchedulerError;
use crate::simulation::SimulationLoop;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker threads could not be started
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Scene bridge message queue overflowed
    #[error("Scene bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Rendering failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Audio failed
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// A loop thread could not be spawned
    #[error("Failed to spawn {name} thread: {source}")]
    Thread {
        /// Thread name
        name: &'static str,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// A loop thread panicked
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Simulation, scene bridge, model loading and audio mixing for one
/// descriptor factory
pub struct Engine<F: DescriptorFactory> {
    config: EngineConfig,
    bridge: Arc<SceneBridge<F::Descriptor>>,
    simulation: SimulationLoop,
    loader: ModelLoader<F>,
    mixer: AudioMixer,
    mixer_callback: Option<MixerCallback>,
}

impl<F: DescriptorFactory> Engine<F> {
    /// Build every subsystem from `config`
    pub fn new(config: EngineConfig, factory: Arc<F>) -> Result<Self, EngineError> {
        Self::build(config, factory, None)
    }

    /// Like [`new`](Self::new), polling `input` after every scene submit
    ///
    /// See [`SceneBridge::with_input`] for which thread polls.
    pub fn with_input(config: EngineConfig, factory: Arc<F>, input: Arc<dyn InputSource>) -> Result<Self, EngineError> {
        Self::build(config, factory, Some(input))
    }

    fn build(config: EngineConfig, factory: Arc<F>, input: Option<Arc<dyn InputSource>>) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!("Initializing engine...");

        let mut bridge = SceneBridge::new(&config.bridge);
        if let Some(input) = input {
            bridge = bridge.with_input(input);
        }
        let bridge = Arc::new(bridge);

        let simulation = SimulationLoop::new(&config.simulation)?.with_submitter(bridge.clone());
        let loader = ModelLoader::new(factory, Arc::clone(&bridge))?;
        let (mixer, mixer_callback) = AudioMixer::new(&config.audio);

        log::info!(
            "Engine ready: {} simulation workers, {:?} tick",
            simulation.scheduler().worker_count(),
            simulation.tick_delay()
        );

        Ok(Self {
            config,
            bridge,
            simulation,
            loader,
            mixer,
            mixer_callback: Some(mixer_callback),
        })
    }

    /// Configuration the engine was built from
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scene registration and the simulation/render handoff
    pub fn bridge(&self) -> &Arc<SceneBridge<F::Descriptor>> {
        &self.bridge
    }

    /// Actor and physics registration
    pub fn simulation(&self) -> &SimulationLoop {
        &self.simulation
    }

    /// Model index allocation and descriptor loading
    pub fn loader(&self) -> &ModelLoader<F> {
        &self.loader
    }

    /// Audio submission
    pub fn mixer(&self) -> &AudioMixer {
        &self.mixer
    }

    /// Take the real-time half of the mixer to hand to an output device
    ///
    /// Returns `None` after the first call.
    pub fn take_mixer_callback(&mut self) -> Option<MixerCallback> {
        self.mixer_callback.take()
    }

    /// Start audio output on the default device
    #[cfg(feature = "audio-backend")]
    pub fn start_audio(&mut self) -> Result<crate::audio::backend::AudioOutput, EngineError> {
        let callback = self.take_mixer_callback().ok_or_else(|| {
            AudioError::Stream("mixer callback already taken".to_string())
        })?;
        Ok(crate::audio::backend::AudioOutput::start(callback, &self.config.audio)?)
    }

    /// Frame loop drawing this engine's scene through `backend`
    pub fn frame_loop<B>(&self, backend: B) -> FrameLoop<B>
    where
        B: FrameBackend<Descriptor = F::Descriptor>,
    {
        FrameLoop::new(backend, Arc::clone(&self.bridge), &self.config.render)
    }

    /// Run the simulation on its own thread and `frames` on this one
    ///
    /// Returns once the frame loop is stopped (or fails); the simulation is
    /// then stopped and joined. Stop the frame loop through its
    /// [`stop_handle`](FrameLoop::stop_handle).
    pub fn run<B>(&self, frames: &mut FrameLoop<B>) -> Result<(), EngineError>
    where
        B: FrameBackend<Descriptor = F::Descriptor>,
    {
        log::info!("Starting main loops...");

        let result = thread::scope(|scope| {
            let simulation = thread::Builder::new()
                .name("vesper-simulation".to_string())
                .spawn_scoped(scope, || self.simulation.main_loop())
                .map_err(|source| EngineError::Thread {
                    name: "simulation",
                    source,
                })?;

            let rendered = frames.main_loop();
            self.simulation.stop();

            simulation.join().map_err(|_| EngineError::ThreadPanicked("simulation"))?;
            rendered.map_err(EngineError::from)
        });

        self.loader.flush();
        log::info!("Engine loops stopped");
        result
    }

    /// Stop the simulation loop
    pub fn stop(&self) {
        self.simulation.stop();
    }
}
