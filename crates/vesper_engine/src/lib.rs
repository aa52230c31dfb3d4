//! # Vesper Engine
//!
//! Core of a real-time simulation and rendering engine. A fixed-tick
//! simulation thread and a Vulkan render thread run unsynchronized and meet
//! only at a triple-buffered scene bridge; an audio mixer hands playback
//! buffers to the real-time callback through ring buffers.
//!
//! ## Components
//!
//! - **Scheduler**: thread pool with waitable and fire-and-forget tasks
//! - **Simulation**: fixed-step actor and physics waves dispatched on the pool
//! - **Scene**: staged → submitted → drawn snapshots and async model loading
//! - **Render**: frame loop with deferred GPU resource destruction
//! - **Audio**: allocation-free mixer callback fed through ring buffers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vesper_engine::prelude::*;
//!
//! struct Spinner;
//!
//! impl Actor for Spinner {
//!     fn tick(&self, _dt: f64) {}
//! }
//!
//! fn main() -> Result<(), EngineError> {
//!     let config = EngineConfig::default();
//!     let bridge = Arc::new(SceneBridge::<()>::new(&config.bridge));
//!     let simulation = SimulationLoop::new(&config.simulation)?
//!         .with_submitter(bridge.clone());
//!     simulation.register_actor(Arc::new(Spinner));
//!     simulation.tick_once();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod scheduler;
pub mod simulation;
pub mod scene;
pub mod render;
pub mod input;
pub mod audio;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Engine, EngineError,
        audio::{AudioBuffer, AudioMixer, MixerCallback},
        config::{Config, EngineConfig},
        foundation::{
            math::{Mat4, Vec3},
            ring_buffer::{InsertMode, RingBuffer},
        },
        input::InputSource,
        render::{FrameBackend, FrameLoop, HeadlessBackend},
        scene::{
            Camera, DescriptorFactory, DrawnState, Light, LoadMode, Model, ModelLoader,
            Rectangle, SceneBridge, SceneObject, Sprite,
        },
        scheduler::{TaskId, TaskScheduler},
        simulation::{Actor, PhysicalEngine, SceneSubmitter, SimulationLoop},
    };
}
