//! Fixed-tick simulation
//!
//! Each tick runs an early actor wave, the registered physical engines, a late
//! actor wave and finally hands the staged scene to the renderer. Actor waves
//! run in parallel on a [`TaskScheduler`](crate::scheduler::TaskScheduler);
//! there is no ordering among actors within a wave.

mod actor;
mod physics;
mod simulation_loop;

pub use actor::Actor;
pub use physics::PhysicalEngine;
pub use simulation_loop::{SceneSubmitter, SimulationLoop, TickStats};

pub use crate::foundation::collections::{ActorId, EngineId};
pub use crate::foundation::sync::StopHandle;
