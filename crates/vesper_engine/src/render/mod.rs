//! Render-side consumer of the scene bridge
//!
//! [`FrameLoop`] drives a [`FrameBackend`] once per frame: it waits for the
//! frame slot to be free, destroys descriptors whose last user has retired,
//! pulls the drawn scene from the bridge and hands it to the backend for
//! recording. GPU command construction lives entirely in the backend.

mod backend;
mod frame_loop;
mod headless;
pub mod vulkan;

pub use backend::{FrameBackend, RenderError};
pub use frame_loop::FrameLoop;
pub use headless::{HeadlessBackend, HeadlessFactory, HeadlessModel, ResourceLedger};
