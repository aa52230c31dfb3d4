use super::vulkan::VulkanError;
use crate::scene::{DrawnState, ModelData, ObjectId};
use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Vulkan call failed
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// A GPU resource could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    /// A frame could not be recorded or submitted
    #[error("Frame failed: {0}")]
    Frame(String),
}

/// GPU side of the frame loop
///
/// Calls arrive on the render thread in this order for every frame:
/// `begin_frame`, any `destroy_descriptor`, `release_model` for removed
/// models, `update_model` for every drawn model, then `record_and_submit`.
pub trait FrameBackend {
    /// Model descriptor type this backend draws
    type Descriptor: Send + 'static;

    /// Block until the GPU has finished the previous frame that used `slot`
    fn begin_frame(&mut self, slot: usize) -> Result<(), RenderError>;

    /// Free per-model resources of a model removed from the scene
    fn release_model(&mut self, model: ObjectId);

    /// Refresh per-model uniforms for the frame in `slot`
    fn update_model(&mut self, slot: usize, model: &ModelData);

    /// Record and submit the frame for `slot`
    fn record_and_submit(
        &mut self,
        slot: usize,
        drawn: &DrawnState<Self::Descriptor>,
    ) -> Result<(), RenderError>;

    /// Destroy a descriptor no in-flight frame references any more
    fn destroy_descriptor(&mut self, descriptor: Self::Descriptor);

    /// Block until the GPU is idle
    fn wait_idle(&mut self) -> Result<(), RenderError>;
}
