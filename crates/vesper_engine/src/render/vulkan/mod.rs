//! Vulkan frame backend
//!
//! Resources are RAII wrappers that hold an `Arc` to the device (and through
//! it the instance), so the instance outlives every device and the device
//! outlives every buffer, fence and command pool created from it.

mod backend;
mod buffer;
mod device;
mod frame_sync;
mod instance;

pub use backend::{DrawRecorder, FrameContext, ModelUniforms, VulkanBackend};
pub use buffer::{Buffer, GpuModel, VulkanModelFactory};
pub use device::{graphics_queue_family, memory_type_index, GpuDevice};
pub use frame_sync::{CommandPool, Fence, FrameResources};
pub use instance::VulkanInstance;

use ash::vk;
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// Vulkan API call returned an error code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader library could not be loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Instance or device setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No memory type satisfies the requested properties
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
