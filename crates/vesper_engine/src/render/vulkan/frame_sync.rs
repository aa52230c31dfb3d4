use super::{GpuDevice, VulkanResult};
use ash::vk;
use std::sync::Arc;

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Arc<GpuDevice>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Arc<GpuDevice>, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.raw().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe { self.device.raw().wait_for_fences(&[self.fence], true, u64::MAX)? };
        Ok(())
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.raw().reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Raw fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.raw().destroy_fence(self.fence, None) };
    }
}

/// Command pool on the graphics queue family
pub struct CommandPool {
    device: Arc<GpuDevice>,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Pool whose buffers can be reset individually
    pub fn new(device: Arc<GpuDevice>) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_family())
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.raw().create_command_pool(&create_info, None)? };
        Ok(Self { device, pool })
    }

    /// Allocate `count` primary command buffers
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        Ok(unsafe { self.device.raw().allocate_command_buffers(&allocate_info)? })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe { self.device.raw().destroy_command_pool(self.pool, None) };
    }
}

/// Fence and command buffer owned by one frame slot
pub struct FrameResources {
    /// Signaled when the GPU finishes the slot's last submission
    pub in_flight: Fence,
    /// Re-recorded every time the slot comes around
    pub command_buffer: vk::CommandBuffer,
}

impl FrameResources {
    /// One resource set per frame slot; fences start signaled so the first wait returns
    pub fn for_slots(device: &Arc<GpuDevice>, pool: &CommandPool, slots: usize) -> VulkanResult<Vec<Self>> {
        let count = u32::try_from(slots).unwrap_or(u32::MAX);
        pool.allocate(count)?
            .into_iter()
            .map(|command_buffer| {
                Ok(Self {
                    in_flight: Fence::new(Arc::clone(device), true)?,
                    command_buffer,
                })
            })
            .collect()
    }
}
