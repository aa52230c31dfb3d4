use super::{GpuDevice, VulkanResult};
use crate::render::RenderError;
use crate::scene::{DescriptorFactory, VertexData};
use ash::vk;
use std::sync::Arc;

/// Host-visible buffer with its own memory allocation
pub struct Buffer {
    device: Arc<GpuDevice>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a host-visible, host-coherent buffer of `size` bytes
    pub fn new(device: Arc<GpuDevice>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        let raw = device.raw();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { raw.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { raw.get_buffer_memory_requirements(buffer) };
        let memory = device
            .find_memory_type(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )
            .and_then(|memory_type_index| {
                let alloc_info = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                Ok(unsafe { raw.allocate_memory(&alloc_info, None)? })
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { raw.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        let created = Self { device, buffer, memory, size };
        unsafe { created.device.raw().bind_buffer_memory(buffer, memory, 0)? };
        Ok(created)
    }

    /// Create a buffer holding `bytes`
    pub fn with_data(device: Arc<GpuDevice>, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        let buffer = Self::new(device, bytes.len() as vk::DeviceSize, usage)?;
        buffer.write(0, bytes)?;
        Ok(buffer)
    }

    /// Copy `bytes` into the buffer at `offset`
    ///
    /// # Panics
    /// If the write runs past the end of the buffer.
    pub fn write(&self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        let len = bytes.len() as vk::DeviceSize;
        assert!(offset + len <= self.size, "buffer write out of bounds");
        if bytes.is_empty() {
            return Ok(());
        }

        let raw = self.device.raw();
        unsafe {
            let mapped = raw.map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            raw.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.raw().destroy_buffer(self.buffer, None);
            self.device.raw().free_memory(self.memory, None);
        }
    }
}

/// Model descriptor: vertex and index buffers uploaded once
pub struct GpuModel {
    vertices: Buffer,
    indices: Buffer,
    index_count: u32,
}

impl GpuModel {
    /// Vertex buffer
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertices.handle()
    }

    /// Index buffer (`u32` indices)
    pub fn index_buffer(&self) -> vk::Buffer {
        self.indices.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Creates [`GpuModel`] descriptors on the loader thread
#[derive(Clone)]
pub struct VulkanModelFactory {
    device: Arc<GpuDevice>,
}

impl VulkanModelFactory {
    /// Factory uploading to `device`
    pub fn new(device: Arc<GpuDevice>) -> Self {
        Self { device }
    }
}

impl DescriptorFactory for VulkanModelFactory {
    type Descriptor = GpuModel;

    fn create_model(&self, data: &VertexData) -> Result<GpuModel, RenderError> {
        if data.is_empty() || data.vertices.is_empty() {
            return Err(RenderError::ResourceCreation("model has no geometry".to_string()));
        }
        let index_count = u32::try_from(data.indices.len())
            .map_err(|_| RenderError::ResourceCreation("too many indices".to_string()))?;

        let vertices = Buffer::with_data(
            Arc::clone(&self.device),
            data.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let indices = Buffer::with_data(
            Arc::clone(&self.device),
            data.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        Ok(GpuModel {
            vertices,
            indices,
            index_count,
        })
    }

    fn destroy_model(&self, descriptor: GpuModel) {
        drop(descriptor);
    }
}
