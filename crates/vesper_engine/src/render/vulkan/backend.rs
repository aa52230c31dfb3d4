use super::{Buffer, CommandPool, FrameResources, GpuDevice, GpuModel, VulkanModelFactory, VulkanResult};
use crate::config::RenderConfig;
use crate::foundation::math::Mat4;
use crate::render::{FrameBackend, RenderError};
use crate::scene::{DrawnState, ModelData, ObjectId};
use ash::vk;
use std::collections::HashMap;
use std::sync::Arc;

const MATRIX_BYTES: vk::DeviceSize = std::mem::size_of::<[f32; 16]>() as vk::DeviceSize;

/// Per-model uniform buffers, one per frame slot
pub struct ModelUniforms {
    buffers: Vec<Buffer>,
}

impl ModelUniforms {
    fn new(device: &Arc<GpuDevice>, slots: usize) -> VulkanResult<Self> {
        let buffers = (0..slots)
            .map(|_| Buffer::new(Arc::clone(device), MATRIX_BYTES, vk::BufferUsageFlags::UNIFORM_BUFFER))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { buffers })
    }

    fn write(&self, slot: usize, matrix: &Mat4) -> VulkanResult<()> {
        self.buffers[slot].write(0, bytemuck::cast_slice(matrix.as_slice()))
    }

    /// Uniform buffer holding the model's world matrix for `slot`
    pub fn buffer(&self, slot: usize) -> vk::Buffer {
        self.buffers[slot].handle()
    }
}

/// What a [`DrawRecorder`] sees while recording one frame
pub struct FrameContext<'a> {
    /// Frame slot being recorded
    pub slot: usize,
    /// Drawn scene and live descriptors
    pub drawn: &'a DrawnState<GpuModel>,
    uniforms: &'a HashMap<ObjectId, ModelUniforms>,
}

impl FrameContext<'_> {
    /// Uniform buffer for a drawn model in this frame's slot
    pub fn uniform_buffer(&self, model: ObjectId) -> Option<vk::Buffer> {
        self.uniforms.get(&model).map(|uniforms| uniforms.buffer(self.slot))
    }

    /// Drawn models paired with their descriptors; models whose load has not
    /// arrived yet are skipped
    pub fn models(&self) -> impl Iterator<Item = (&ModelData, &GpuModel)> + '_ {
        self.drawn
            .scene()
            .models
            .iter()
            .filter_map(|model| self.drawn.descriptor(model.descriptor).map(|gpu| (model, gpu)))
    }
}

/// Records render passes and draw calls into a frame's command buffer
///
/// The backend owns synchronization and submission; pipelines, render
/// passes and presentation belong to the recorder.
pub trait DrawRecorder: Send {
    /// Record commands between `begin_command_buffer` and `end_command_buffer`
    fn record(&mut self, device: &ash::Device, command_buffer: vk::CommandBuffer, frame: &FrameContext<'_>);
}

/// [`FrameBackend`] on a Vulkan device
pub struct VulkanBackend {
    uniforms: HashMap<ObjectId, ModelUniforms>,
    retired_uniforms: Vec<(usize, ModelUniforms)>,
    recorder: Option<Box<dyn DrawRecorder>>,
    frames: Vec<FrameResources>,
    last_submitted: Option<usize>,
    _pool: CommandPool,
    device: Arc<GpuDevice>,
}

impl VulkanBackend {
    /// Create per-slot fences and command buffers on `device`
    pub fn new(device: Arc<GpuDevice>, config: &RenderConfig) -> VulkanResult<Self> {
        let pool = CommandPool::new(Arc::clone(&device))?;
        let frames = FrameResources::for_slots(&device, &pool, config.frames_in_flight.max(1))?;

        Ok(Self {
            uniforms: HashMap::new(),
            retired_uniforms: Vec::new(),
            recorder: None,
            frames,
            last_submitted: None,
            _pool: pool,
            device,
        })
    }

    /// Install the recorder that fills each frame's command buffer
    pub fn with_recorder(mut self, recorder: Box<dyn DrawRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Factory producing descriptors this backend can draw
    pub fn factory(&self) -> VulkanModelFactory {
        VulkanModelFactory::new(Arc::clone(&self.device))
    }

    /// The device
    pub fn device(&self) -> &Arc<GpuDevice> {
        &self.device
    }

    fn record(&mut self, slot: usize, drawn: &DrawnState<GpuModel>) -> VulkanResult<vk::CommandBuffer> {
        let raw = self.device.raw();
        let command_buffer = self.frames[slot].command_buffer;

        unsafe {
            raw.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            let begin_info =
                vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            raw.begin_command_buffer(command_buffer, &begin_info)?;
        }

        if let Some(recorder) = self.recorder.as_mut() {
            let frame = FrameContext {
                slot,
                drawn,
                uniforms: &self.uniforms,
            };
            recorder.record(raw, command_buffer, &frame);
        }

        unsafe { raw.end_command_buffer(command_buffer)? };
        Ok(command_buffer)
    }
}

impl FrameBackend for VulkanBackend {
    type Descriptor = GpuModel;

    fn begin_frame(&mut self, slot: usize) -> Result<(), RenderError> {
        self.frames[slot].in_flight.wait()?;
        // Uniforms released while the frame in `slot` was in flight are free now.
        self.retired_uniforms.retain(|(last_used, _)| *last_used != slot);
        Ok(())
    }

    fn release_model(&mut self, model: ObjectId) {
        if let Some(uniforms) = self.uniforms.remove(&model) {
            if let Some(slot) = self.last_submitted {
                self.retired_uniforms.push((slot, uniforms));
            }
        }
    }

    fn update_model(&mut self, slot: usize, model: &ModelData) {
        if !self.uniforms.contains_key(&model.id) {
            match ModelUniforms::new(&self.device, self.frames.len()) {
                Ok(uniforms) => {
                    self.uniforms.insert(model.id, uniforms);
                }
                Err(err) => {
                    log::error!("Uniform allocation for model {} failed: {err}", model.id.get());
                    return;
                }
            }
        }
        if let Some(uniforms) = self.uniforms.get(&model.id) {
            if let Err(err) = uniforms.write(slot, &model.matrix) {
                log::error!("Uniform update for model {} failed: {err}", model.id.get());
            }
        }
    }

    fn record_and_submit(&mut self, slot: usize, drawn: &DrawnState<GpuModel>) -> Result<(), RenderError> {
        let command_buffer = self.record(slot, drawn)?;

        let fence = &self.frames[slot].in_flight;
        fence.reset()?;
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
        self.device.submit(&[submit_info], fence.handle())?;

        self.last_submitted = Some(slot);
        Ok(())
    }

    fn destroy_descriptor(&mut self, descriptor: GpuModel) {
        drop(descriptor);
    }

    fn wait_idle(&mut self) -> Result<(), RenderError> {
        self.device.wait_idle()?;
        self.retired_uniforms.clear();
        Ok(())
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            log::error!("Device wait on backend drop failed: {err}");
        }
    }
}
