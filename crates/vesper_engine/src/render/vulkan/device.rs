use super::{VulkanError, VulkanInstance, VulkanResult};
use ash::{vk, Device};
use parking_lot::Mutex;
use std::ffi::CStr;
use std::sync::Arc;

/// Physical device selection and logical device with its graphics queue
///
/// The queue is behind a mutex: the loader thread never submits, but the
/// render thread and `wait_idle` callers may.
pub struct GpuDevice {
    device: Device,
    queue: Mutex<vk::Queue>,
    physical: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    graphics_family: u32,
    instance: Arc<VulkanInstance>,
}

impl GpuDevice {
    /// Pick a GPU with a graphics queue (discrete GPUs first) and create the logical device
    pub fn new(instance: Arc<VulkanInstance>) -> VulkanResult<Self> {
        let raw = instance.raw();
        let physical_devices = unsafe { raw.enumerate_physical_devices()? };

        let (physical, graphics_family) = physical_devices
            .iter()
            .filter_map(|&device| Self::find_graphics_family(&instance, device).map(|family| (device, family)))
            .max_by_key(|&(device, _)| {
                let properties = unsafe { raw.get_physical_device_properties(device) };
                properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            })
            .ok_or_else(|| VulkanError::InitializationFailed("No GPU with a graphics queue".to_string()))?;

        let properties = unsafe { raw.get_physical_device_properties(physical) };
        let memory_properties = unsafe { raw.get_physical_device_memory_properties(physical) };
        log::info!("Selected GPU: {}", unsafe {
            CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy()
        });

        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_family)
            .queue_priorities(&priorities)
            .build()];
        let create_info = vk::DeviceCreateInfo::builder().queue_create_infos(&queue_infos);

        let device = unsafe { raw.create_device(physical, &create_info, None)? };
        let queue = unsafe { device.get_device_queue(graphics_family, 0) };

        Ok(Self {
            device,
            queue: Mutex::new(queue),
            physical,
            properties,
            memory_properties,
            graphics_family,
            instance,
        })
    }

    fn find_graphics_family(instance: &VulkanInstance, device: vk::PhysicalDevice) -> Option<u32> {
        let families = unsafe { instance.raw().get_physical_device_queue_family_properties(device) };
        graphics_queue_family(&families)
    }

    /// Logical device
    pub fn raw(&self) -> &Device {
        &self.device
    }

    /// Instance this device was created from
    pub fn instance(&self) -> &Arc<VulkanInstance> {
        &self.instance
    }

    /// Selected physical device
    pub fn physical(&self) -> vk::PhysicalDevice {
        self.physical
    }

    /// Device properties and limits
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Queue family of the graphics queue
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Find a memory type allowed by `type_bits` with all of `properties`
    pub fn find_memory_type(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        memory_type_index(&self.memory_properties, type_bits, properties).ok_or(VulkanError::NoSuitableMemoryType)
    }

    /// Submit to the graphics queue, signalling `fence` on completion
    pub fn submit(&self, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        let queue = self.queue.lock();
        unsafe { self.device.queue_submit(*queue, submits, fence)? };
        Ok(())
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        let _queue = self.queue.lock();
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for GpuDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::error!("Device wait before destruction failed: {err:?}");
            }
            self.device.destroy_device(None);
        }
    }
}

/// Index of the first queue family that supports graphics
pub fn graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .and_then(|index| u32::try_from(index).ok())
}

/// Index of the first memory type in `type_bits` that has all of `properties`
pub fn memory_type_index(
    memory: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory.memory_type_count).find(|&i| {
        type_bits & (1 << i) != 0 && memory.memory_types[i as usize].property_flags.contains(properties)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut memory = vk::PhysicalDeviceMemoryProperties::default();
        for (i, &flags) in types.iter().enumerate() {
            memory.memory_types[i].property_flags = flags;
        }
        memory.memory_type_count = types.len() as u32;
        memory
    }

    #[test]
    fn test_memory_type_matches_properties() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let memory = memory(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host]);

        assert_eq!(memory_type_index(&memory, 0b11, host), Some(1));
        assert_eq!(
            memory_type_index(&memory, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }

    #[test]
    fn test_graphics_family_skips_compute_only_queues() {
        let family = |queue_flags| vk::QueueFamilyProperties {
            queue_flags,
            ..Default::default()
        };
        let families = [
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];

        assert_eq!(graphics_queue_family(&families), Some(2));
        assert_eq!(graphics_queue_family(&families[..2]), None);
    }

    #[test]
    fn test_memory_type_respects_type_bits() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE;
        let memory = memory(&[host, host]);

        assert_eq!(memory_type_index(&memory, 0b10, host), Some(1));
        assert_eq!(memory_type_index(&memory, 0b100, host), None);
        assert_eq!(memory_type_index(&memory, 0, host), None);
    }
}
