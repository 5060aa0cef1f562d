use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::memory::pick_memory_type;
use anyhow::Context;
use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

/// A buffer with its own dedicated allocation already bound.
#[derive(Debug)]
pub struct BoundBuffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl BoundBuffer {
    pub fn new(
        device: &dyn DeviceDispatch,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> anyhow::Result<Self> {
        let info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .build();
        debug!("Created BufferCreateInfo struct: {info:#?}");
        let buffer = device
            .create_buffer(&info)
            .with_context(|| format!("Failed to create {size}-byte buffer"))?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let memory = pick_memory_type(memory_properties, requirements.memory_type_bits)
            .map_err(anyhow::Error::from)
            .and_then(|memory_type_index| {
                let alloc = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                device
                    .allocate_memory(&alloc)
                    .context("Failed to allocate buffer memory")
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(err) => {
                device.destroy_buffer(buffer);
                return Err(err);
            }
        };
        if let Err(err) = device.bind_buffer_memory(buffer, memory, 0) {
            device.destroy_buffer(buffer);
            device.free_memory(memory);
            return Err(err).context("Failed to bind buffer memory");
        }

        Ok(Self {
            buffer,
            memory,
            size,
        })
    }

    pub fn get_vk(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    pub fn destroy(&self, device: &dyn DeviceDispatch) {
        device.destroy_buffer(self.buffer);
        device.free_memory(self.memory);
    }
}
