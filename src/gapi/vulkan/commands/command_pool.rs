use crate::gapi::vulkan::commands::command_buffers::CommandBuffer;
use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use anyhow::Context;
use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

/// A command pool bound to one queue family.
#[derive(Debug)]
pub struct CommandPool {
    command_pool: vk::CommandPool,
    family_index: u32,
}

impl CommandPool {
    pub fn new(
        device: &dyn DeviceDispatch,
        family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> anyhow::Result<Self> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(flags)
            .queue_family_index(family_index)
            .build();
        debug!("Created CommandPoolCreateInfo struct: {:#?}", info);
        let command_pool = device
            .create_command_pool(&info)
            .with_context(|| format!("Failed to create command pool for family {family_index}"))?;
        Ok(Self {
            command_pool,
            family_index,
        })
    }

    /// Allocates `count` primary command buffers.
    pub fn allocate(
        &self,
        device: &dyn DeviceDispatch,
        count: u32,
    ) -> anyhow::Result<Vec<CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count)
            .build();
        let buffers = device
            .allocate_command_buffers(&info)
            .with_context(|| format!("Failed to allocate {count} command buffers"))?;
        Ok(buffers.into_iter().map(CommandBuffer::new).collect())
    }

    /// Returns every buffer of the pool to the initial state.
    pub fn reset(&self, device: &dyn DeviceDispatch) -> anyhow::Result<()> {
        device
            .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
            .with_context(|| format!("Failed to reset command pool {:?}", self.command_pool))
    }

    pub fn destroy(&self, device: &dyn DeviceDispatch) {
        device.destroy_command_pool(self.command_pool);
    }

    pub fn get_vk(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn family_index(&self) -> u32 {
        self.family_index
    }
}
