use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use anyhow::Context;
use log::trace;
use std::slice;
use vulkanalia::vk;
use vulkanalia::vk::{Handle, HasBuilder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandBuffer {
    command_buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    pub fn new(command_buffer: vk::CommandBuffer) -> Self {
        Self { command_buffer }
    }

    pub fn get_vk(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn begin(&self, device: &dyn DeviceDispatch) -> anyhow::Result<()> {
        let info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::empty())
            .build();
        device
            .begin_command_buffer(self.command_buffer, &info)
            .with_context(|| {
                format!("Failed to begin recording command buffer {:?}", self.command_buffer)
            })
    }

    pub fn end(&self, device: &dyn DeviceDispatch) -> anyhow::Result<()> {
        device
            .end_command_buffer(self.command_buffer)
            .with_context(|| "Failed to end recording command buffer")
    }

    /// Begins, runs `recording_logic`, ends.
    pub fn record<F>(&self, device: &dyn DeviceDispatch, recording_logic: F) -> anyhow::Result<()>
    where
        F: FnOnce(&Self) -> anyhow::Result<()>,
    {
        self.begin(device)?;
        recording_logic(self)?;
        self.end(device)
    }

    /// Records a pipeline barrier with at most one buffer and one image barrier.
    pub fn pipeline_barrier(
        &self,
        device: &dyn DeviceDispatch,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        buffer_barrier: Option<&vk::BufferMemoryBarrier>,
        image_barrier: Option<&vk::ImageMemoryBarrier>,
    ) {
        trace!(
            "Recording barrier on {:?}: {:?} -> {:?}",
            self.command_buffer, src_stage_mask, dst_stage_mask
        );
        device.cmd_pipeline_barrier(
            self.command_buffer,
            src_stage_mask,
            dst_stage_mask,
            dependency_flags,
            buffer_barrier.map(slice::from_ref).unwrap_or_default(),
            image_barrier.map(slice::from_ref).unwrap_or_default(),
        );
    }

    /// Submits `buffers` in a single `VkSubmitInfo` without a fence.
    pub fn submit_all(
        device: &dyn DeviceDispatch,
        queue: vk::Queue,
        buffers: &[CommandBuffer],
    ) -> vulkanalia::VkResult<()> {
        let handles = buffers.iter().map(|cb| cb.get_vk()).collect::<Vec<_>>();
        let submit = vk::SubmitInfo::builder().command_buffers(&handles).build();
        device.queue_submit(queue, slice::from_ref(&submit), vk::Fence::null())
    }

    /// Submits `buffers` as one batch and waits for the queue to drain.
    ///
    /// A failed submit is returned as is; the queue is only waited on after a good one.
    pub fn submit_and_wait(
        device: &dyn DeviceDispatch,
        queue: vk::Queue,
        buffers: &[CommandBuffer],
    ) -> vulkanalia::VkResult<()> {
        Self::submit_all(device, queue, buffers)?;
        device.queue_wait_idle(queue)
    }

    /// Submits this buffer alone and waits for the queue to drain.
    pub fn queue_and_wait(
        &self,
        device: &dyn DeviceDispatch,
        queue: vk::Queue,
    ) -> vulkanalia::VkResult<()> {
        Self::submit_and_wait(device, queue, slice::from_ref(self))
    }
}
