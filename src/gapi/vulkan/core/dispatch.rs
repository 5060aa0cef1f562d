//! The device calls the harness needs, behind a trait.
//!
//! [`LogicalDevice`](crate::gapi::vulkan::core::logical_device::LogicalDevice) forwards them
//! to the driver; the unit tests plug in an in-process device instead. Every method hands the
//! driver's raw result back unchanged, so callers decide what a failure means.

use vulkanalia::vk;
use vulkanalia::{VkResult, VkSuccessResult};

pub trait DeviceDispatch {
    fn device_wait_idle(&self) -> VkResult<()>;
    fn get_device_queue(&self, family_index: u32, queue_index: u32) -> vk::Queue;
    fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()>;
    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()>;

    fn create_pipeline_cache(
        &self,
        info: &vk::PipelineCacheCreateInfo,
    ) -> VkResult<vk::PipelineCache>;
    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache);

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VkResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo,
    ) -> VkResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> VkResult<Vec<vk::DescriptorSet>>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]);

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_shader_module(&self, info: &vk::ShaderModuleCreateInfo)
    -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    fn create_graphics_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::GraphicsPipelineCreateInfo],
    ) -> VkSuccessResult<Vec<vk::Pipeline>>;
    fn create_compute_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::ComputePipelineCreateInfo],
    ) -> VkSuccessResult<Vec<vk::Pipeline>>;
    fn create_ray_tracing_pipelines_nv(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::RayTracingPipelineCreateInfoNV],
    ) -> VkSuccessResult<Vec<vk::Pipeline>>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo)
    -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn reset_command_pool(
        &self,
        pool: vk::CommandPool,
        flags: vk::CommandPoolResetFlags,
    ) -> VkResult<()>;
    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()>;
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    #[allow(clippy::too_many_arguments)]
    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier],
        image_barriers: &[vk::ImageMemoryBarrier],
    );

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn get_buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;
    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image>;
    fn destroy_image(&self, image: vk::Image);
    fn get_image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;
    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory>;
    fn free_memory(&self, memory: vk::DeviceMemory);

    fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);
}
