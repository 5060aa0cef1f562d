use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::core::instance::Instance;
use crate::gapi::vulkan::core::queues::{self, QueueFamily};
use crate::gapi::vulkan::core::real_device::RealDevice;
use crate::gapi::vulkan::enums::extensions::DeviceExtension;
use crate::info_success;
use anyhow::Context;
use log::{debug, trace};
use vulkanalia::vk::{DeviceV1_0, HasBuilder, InstanceV1_0, NvRayTracingExtension};
use vulkanalia::{vk, Device, VkResult, VkSuccessResult};

/// Wraps the Vulkan logical device the tests run against.
///
/// One queue is created for every queue family of the physical device so ownership
/// transfers can be exercised between any pair of families.
pub struct LogicalDevice {
    device: Device,
    families: Vec<QueueFamily>,
    extensions: Vec<DeviceExtension>,
}

impl LogicalDevice {
    pub fn new(
        instance: &Instance,
        real_device: &RealDevice,
        extensions: &[DeviceExtension],
    ) -> anyhow::Result<Self> {
        let families = real_device.queue_families();
        let queue_infos = queues::create_queue_infos(&families);
        let ext_names = extensions.iter().map(|e| e.name_ptr()).collect::<Vec<_>>();
        // Only default features: tests rely on e.g. wide lines being off.
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&ext_names)
            .enabled_features(&features);
        debug!(
            "Creating device on {:?} with extensions {:?}",
            real_device.name(),
            extensions
        );

        let device = unsafe {
            instance
                .get_vk()
                .create_device(real_device.get_vk(), &create_info, None)
                .with_context(|| format!("Failed to create device on {}", real_device.name()))?
        };
        info_success!("Logical device created with {} queue families", families.len());

        Ok(Self {
            device,
            families,
            extensions: extensions.to_vec(),
        })
    }

    pub fn get_vk(&self) -> &Device {
        &self.device
    }

    pub fn queue_families(&self) -> &[QueueFamily] {
        &self.families
    }

    pub fn has_extension(&self, extension: DeviceExtension) -> bool {
        self.extensions.contains(&extension)
    }

    pub fn destroy(&self) {
        debug!("Destroying logical device.");
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

impl DeviceDispatch for LogicalDevice {
    fn device_wait_idle(&self) -> VkResult<()> {
        trace!("Calling device_wait_idle");
        unsafe { self.device.device_wait_idle() }
    }

    fn get_device_queue(&self, family_index: u32, queue_index: u32) -> vk::Queue {
        trace!(
            "Calling get_device_queue for family {} index {}",
            family_index, queue_index
        );
        unsafe { self.device.get_device_queue(family_index, queue_index) }
    }

    fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> VkResult<()> {
        trace!("Calling queue_submit on {:?} with info: {:?}", queue, submits);
        unsafe { self.device.queue_submit(queue, submits, fence) }
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        trace!("Calling queue_wait_idle on {:?}", queue);
        unsafe { self.device.queue_wait_idle(queue) }
    }

    fn create_pipeline_cache(
        &self,
        info: &vk::PipelineCacheCreateInfo,
    ) -> VkResult<vk::PipelineCache> {
        trace!("Calling create_pipeline_cache with info: {:?}", info);
        unsafe { self.device.create_pipeline_cache(info, None) }
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        trace!("Calling destroy_pipeline_cache for {:?}", cache);
        unsafe { self.device.destroy_pipeline_cache(cache, None) }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VkResult<vk::DescriptorSetLayout> {
        trace!("Calling create_descriptor_set_layout with info: {:?}", info);
        unsafe { self.device.create_descriptor_set_layout(info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        trace!("Calling destroy_descriptor_set_layout for {:?}", layout);
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo,
    ) -> VkResult<vk::DescriptorPool> {
        trace!("Calling create_descriptor_pool with info: {:?}", info);
        unsafe { self.device.create_descriptor_pool(info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        trace!("Calling destroy_descriptor_pool for {:?}", pool);
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        trace!("Calling allocate_descriptor_sets with info: {:?}", info);
        unsafe { self.device.allocate_descriptor_sets(info) }
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        trace!("Calling update_descriptor_sets with writes: {:?}", writes);
        unsafe {
            self.device
                .update_descriptor_sets(writes, &[] as &[vk::CopyDescriptorSet])
        }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout> {
        trace!("Calling create_pipeline_layout with info: {:?}", info);
        unsafe { self.device.create_pipeline_layout(info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        trace!("Calling destroy_pipeline_layout for {:?}", layout);
        unsafe { self.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo,
    ) -> VkResult<vk::ShaderModule> {
        trace!("Calling create_shader_module with {} bytes", info.code_size);
        unsafe { self.device.create_shader_module(info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        trace!("Calling destroy_shader_module for {:?}", module);
        unsafe { self.device.destroy_shader_module(module, None) }
    }

    fn create_graphics_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::GraphicsPipelineCreateInfo],
    ) -> VkSuccessResult<Vec<vk::Pipeline>> {
        trace!("Calling create_graphics_pipelines with info: {:?}", infos);
        unsafe { self.device.create_graphics_pipelines(cache, infos, None) }
    }

    fn create_compute_pipelines(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::ComputePipelineCreateInfo],
    ) -> VkSuccessResult<Vec<vk::Pipeline>> {
        trace!("Calling create_compute_pipelines with info: {:?}", infos);
        unsafe { self.device.create_compute_pipelines(cache, infos, None) }
    }

    fn create_ray_tracing_pipelines_nv(
        &self,
        cache: vk::PipelineCache,
        infos: &[vk::RayTracingPipelineCreateInfoNV],
    ) -> VkSuccessResult<Vec<vk::Pipeline>> {
        trace!("Calling create_ray_tracing_pipelines_nv with info: {:?}", infos);
        unsafe { self.device.create_ray_tracing_pipelines_nv(cache, infos, None) }
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        trace!("Calling destroy_pipeline for {:?}", pipeline);
        unsafe { self.device.destroy_pipeline(pipeline, None) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        trace!("Calling create_render_pass with info: {:?}", info);
        unsafe { self.device.create_render_pass(info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        trace!("Calling destroy_render_pass for {:?}", render_pass);
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo,
    ) -> VkResult<vk::CommandPool> {
        trace!("Calling create_command_pool with info: {:?}", info);
        unsafe { self.device.create_command_pool(info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        trace!("Calling destroy_command_pool for {:?}", pool);
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn reset_command_pool(
        &self,
        pool: vk::CommandPool,
        flags: vk::CommandPoolResetFlags,
    ) -> VkResult<()> {
        trace!("Calling reset_command_pool for {:?}", pool);
        unsafe { self.device.reset_command_pool(pool, flags) }
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        trace!("Calling allocate_command_buffers with info: {:?}", info);
        unsafe { self.device.allocate_command_buffers(info) }
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()> {
        trace!(
            "Calling begin_command_buffer for {:?} with info: {:?}",
            command_buffer, info
        );
        unsafe { self.device.begin_command_buffer(command_buffer, info) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        trace!("Calling end_command_buffer for {:?}", command_buffer);
        unsafe { self.device.end_command_buffer(command_buffer) }
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier],
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        trace!(
            "Calling cmd_pipeline_barrier on {:?}: buffers {:?}, images {:?}",
            command_buffer, buffer_barriers, image_barriers
        );
        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                &[] as &[vk::MemoryBarrier],
                buffer_barriers,
                image_barriers,
            )
        }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        trace!("Calling create_buffer with info: {:?}", info);
        unsafe { self.device.create_buffer(info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        trace!("Calling destroy_buffer for {:?}", buffer);
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    fn get_buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        trace!("Calling bind_buffer_memory for {:?} to {:?}", buffer, memory);
        unsafe { self.device.bind_buffer_memory(buffer, memory, offset) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VkResult<vk::Image> {
        trace!("Calling create_image with info: {:?}", info);
        unsafe { self.device.create_image(info, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        trace!("Calling destroy_image for {:?}", image);
        unsafe { self.device.destroy_image(image, None) }
    }

    fn get_image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        trace!("Calling bind_image_memory for {:?} to {:?}", image, memory);
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory> {
        trace!("Calling allocate_memory with info: {:?}", info);
        unsafe { self.device.allocate_memory(info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        trace!("Calling free_memory for {:?}", memory);
        unsafe { self.device.free_memory(memory, None) }
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler> {
        trace!("Calling create_sampler with info: {:?}", info);
        unsafe { self.device.create_sampler(info, None) }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        trace!("Calling destroy_sampler for {:?}", sampler);
        unsafe { self.device.destroy_sampler(sampler, None) }
    }
}
