//! An in-process device for the unit tests.
//!
//! Handles are sequential integers and every non-dispatchable one is tracked until it is
//! destroyed. A few validation rules are reported through [`debug_report_callback`], the same
//! entry point the layer calls, so the monitor sees what it would see in a layer run.

use crate::gapi::vulkan::core::debug::debug_report_callback;
use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::core::queues::QueueFamily;
use crate::gapi::vulkan::enums::extensions::DeviceExtension;
use crate::gapi::vulkan::render_pass::RenderPass;
pub use crate::validation::cases::{
    BUFFER_FAMILY_VUID, BUFFER_SIZE_VUID, IMAGE_FAMILY_VUID, WIDE_LINES_VUID,
};
use crate::validation::framework::RenderFramework;
use crate::validation::monitor::ErrorMonitor;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::{c_void, CString};
use std::fmt::Debug;
use std::slice;
use std::sync::Arc;
use vulkanalia::vk;
use vulkanalia::vk::Handle;
use vulkanalia::{VkResult, VkSuccessResult};

pub const COMPUTE_STAGE_VUID: &str = "VUID-VkComputePipelineCreateInfo-stage-00701";
pub const RAY_TRACING_GROUPS_VUID: &str =
    "VUID-VkRayTracingPipelineCreateInfoNV-groupCount-arraylength";
pub const GRAPHICS_LAYOUT_VUID: &str = "VUID-VkGraphicsPipelineCreateInfo-layout-parameter";
pub const COMPUTE_LAYOUT_VUID: &str = "VUID-VkComputePipelineCreateInfo-layout-parameter";

const FAKE_REQUIREMENTS: vk::MemoryRequirements = vk::MemoryRequirements {
    size: 1024,
    alignment: 256,
    memory_type_bits: 1,
};

/// One `VkWriteDescriptorSet` as the device saw it, payload pointers dereferenced.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedWrite {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub buffer_info: Option<vk::DescriptorBufferInfo>,
    pub texel_buffer_view: Option<vk::BufferView>,
    pub image_info: Option<vk::DescriptorImageInfo>,
}

#[derive(Default)]
struct Counters {
    next_handle: u64,
    live: HashMap<&'static str, HashSet<u64>>,
    submissions: usize,
    /// Per `vkQueueSubmit` call, the command buffer count of each `VkSubmitInfo`.
    batches: Vec<Vec<usize>>,
    queue_waits: usize,
    failing_queue: bool,
    recorded_barriers: usize,
    descriptor_writes: Vec<RecordedWrite>,
}

pub struct FakeDevice {
    monitor: Arc<ErrorMonitor>,
    family_count: u32,
    state: RefCell<Counters>,
}

impl FakeDevice {
    fn new(monitor: Arc<ErrorMonitor>, family_count: u32) -> Self {
        Self {
            monitor,
            family_count,
            state: RefCell::new(Counters::default()),
        }
    }

    fn next_raw(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        state.next_handle
    }

    fn create<H: Handle<Repr = u64>>(&self, kind: &'static str) -> H {
        let raw = self.next_raw();
        self.state
            .borrow_mut()
            .live
            .entry(kind)
            .or_default()
            .insert(raw);
        H::from_raw(raw)
    }

    fn untracked<H: Handle<Repr = u64>>(&self) -> H {
        H::from_raw(self.next_raw())
    }

    fn dispatchable<H: Handle<Repr = usize>>(&self) -> H {
        H::from_raw(self.next_raw() as usize)
    }

    fn destroy<H: Handle<Repr = u64> + Debug>(&self, kind: &'static str, handle: H) {
        if handle.is_null() {
            return;
        }
        let removed = self
            .state
            .borrow_mut()
            .live
            .get_mut(kind)
            .is_some_and(|live| live.remove(&handle.as_raw()));
        assert!(removed, "{kind} {handle:?} destroyed twice or never created");
    }

    fn live(&self, kind: &'static str) -> usize {
        self.state.borrow().live.get(kind).map_or(0, HashSet::len)
    }

    pub fn live_buffers(&self) -> usize {
        self.live("buffer")
    }


    pub fn live_pipelines(&self) -> usize {
        self.live("pipeline")
    }

    pub fn live_shader_modules(&self) -> usize {
        self.live("shader_module")
    }

    /// `VkSubmitInfo`s handed to any queue so far.
    pub fn submissions(&self) -> usize {
        self.state.borrow().submissions
    }

    pub fn submit_batches(&self) -> Vec<Vec<usize>> {
        self.state.borrow().batches.clone()
    }

    pub fn queue_waits(&self) -> usize {
        self.state.borrow().queue_waits
    }

    /// From now on submits fail with `ERROR_OUT_OF_HOST_MEMORY` and waits with
    /// `ERROR_DEVICE_LOST`.
    pub fn fail_queue_operations(&self) {
        self.state.borrow_mut().failing_queue = true;
    }

    pub fn descriptor_writes(&self) -> Vec<RecordedWrite> {
        self.state.borrow().descriptor_writes.clone()
    }

    /// `vkCmdPipelineBarrier` calls recorded so far.
    pub fn recorded_barriers(&self) -> usize {
        self.state.borrow().recorded_barriers
    }

    fn emit(&self, vuid: &str, detail: &str) {
        let Ok(message) = CString::new(format!("Validation Error: [ {vuid} ] | {detail}")) else {
            return;
        };
        debug_report_callback(
            vk::DebugReportFlagsEXT::ERROR,
            vk::DebugReportObjectTypeEXT::UNKNOWN,
            0,
            0,
            0,
            c"Validation".as_ptr(),
            message.as_ptr(),
            Arc::as_ptr(&self.monitor) as *mut c_void,
        );
    }

    fn family_out_of_range(&self, family: u32) -> bool {
        !matches!(
            family,
            vk::QUEUE_FAMILY_IGNORED | vk::QUEUE_FAMILY_EXTERNAL | vk::QUEUE_FAMILY_FOREIGN_EXT
        ) && family >= self.family_count
    }

    fn check_graphics(&self, info: &vk::GraphicsPipelineCreateInfo) {
        if info.layout.is_null() {
            self.emit(GRAPHICS_LAYOUT_VUID, "layout is VK_NULL_HANDLE");
        }
        if info.rasterization_state.is_null() {
            return;
        }
        let rasterization = unsafe { &*info.rasterization_state };
        let dynamic_states = if info.dynamic_state.is_null() {
            &[][..]
        } else {
            let dynamic = unsafe { &*info.dynamic_state };
            if dynamic.dynamic_states.is_null() {
                &[][..]
            } else {
                unsafe {
                    slice::from_raw_parts(
                        dynamic.dynamic_states,
                        dynamic.dynamic_state_count as usize,
                    )
                }
            }
        };
        if rasterization.line_width != 1.0
            && !dynamic_states.contains(&vk::DynamicState::LINE_WIDTH)
        {
            self.emit(
                WIDE_LINES_VUID,
                &format!(
                    "lineWidth is {} but the wideLines feature is not enabled",
                    rasterization.line_width
                ),
            );
        }
    }

    fn pipelines(&self, count: usize) -> VkSuccessResult<Vec<vk::Pipeline>> {
        let pipelines = (0..count).map(|_| self.create("pipeline")).collect();
        Ok((pipelines, vk::SuccessCode::SUCCESS))
    }
}

impl DeviceDispatch for FakeDevice {
    fn device_wait_idle(&self) -> VkResult<()> {
        Ok(())
    }

    fn get_device_queue(&self, family_index: u32, _queue_index: u32) -> vk::Queue {
        vk::Queue::from_raw(0x1000 + family_index as usize)
    }

    fn queue_submit(
        &self,
        _queue: vk::Queue,
        submits: &[vk::SubmitInfo],
        _fence: vk::Fence,
    ) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if state.failing_queue {
            return Err(vk::ErrorCode::OUT_OF_HOST_MEMORY);
        }
        state.submissions += submits.len();
        state.batches.push(
            submits
                .iter()
                .map(|submit| submit.command_buffer_count as usize)
                .collect(),
        );
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        state.queue_waits += 1;
        if state.failing_queue {
            return Err(vk::ErrorCode::DEVICE_LOST);
        }
        Ok(())
    }

    fn create_pipeline_cache(
        &self,
        _info: &vk::PipelineCacheCreateInfo,
    ) -> VkResult<vk::PipelineCache> {
        Ok(self.create("pipeline_cache"))
    }

    fn destroy_pipeline_cache(&self, cache: vk::PipelineCache) {
        self.destroy("pipeline_cache", cache);
    }

    fn create_descriptor_set_layout(
        &self,
        _info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VkResult<vk::DescriptorSetLayout> {
        Ok(self.create("descriptor_set_layout"))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroy("descriptor_set_layout", layout);
    }

    fn create_descriptor_pool(
        &self,
        _info: &vk::DescriptorPoolCreateInfo,
    ) -> VkResult<vk::DescriptorPool> {
        Ok(self.create("descriptor_pool"))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy("descriptor_pool", pool);
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        Ok((0..info.descriptor_set_count)
            .map(|_| self.untracked())
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        let recorded = writes.iter().map(|write| unsafe {
            RecordedWrite {
                binding: write.dst_binding,
                descriptor_type: write.descriptor_type,
                buffer_info: write.buffer_info.as_ref().copied(),
                texel_buffer_view: write.texel_buffer_view.as_ref().copied(),
                image_info: write.image_info.as_ref().copied(),
            }
        });
        self.state.borrow_mut().descriptor_writes.extend(recorded);
    }

    fn create_pipeline_layout(
        &self,
        _info: &vk::PipelineLayoutCreateInfo,
    ) -> VkResult<vk::PipelineLayout> {
        Ok(self.create("pipeline_layout"))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy("pipeline_layout", layout);
    }

    fn create_shader_module(
        &self,
        _info: &vk::ShaderModuleCreateInfo,
    ) -> VkResult<vk::ShaderModule> {
        Ok(self.create("shader_module"))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy("shader_module", module);
    }

    fn create_graphics_pipelines(
        &self,
        _cache: vk::PipelineCache,
        infos: &[vk::GraphicsPipelineCreateInfo],
    ) -> VkSuccessResult<Vec<vk::Pipeline>> {
        for info in infos {
            self.check_graphics(info);
        }
        self.pipelines(infos.len())
    }

    fn create_compute_pipelines(
        &self,
        _cache: vk::PipelineCache,
        infos: &[vk::ComputePipelineCreateInfo],
    ) -> VkSuccessResult<Vec<vk::Pipeline>> {
        for info in infos {
            if info.layout.is_null() {
                self.emit(COMPUTE_LAYOUT_VUID, "layout is VK_NULL_HANDLE");
            }
            if info.stage.stage != vk::ShaderStageFlags::COMPUTE {
                self.emit(
                    COMPUTE_STAGE_VUID,
                    &format!("stage is {:?}, not VK_SHADER_STAGE_COMPUTE_BIT", info.stage.stage),
                );
            }
        }
        self.pipelines(infos.len())
    }

    fn create_ray_tracing_pipelines_nv(
        &self,
        _cache: vk::PipelineCache,
        infos: &[vk::RayTracingPipelineCreateInfoNV],
    ) -> VkSuccessResult<Vec<vk::Pipeline>> {
        for info in infos {
            if info.group_count == 0 {
                self.emit(RAY_TRACING_GROUPS_VUID, "groupCount must be greater than 0");
            }
        }
        self.pipelines(infos.len())
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy("pipeline", pipeline);
    }

    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo) -> VkResult<vk::RenderPass> {
        Ok(self.create("render_pass"))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroy("render_pass", render_pass);
    }

    fn create_command_pool(
        &self,
        _info: &vk::CommandPoolCreateInfo,
    ) -> VkResult<vk::CommandPool> {
        Ok(self.create("command_pool"))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroy("command_pool", pool);
    }

    fn reset_command_pool(
        &self,
        _pool: vk::CommandPool,
        _flags: vk::CommandPoolResetFlags,
    ) -> VkResult<()> {
        Ok(())
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        Ok((0..info.command_buffer_count)
            .map(|_| self.dispatchable())
            .collect())
    }

    fn begin_command_buffer(
        &self,
        _command_buffer: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo,
    ) -> VkResult<()> {
        Ok(())
    }

    fn end_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        _command_buffer: vk::CommandBuffer,
        _src_stage_mask: vk::PipelineStageFlags,
        _dst_stage_mask: vk::PipelineStageFlags,
        _dependency_flags: vk::DependencyFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier],
        image_barriers: &[vk::ImageMemoryBarrier],
    ) {
        self.state.borrow_mut().recorded_barriers += 1;
        for barrier in buffer_barriers {
            let (src, dst) = (barrier.src_queue_family_index, barrier.dst_queue_family_index);
            if self.family_out_of_range(src) || self.family_out_of_range(dst) {
                self.emit(
                    BUFFER_FAMILY_VUID,
                    &format!("buffer barrier families {src} -> {dst} are not valid"),
                );
            }
        }
        for barrier in image_barriers {
            let (src, dst) = (barrier.src_queue_family_index, barrier.dst_queue_family_index);
            if self.family_out_of_range(src) || self.family_out_of_range(dst) {
                self.emit(
                    IMAGE_FAMILY_VUID,
                    &format!("image barrier families {src} -> {dst} are not valid"),
                );
            }
        }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VkResult<vk::Buffer> {
        if info.size == 0 {
            self.emit(BUFFER_SIZE_VUID, "size must be greater than 0");
        }
        Ok(self.create("buffer"))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.destroy("buffer", buffer);
    }

    fn get_buffer_memory_requirements(&self, _buffer: vk::Buffer) -> vk::MemoryRequirements {
        FAKE_REQUIREMENTS
    }

    fn bind_buffer_memory(
        &self,
        _buffer: vk::Buffer,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        Ok(())
    }

    fn create_image(&self, _info: &vk::ImageCreateInfo) -> VkResult<vk::Image> {
        Ok(self.create("image"))
    }

    fn destroy_image(&self, image: vk::Image) {
        self.destroy("image", image);
    }

    fn get_image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        FAKE_REQUIREMENTS
    }

    fn bind_image_memory(
        &self,
        _image: vk::Image,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        Ok(())
    }

    fn allocate_memory(&self, _info: &vk::MemoryAllocateInfo) -> VkResult<vk::DeviceMemory> {
        Ok(self.create("memory"))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.destroy("memory", memory);
    }

    fn create_sampler(&self, _info: &vk::SamplerCreateInfo) -> VkResult<vk::Sampler> {
        Ok(self.create("sampler"))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.destroy("sampler", sampler);
    }
}

/// A [`RenderFramework`] over [`FakeDevice`] with `family_count` identical queue families
/// and one memory type.
pub struct FakeFramework {
    pub device: FakeDevice,
    monitor: Arc<ErrorMonitor>,
    families: Vec<QueueFamily>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    extensions: HashSet<DeviceExtension>,
    render_pass: RenderPass,
}

impl FakeFramework {
    pub fn new() -> Self {
        Self::with_families(1)
    }

    pub fn with_families(family_count: u32) -> Self {
        let monitor = Arc::new(ErrorMonitor::new());
        let device = FakeDevice::new(Arc::clone(&monitor), family_count);
        let properties = vec![
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::COMPUTE
                    | vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            };
            family_count as usize
        ];
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 1,
            memory_heap_count: 1,
            ..Default::default()
        };
        memory_properties.memory_types[0].property_flags =
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE;
        memory_properties.memory_heaps[0].size = 1 << 30;
        let render_pass = RenderPass::new(&device, RenderPass::DEFAULT_FORMAT).unwrap();
        Self {
            device,
            monitor,
            families: QueueFamily::from_properties(&properties),
            memory_properties,
            extensions: HashSet::new(),
            render_pass,
        }
    }

    pub fn enable_extension(&mut self, extension: DeviceExtension) {
        self.extensions.insert(extension);
    }
}

impl RenderFramework for FakeFramework {
    fn monitor(&self) -> &ErrorMonitor {
        &self.monitor
    }

    fn device(&self) -> &dyn DeviceDispatch {
        &self.device
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.get_vk()
    }

    fn subpass_color_attachments(&self) -> u32 {
        self.render_pass.subpass_color_attachments()
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn device_extension_enabled(&self, extension: DeviceExtension) -> bool {
        self.extensions.contains(&extension)
    }

    fn queue_families(&self) -> &[QueueFamily] {
        &self.families
    }
}

impl Drop for FakeFramework {
    fn drop(&mut self) {
        self.render_pass.destroy(&self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroyed_handles_stop_being_live() {
        let framework = FakeFramework::new();
        let device = framework.device();
        let buffer = device.create_buffer(&vk::BufferCreateInfo::default()).unwrap();
        assert_eq!(framework.device.live_buffers(), 1);
        device.destroy_buffer(buffer);
        device.destroy_buffer(vk::Buffer::null());
        assert_eq!(framework.device.live_buffers(), 0);
    }

    #[test]
    #[should_panic(expected = "destroyed twice")]
    fn double_destroy_panics() {
        let framework = FakeFramework::new();
        let device = framework.device();
        let image = device.create_image(&vk::ImageCreateInfo::default()).unwrap();
        device.destroy_image(image);
        device.destroy_image(image);
    }

    #[test]
    fn special_families_are_never_out_of_range() {
        let framework = FakeFramework::with_families(2);
        assert!(!framework.device.family_out_of_range(vk::QUEUE_FAMILY_IGNORED));
        assert!(!framework.device.family_out_of_range(vk::QUEUE_FAMILY_EXTERNAL));
        assert!(!framework.device.family_out_of_range(1));
        assert!(framework.device.family_out_of_range(2));
    }

    #[test]
    fn emitted_messages_reach_the_monitor() {
        let framework = FakeFramework::new();
        framework
            .monitor()
            .set_desired_failure_msg(vk::DebugReportFlagsEXT::ERROR, BUFFER_SIZE_VUID);
        let buffer = framework
            .device()
            .create_buffer(&vk::BufferCreateInfo::default())
            .unwrap();
        framework.device().destroy_buffer(buffer);
        framework.monitor().verify_found().unwrap();
    }
}
