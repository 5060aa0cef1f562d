use crate::gapi::vulkan::enums::extensions::DeviceExtension;
use crate::gapi::vulkan::errors::status_of;
use crate::gapi::vulkan::pipeline::descriptor_set::OneOffDescriptorSet;
use crate::gapi::vulkan::pipeline::graphics::{
    destroy_pipeline_objects, init_layout_and_cache, ptr_or_null,
};
use crate::gapi::vulkan::pipeline::oneshot::PipelineHelper;
use crate::gapi::vulkan::pipeline::shaders::{
    ShaderObject, CLOSEST_HIT_SHADER, MISS_SHADER, RAYGEN_SHADER,
};
use crate::validation::framework::RenderFramework;
use anyhow::Context;
use log::debug;
use std::slice;
use vulkanalia::vk;
use vulkanalia::vk::{Handle, HasBuilder};

/// `VK_SHADER_UNUSED_NV`.
pub const SHADER_UNUSED: u32 = !0;

#[derive(Default)]
pub struct RayTracingPipelineState {
    pub dsl_bindings: Vec<vk::DescriptorSetLayoutBinding>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub pipeline_layout_ci: vk::PipelineLayoutCreateInfo,
    pub shader_stages: Vec<vk::PipelineShaderStageCreateInfo>,
    pub groups: Vec<vk::RayTracingShaderGroupCreateInfoNV>,
    pub pc_ci: vk::PipelineCacheCreateInfo,
    pub rp_ci: vk::RayTracingPipelineCreateInfoNV,
}

/// `VK_NV_ray_tracing` pipeline with a raygen, closest-hit and miss shader.
pub struct RayTracingPipelineHelper<'a> {
    test: &'a dyn RenderFramework,
    pub state: Box<RayTracingPipelineState>,
    pub descriptor_set: Option<OneOffDescriptorSet<'a>>,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline_cache: vk::PipelineCache,
    pub pipeline: vk::Pipeline,
    pub rgs: Option<ShaderObject<'a>>,
    pub chs: Option<ShaderObject<'a>>,
    pub mis: Option<ShaderObject<'a>>,
}

impl<'a> RayTracingPipelineHelper<'a> {
    pub fn new(test: &'a dyn RenderFramework) -> Self {
        Self {
            test,
            state: Box::default(),
            descriptor_set: None,
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline_cache: vk::PipelineCache::null(),
            pipeline: vk::Pipeline::null(),
            rgs: None,
            chs: None,
            mis: None,
        }
    }

    /// Device extensions the helper needs; tests skip when any is missing.
    pub fn required_device_extensions() -> &'static [DeviceExtension] {
        &[
            DeviceExtension::KhrGetMemoryRequirements2,
            DeviceExtension::NvRayTracing,
        ]
    }

    pub fn supported(test: &dyn RenderFramework) -> bool {
        Self::required_device_extensions()
            .iter()
            .all(|e| test.device_extension_enabled(*e))
    }

    /// Raygen at 0, a triangles hit group around the closest-hit shader at 1, miss at 2.
    pub fn init_shader_groups(&mut self) {
        let group = |type_, general, closest_hit| {
            vk::RayTracingShaderGroupCreateInfoNV::builder()
                .type_(type_)
                .general_shader(general)
                .closest_hit_shader(closest_hit)
                .any_hit_shader(SHADER_UNUSED)
                .intersection_shader(SHADER_UNUSED)
                .build()
        };
        self.state.groups = vec![
            group(vk::RayTracingShaderGroupTypeKHR::GENERAL, 0, SHADER_UNUSED),
            group(vk::RayTracingShaderGroupTypeKHR::TRIANGLES_HIT_GROUP, SHADER_UNUSED, 1),
            group(vk::RayTracingShaderGroupTypeKHR::GENERAL, 2, SHADER_UNUSED),
        ];
    }

    pub fn init_descriptor_set_info(&mut self) {
        let binding = |n, ty| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(n)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::RAYGEN_KHR)
                .build()
        };
        self.state.dsl_bindings = vec![
            binding(0, vk::DescriptorType::STORAGE_IMAGE),
            binding(1, vk::DescriptorType::ACCELERATION_STRUCTURE_NV),
        ];
    }

    pub fn init_pipeline_layout_info(&mut self) {
        self.state.pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default();
        self.state.push_constant_ranges.clear();
    }

    pub fn init_shader_info(&mut self) -> anyhow::Result<()> {
        let device = self.test.device();
        let rgs = ShaderObject::new(device, RAYGEN_SHADER, vk::ShaderStageFlags::RAYGEN_KHR)
            .context("Failed to create the raygen shader")?;
        let chs = ShaderObject::new(device, CLOSEST_HIT_SHADER, vk::ShaderStageFlags::CLOSEST_HIT_KHR)
            .context("Failed to create the closest-hit shader")?;
        let mis = ShaderObject::new(device, MISS_SHADER, vk::ShaderStageFlags::MISS_KHR)
            .context("Failed to create the miss shader")?;
        self.state.shader_stages = vec![rgs.stage_info(), chs.stage_info(), mis.stage_info()];
        self.rgs = Some(rgs);
        self.chs = Some(chs);
        self.mis = Some(mis);
        Ok(())
    }

    pub fn init_nv_ray_tracing_pipeline_info(&mut self) {
        self.state.rp_ci = vk::RayTracingPipelineCreateInfoNV {
            max_recursion_depth: 0,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
            ..Default::default()
        };
    }

    pub fn init_pipeline_cache_info(&mut self) {
        self.state.pc_ci = vk::PipelineCacheCreateInfo::default();
    }

    pub fn late_bind_pipeline_info(&mut self) {
        let state = &mut *self.state;
        state.rp_ci.stage_count = state.shader_stages.len() as u32;
        state.rp_ci.stages = ptr_or_null(&state.shader_stages);
        state.rp_ci.group_count = state.groups.len() as u32;
        state.rp_ci.groups = ptr_or_null(&state.groups);
        state.rp_ci.layout = self.pipeline_layout;
    }

    pub fn create_nv_ray_tracing_pipeline(
        &mut self,
        implicit_destroy: bool,
        do_late_bind: bool,
    ) -> vk::Result {
        if implicit_destroy && !self.pipeline.is_null() {
            self.test.device().destroy_pipeline(self.pipeline);
            self.pipeline = vk::Pipeline::null();
        }
        if do_late_bind {
            self.late_bind_pipeline_info();
        }
        let result = self
            .test
            .device()
            .create_ray_tracing_pipelines_nv(self.pipeline_cache, slice::from_ref(&self.state.rp_ci));
        if let Ok((pipelines, _)) = &result {
            if let Some(pipeline) = pipelines.first() {
                self.pipeline = *pipeline;
            }
        }
        let status = status_of(&result);
        debug!("vkCreateRayTracingPipelinesNV returned {status:?}");
        status
    }
}

impl<'a> PipelineHelper<'a> for RayTracingPipelineHelper<'a> {
    fn new(test: &'a dyn RenderFramework) -> Self {
        RayTracingPipelineHelper::new(test)
    }

    fn init_info(&mut self) -> anyhow::Result<()> {
        self.init_shader_groups();
        self.init_descriptor_set_info();
        self.init_pipeline_layout_info();
        self.init_shader_info()?;
        self.init_nv_ray_tracing_pipeline_info();
        self.init_pipeline_cache_info();
        Ok(())
    }

    fn init_state(&mut self) -> anyhow::Result<()> {
        let (layout, cache) = init_layout_and_cache(
            self.test,
            &mut self.descriptor_set,
            &mut self.state.set_layouts,
            &self.state.dsl_bindings,
            &self.state.push_constant_ranges,
            &mut self.state.pipeline_layout_ci,
            &self.state.pc_ci,
        )?;
        self.pipeline_layout = layout;
        self.pipeline_cache = cache;
        Ok(())
    }

    fn create_pipeline(&mut self) -> vk::Result {
        self.create_nv_ray_tracing_pipeline(true, true)
    }

    fn test(&self) -> &'a dyn RenderFramework {
        self.test
    }
}

impl Drop for RayTracingPipelineHelper<'_> {
    fn drop(&mut self) {
        destroy_pipeline_objects(self.test, self.pipeline, self.pipeline_cache, self.pipeline_layout);
    }
}
