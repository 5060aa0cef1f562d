use crate::gapi::vulkan::errors::status_of;
use crate::gapi::vulkan::pipeline::descriptor_set::OneOffDescriptorSet;
use crate::gapi::vulkan::pipeline::graphics::{destroy_pipeline_objects, init_layout_and_cache};
use crate::gapi::vulkan::pipeline::oneshot::PipelineHelper;
use crate::gapi::vulkan::pipeline::shaders::{ShaderObject, BINDSTATE_MINIMAL_SHADER};
use crate::validation::framework::RenderFramework;
use anyhow::Context;
use log::debug;
use std::slice;
use vulkanalia::vk;
use vulkanalia::vk::{Handle, HasBuilder};

#[derive(Default)]
pub struct ComputePipelineState {
    pub dsl_bindings: Vec<vk::DescriptorSetLayoutBinding>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub pipeline_layout_ci: vk::PipelineLayoutCreateInfo,
    pub pc_ci: vk::PipelineCacheCreateInfo,
    pub cp_ci: vk::ComputePipelineCreateInfo,
}

/// Compute counterpart of
/// [`GraphicsPipelineHelper`](crate::gapi::vulkan::pipeline::graphics::GraphicsPipelineHelper),
/// without any fixed-function state.
pub struct ComputePipelineHelper<'a> {
    test: &'a dyn RenderFramework,
    pub state: Box<ComputePipelineState>,
    pub descriptor_set: Option<OneOffDescriptorSet<'a>>,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline_cache: vk::PipelineCache,
    pub pipeline: vk::Pipeline,
    pub cs: Option<ShaderObject<'a>>,
}

impl<'a> ComputePipelineHelper<'a> {
    pub fn new(test: &'a dyn RenderFramework) -> Self {
        Self {
            test,
            state: Box::default(),
            descriptor_set: None,
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline_cache: vk::PipelineCache::null(),
            pipeline: vk::Pipeline::null(),
            cs: None,
        }
    }

    pub fn init_descriptor_set_info(&mut self) {
        self.state.dsl_bindings = vec![
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::ALL)
                .build(),
        ];
    }

    pub fn init_pipeline_layout_info(&mut self) {
        self.state.pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default();
        self.state.push_constant_ranges.clear();
    }

    pub fn init_shader_info(&mut self) -> anyhow::Result<()> {
        let cs = ShaderObject::new(
            self.test.device(),
            BINDSTATE_MINIMAL_SHADER,
            vk::ShaderStageFlags::COMPUTE,
        )
        .context("Failed to create the default compute shader")?;
        self.state.cp_ci.stage = cs.stage_info();
        self.cs = Some(cs);
        Ok(())
    }

    pub fn init_compute_pipeline_info(&mut self) {
        let stage = self.state.cp_ci.stage;
        self.state.cp_ci = vk::ComputePipelineCreateInfo {
            flags: vk::PipelineCreateFlags::DISABLE_OPTIMIZATION,
            stage,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
            ..Default::default()
        };
    }

    pub fn init_pipeline_cache_info(&mut self) {
        self.state.pc_ci = vk::PipelineCacheCreateInfo::default();
    }

    pub fn late_bind_pipeline_info(&mut self) {
        self.state.cp_ci.layout = self.pipeline_layout;
    }

    pub fn create_compute_pipeline(&mut self, implicit_destroy: bool, do_late_bind: bool) -> vk::Result {
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
            .create_compute_pipelines(self.pipeline_cache, slice::from_ref(&self.state.cp_ci));
        if let Ok((pipelines, _)) = &result {
            if let Some(pipeline) = pipelines.first() {
                self.pipeline = *pipeline;
            }
        }
        let status = status_of(&result);
        debug!("vkCreateComputePipelines returned {status:?}");
        status
    }
}

impl<'a> PipelineHelper<'a> for ComputePipelineHelper<'a> {
    fn new(test: &'a dyn RenderFramework) -> Self {
        ComputePipelineHelper::new(test)
    }

    fn init_info(&mut self) -> anyhow::Result<()> {
        self.init_descriptor_set_info();
        self.init_pipeline_layout_info();
        self.init_shader_info()?;
        self.init_compute_pipeline_info();
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
        self.create_compute_pipeline(true, true)
    }

    fn test(&self) -> &'a dyn RenderFramework {
        self.test
    }
}

impl Drop for ComputePipelineHelper<'_> {
    fn drop(&mut self) {
        destroy_pipeline_objects(self.test, self.pipeline, self.pipeline_cache, self.pipeline_layout);
    }
}
