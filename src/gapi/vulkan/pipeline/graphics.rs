use crate::gapi::vulkan::enums::extensions::DeviceExtension;
use crate::gapi::vulkan::errors::status_of;
use crate::gapi::vulkan::pipeline::descriptor_set::OneOffDescriptorSet;
use crate::gapi::vulkan::pipeline::oneshot::PipelineHelper;
use crate::gapi::vulkan::pipeline::shaders::ShaderObject;
use crate::gapi::vulkan::pipeline::stages::color_blending_stage::ColorBlendingStage;
use crate::gapi::vulkan::pipeline::stages::input_assembler_stage::InputAssemblerStage;
use crate::gapi::vulkan::pipeline::stages::rasterization_stage::RasterizationStage;
use crate::gapi::vulkan::pipeline::stages::shader_stage::ShaderStage;
use crate::gapi::vulkan::pipeline::stages::viewport_stage::ViewportStage;
use crate::validation::framework::RenderFramework;
use anyhow::Context;
use log::{debug, trace};
use std::ptr;
use std::slice;
use vulkanalia::vk;
use vulkanalia::vk::{Handle, HasBuilder};

/// Every create-info record a graphics pipeline is assembled from.
///
/// Lives behind a `Box` in [`GraphicsPipelineHelper`], so the addresses late binding writes
/// into [`Self::gp_ci`] stay put even when the helper itself moves.
#[derive(Default)]
pub struct GraphicsPipelineState {
    pub dsl_bindings: Vec<vk::DescriptorSetLayoutBinding>,
    pub vi_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vi_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub vi_ci: vk::PipelineVertexInputStateCreateInfo,
    pub ia_ci: vk::PipelineInputAssemblyStateCreateInfo,
    pub tess_ci: Option<vk::PipelineTessellationStateCreateInfo>,
    pub viewports: Vec<vk::Viewport>,
    pub scissors: Vec<vk::Rect2D>,
    pub vp_state_ci: vk::PipelineViewportStateCreateInfo,
    pub rs_state_ci: vk::PipelineRasterizationStateCreateInfo,
    /// Chained behind `rs_state_ci` when set.
    pub line_state_ci: Option<vk::PipelineRasterizationLineStateCreateInfoEXT>,
    pub ms_ci: vk::PipelineMultisampleStateCreateInfo,
    pub ds_ci: Option<vk::PipelineDepthStencilStateCreateInfo>,
    pub cb_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    pub cb_ci: vk::PipelineColorBlendStateCreateInfo,
    pub dyn_states: Vec<vk::DynamicState>,
    pub dyn_state_ci: Option<vk::PipelineDynamicStateCreateInfo>,
    pub shader_stages: Vec<vk::PipelineShaderStageCreateInfo>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub pipeline_layout_ci: vk::PipelineLayoutCreateInfo,
    pub pc_ci: vk::PipelineCacheCreateInfo,
    pub gp_ci: vk::GraphicsPipelineCreateInfo,
}

/// Builds one graphics pipeline against the fixture's render pass.
///
/// Call [`init_info`](PipelineHelper::init_info), adjust `state`, call
/// [`init_state`](PipelineHelper::init_state), then
/// [`create_graphics_pipeline`](Self::create_graphics_pipeline).
pub struct GraphicsPipelineHelper<'a> {
    test: &'a dyn RenderFramework,
    pub state: Box<GraphicsPipelineState>,
    pub descriptor_set: Option<OneOffDescriptorSet<'a>>,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline_cache: vk::PipelineCache,
    pub pipeline: vk::Pipeline,
    pub vs: Option<ShaderObject<'a>>,
    pub fs: Option<ShaderObject<'a>>,
}

impl<'a> GraphicsPipelineHelper<'a> {
    pub fn new(test: &'a dyn RenderFramework) -> Self {
        Self {
            test,
            state: Box::default(),
            descriptor_set: None,
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline_cache: vk::PipelineCache::null(),
            pipeline: vk::Pipeline::null(),
            vs: None,
            fs: None,
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

    pub fn init_input_and_vertex_info(&mut self) {
        let stage = InputAssemblerStage::new();
        self.state.vi_ci = stage.build_vertex_input_state();
        self.state.ia_ci = stage.build_input_assembly_state();
    }

    pub fn init_multisample_info(&mut self) {
        self.state.ms_ci = RasterizationStage::new().get_multisample_state();
    }

    pub fn init_pipeline_layout_info(&mut self) {
        self.state.pipeline_layout_ci = vk::PipelineLayoutCreateInfo::default();
        self.state.push_constant_ranges.clear();
    }

    pub fn init_viewport_info(&mut self) {
        let stage = ViewportStage::default();
        self.state.viewports = vec![stage.viewport()];
        self.state.scissors = vec![stage.scissor()];
        self.state.vp_state_ci = stage.build_viewport_state();
    }

    /// No dynamic state unless a test asks for it.
    pub fn init_dynamic_state_info(&mut self) {
        self.state.dyn_states.clear();
        self.state.dyn_state_ci = None;
    }

    pub fn init_shader_info(&mut self) -> anyhow::Result<()> {
        let stage = ShaderStage::new(self.test.device())
            .context("Failed to create the default vertex and fragment shaders")?;
        self.state.shader_stages = stage.stage_infos();
        self.vs = Some(stage.vs);
        self.fs = Some(stage.fs);
        Ok(())
    }

    pub fn init_rasterization_info(&mut self) {
        self.state.rs_state_ci = RasterizationStage::new().get_rasterization_state();
    }

    /// Arms the line rasterization chain only when the device can take it.
    pub fn init_line_rasterization_info(&mut self) {
        self.state.line_state_ci = self
            .test
            .device_extension_enabled(DeviceExtension::ExtLineRasterization)
            .then(|| RasterizationStage::new().get_line_state());
    }

    pub fn init_blend_state_info(&mut self) {
        let stage = ColorBlendingStage::new(self.test.subpass_color_attachments());
        self.state.cb_attachments = stage.attachments().to_vec();
        self.state.cb_ci = stage.get_color_blend_state();
    }

    pub fn init_graphics_pipeline_info(&mut self) {
        self.state.gp_ci = vk::GraphicsPipelineCreateInfo {
            flags: vk::PipelineCreateFlags::DISABLE_OPTIMIZATION,
            render_pass: self.test.render_pass(),
            subpass: 0,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
            ..Default::default()
        };
    }

    pub fn init_pipeline_cache_info(&mut self) {
        self.state.pc_ci = vk::PipelineCacheCreateInfo::default();
    }

    /// Installs a patch-list tessellation state. Not part of [`PipelineHelper::init_info`].
    pub fn init_tessellation_state(&mut self, patch_control_points: u32) {
        self.state.ia_ci.topology = vk::PrimitiveTopology::PATCH_LIST;
        self.state.tess_ci = Some(
            vk::PipelineTessellationStateCreateInfo::builder()
                .patch_control_points(patch_control_points)
                .build(),
        );
    }

    /// Stores every pointer into `self.state` in the top-level create info.
    pub fn late_bind_pipeline_info(&mut self) {
        let state = &mut *self.state;

        state.vi_ci.vertex_binding_description_count = state.vi_bindings.len() as u32;
        state.vi_ci.vertex_binding_descriptions = ptr_or_null(&state.vi_bindings);
        state.vi_ci.vertex_attribute_description_count = state.vi_attributes.len() as u32;
        state.vi_ci.vertex_attribute_descriptions = ptr_or_null(&state.vi_attributes);

        // Counts stay as set, so a test can mismatch them on purpose.
        state.vp_state_ci.viewports = ptr_or_null(&state.viewports);
        state.vp_state_ci.scissors = ptr_or_null(&state.scissors);

        state.cb_ci.attachments = ptr_or_null(&state.cb_attachments);

        state.rs_state_ci.next = match &state.line_state_ci {
            Some(line) => line as *const _ as *const std::ffi::c_void,
            None => ptr::null(),
        };

        if let Some(dyn_state_ci) = &mut state.dyn_state_ci {
            dyn_state_ci.dynamic_state_count = state.dyn_states.len() as u32;
            dyn_state_ci.dynamic_states = ptr_or_null(&state.dyn_states);
        }

        let gp_ci = &mut state.gp_ci;
        gp_ci.stage_count = state.shader_stages.len() as u32;
        gp_ci.stages = ptr_or_null(&state.shader_stages);
        gp_ci.vertex_input_state = &state.vi_ci;
        gp_ci.input_assembly_state = &state.ia_ci;
        gp_ci.tessellation_state = state.tess_ci.as_ref().map_or(ptr::null(), |t| t as *const _);
        gp_ci.viewport_state = &state.vp_state_ci;
        gp_ci.rasterization_state = &state.rs_state_ci;
        gp_ci.multisample_state = &state.ms_ci;
        gp_ci.depth_stencil_state = state.ds_ci.as_ref().map_or(ptr::null(), |d| d as *const _);
        gp_ci.color_blend_state = &state.cb_ci;
        gp_ci.dynamic_state = state.dyn_state_ci.as_ref().map_or(ptr::null(), |d| d as *const _);
        gp_ci.layout = self.pipeline_layout;
        trace!("Late-bound graphics pipeline info: {:?}", gp_ci);
    }

    /// Asks the driver for the pipeline and returns its status unchanged.
    pub fn create_graphics_pipeline(&mut self, implicit_destroy: bool, do_late_bind: bool) -> vk::Result {
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
            .create_graphics_pipelines(self.pipeline_cache, slice::from_ref(&self.state.gp_ci));
        if let Ok((pipelines, _)) = &result {
            if let Some(pipeline) = pipelines.first() {
                self.pipeline = *pipeline;
            }
        }
        let status = status_of(&result);
        debug!("vkCreateGraphicsPipelines returned {status:?}");
        status
    }
}

impl<'a> PipelineHelper<'a> for GraphicsPipelineHelper<'a> {
    fn new(test: &'a dyn RenderFramework) -> Self {
        GraphicsPipelineHelper::new(test)
    }

    fn init_info(&mut self) -> anyhow::Result<()> {
        self.init_descriptor_set_info();
        self.init_input_and_vertex_info();
        self.init_multisample_info();
        self.init_pipeline_layout_info();
        self.init_viewport_info();
        self.init_dynamic_state_info();
        self.init_shader_info()?;
        self.init_rasterization_info();
        self.init_line_rasterization_info();
        self.init_blend_state_info();
        self.init_graphics_pipeline_info();
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
        self.create_graphics_pipeline(true, true)
    }

    fn test(&self) -> &'a dyn RenderFramework {
        self.test
    }
}

impl Drop for GraphicsPipelineHelper<'_> {
    fn drop(&mut self) {
        destroy_pipeline_objects(self.test, self.pipeline, self.pipeline_cache, self.pipeline_layout);
    }
}

pub(crate) fn ptr_or_null<T>(items: &[T]) -> *const T {
    if items.is_empty() {
        ptr::null()
    } else {
        items.as_ptr()
    }
}

/// Shared `init_state` body: the one-off descriptor set, a layout over it plus any push
/// constants, and an empty pipeline cache.
pub(crate) fn init_layout_and_cache<'a>(
    test: &'a dyn RenderFramework,
    descriptor_set: &mut Option<OneOffDescriptorSet<'a>>,
    set_layouts: &mut Vec<vk::DescriptorSetLayout>,
    bindings: &[vk::DescriptorSetLayoutBinding],
    push_constant_ranges: &[vk::PushConstantRange],
    layout_ci: &mut vk::PipelineLayoutCreateInfo,
    cache_ci: &vk::PipelineCacheCreateInfo,
) -> anyhow::Result<(vk::PipelineLayout, vk::PipelineCache)> {
    let device = test.device();
    let set = OneOffDescriptorSet::new(device, bindings, vk::DescriptorSetLayoutCreateFlags::empty());
    *set_layouts = vec![set.layout];
    *descriptor_set = Some(set);

    layout_ci.set_layout_count = set_layouts.len() as u32;
    layout_ci.set_layouts = ptr_or_null(set_layouts.as_slice());
    layout_ci.push_constant_range_count = push_constant_ranges.len() as u32;
    layout_ci.push_constant_ranges = ptr_or_null(push_constant_ranges);
    debug!("Creating pipeline layout: {layout_ci:#?}");
    let layout = device
        .create_pipeline_layout(layout_ci)
        .context("Failed to create pipeline layout")?;

    let cache = match device.create_pipeline_cache(cache_ci) {
        Ok(cache) => cache,
        Err(err) => {
            device.destroy_pipeline_layout(layout);
            return Err(err).context("Failed to create pipeline cache");
        }
    };
    Ok((layout, cache))
}

pub(crate) fn destroy_pipeline_objects(
    test: &dyn RenderFramework,
    pipeline: vk::Pipeline,
    cache: vk::PipelineCache,
    layout: vk::PipelineLayout,
) {
    let device = test.device();
    if !pipeline.is_null() {
        device.destroy_pipeline(pipeline);
    }
    if !cache.is_null() {
        device.destroy_pipeline_cache(cache);
    }
    if !layout.is_null() {
        device.destroy_pipeline_layout(layout);
    }
}
