use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

#[derive(Debug)]
struct ColorBlendAttConfig {
    color_write_mask: vk::ColorComponentFlags,
    blend_enable: bool,
    src_color_blend_factor: vk::BlendFactor,
    dst_color_blend_factor: vk::BlendFactor,
    color_blend_op: vk::BlendOp,
    src_alpha_blend_factor: vk::BlendFactor,
    dst_alpha_blend_factor: vk::BlendFactor,
    alpha_blend_op: vk::BlendOp,
}

#[derive(Debug)]
struct ColorBlendStateConfig {
    logic_op_enable: bool,
    logic_op: vk::LogicOp,
    attachment_count: u32,
    blend_constants: [f32; 4],
}

/// Blending switched off, writing every channel, one attachment state per color attachment
/// of the subpass.
pub struct ColorBlendingStage {
    attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    color_blend_state: vk::PipelineColorBlendStateCreateInfo,
}

impl ColorBlendingStage {
    pub fn new(attachment_count: u32) -> Self {
        let color_blend_config = ColorBlendAttConfig {
            color_write_mask: vk::ColorComponentFlags::all(),
            blend_enable: false,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
        };
        debug!("Creating color_blend with config: {:#?}", color_blend_config);
        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(color_blend_config.color_write_mask)
            .blend_enable(color_blend_config.blend_enable)
            .src_color_blend_factor(color_blend_config.src_color_blend_factor)
            .dst_color_blend_factor(color_blend_config.dst_color_blend_factor)
            .color_blend_op(color_blend_config.color_blend_op)
            .src_alpha_blend_factor(color_blend_config.src_alpha_blend_factor)
            .dst_alpha_blend_factor(color_blend_config.dst_alpha_blend_factor)
            .alpha_blend_op(color_blend_config.alpha_blend_op)
            .build();

        let color_blend_state_config = ColorBlendStateConfig {
            logic_op_enable: false,
            logic_op: vk::LogicOp::COPY,
            attachment_count,
            blend_constants: [1.0, 1.0, 1.0, 1.0],
        };
        debug!("Creating color_blend_state with config: {:#?}", color_blend_state_config);
        // The attachment pointer is wired up at late bind.
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo {
            logic_op_enable: color_blend_state_config.logic_op_enable as vk::Bool32,
            logic_op: color_blend_state_config.logic_op,
            attachment_count: color_blend_state_config.attachment_count,
            blend_constants: color_blend_state_config.blend_constants,
            ..Default::default()
        };

        Self {
            attachments: vec![attachment; attachment_count as usize],
            color_blend_state,
        }
    }

    pub fn attachments(&self) -> &[vk::PipelineColorBlendAttachmentState] {
        &self.attachments
    }

    pub fn get_color_blend_state(&self) -> vk::PipelineColorBlendStateCreateInfo {
        self.color_blend_state
    }
}
