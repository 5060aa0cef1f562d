use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use anyhow::Context;
use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

#[derive(Debug)]
struct AttachmentDescriptionConfig {
    format: vk::Format,
    samples: vk::SampleCountFlags,
    load_op: vk::AttachmentLoadOp,
    store_op: vk::AttachmentStoreOp,
    stencil_load_op: vk::AttachmentLoadOp,
    stencil_store_op: vk::AttachmentStoreOp,
    initial_layout: vk::ImageLayout,
    final_layout: vk::ImageLayout,
}

#[derive(Debug)]
struct AttachmentReferenceConfig {
    attachment: u32,
    layout: vk::ImageLayout,
}

/// The render pass every graphics pipeline in a test is built against:
/// one color attachment drawn by a single graphics subpass.
#[derive(Debug)]
pub struct RenderPass {
    handle: vk::RenderPass,
    color_attachments: u32,
}

impl RenderPass {
    pub const DEFAULT_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

    pub fn new(device: &dyn DeviceDispatch, format: vk::Format) -> anyhow::Result<Self> {
        let col_att_config = AttachmentDescriptionConfig {
            format,
            samples: vk::SampleCountFlags::_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            // Never presented; tests only render offscreen.
            final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        debug!("Creating render pass with color attachment config: \n{col_att_config:#?}");
        let color_attachment = vk::AttachmentDescription::builder()
            .format(col_att_config.format)
            .samples(col_att_config.samples)
            .load_op(col_att_config.load_op)
            .store_op(col_att_config.store_op)
            .stencil_load_op(col_att_config.stencil_load_op)
            .stencil_store_op(col_att_config.stencil_store_op)
            .initial_layout(col_att_config.initial_layout)
            .final_layout(col_att_config.final_layout)
            .build();

        let col_att_ref_config = AttachmentReferenceConfig {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        debug!(
            "Creating render pass with color attachment reference config: \n{col_att_ref_config:#?}"
        );
        let color_attachment_refs = [vk::AttachmentReference::builder()
            .attachment(col_att_ref_config.attachment)
            .layout(col_att_ref_config.layout)
            .build()];

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)
            .build();

        let attachments = [color_attachment];
        let subpasses = [subpass];
        let info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .build();

        let handle = device
            .create_render_pass(&info)
            .with_context(|| format!("creating render pass with format {format:?}"))?;

        Ok(Self {
            handle,
            color_attachments: color_attachment_refs.len() as u32,
        })
    }

    pub fn get_vk(&self) -> vk::RenderPass {
        self.handle
    }

    /// Color attachments of subpass 0; blend state needs one attachment state per entry.
    pub fn subpass_color_attachments(&self) -> u32 {
        self.color_attachments
    }

    pub fn destroy(&self, device: &dyn DeviceDispatch) {
        device.destroy_render_pass(self.handle);
    }
}
