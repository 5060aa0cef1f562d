use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::pipeline::shaders::{
    ShaderObject, BINDSTATE_FRAG_SHADER, BINDSTATE_VERT_SHADER,
};
use log::debug;

/// The default vertex and fragment pair every graphics helper starts from.
pub struct ShaderStage<'a> {
    pub vs: ShaderObject<'a>,
    pub fs: ShaderObject<'a>,
}

impl<'a> ShaderStage<'a> {
    pub fn new(device: &'a dyn DeviceDispatch) -> anyhow::Result<Self> {
        let vs = ShaderObject::new(
            device,
            BINDSTATE_VERT_SHADER,
            vulkanalia::vk::ShaderStageFlags::VERTEX,
        )?;
        let fs = ShaderObject::new(
            device,
            BINDSTATE_FRAG_SHADER,
            vulkanalia::vk::ShaderStageFlags::FRAGMENT,
        )?;
        debug!(
            "Created default shader stages: vs {:?}, fs {:?}",
            vs.get_vk(),
            fs.get_vk()
        );
        Ok(Self { vs, fs })
    }

    pub fn stage_infos(&self) -> Vec<vulkanalia::vk::PipelineShaderStageCreateInfo> {
        vec![self.vs.stage_info(), self.fs.stage_info()]
    }
}
