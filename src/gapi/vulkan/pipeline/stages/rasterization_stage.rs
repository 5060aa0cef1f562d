use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

#[derive(Debug)]
struct RasterizationStageConfig {
    rasterizer_discard_enable: bool,
    depth_clamp_enable: bool,
    polygon_mode: vk::PolygonMode,
    line_width: f32,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    depth_bias_enable: bool,
}

#[derive(Debug)]
struct MultisampleStageConfig {
    sample_shading_enable: bool,
    rasterization_samples: vk::SampleCountFlags,
    min_sample_shading: f32,
}

#[derive(Debug)]
struct LineStateConfig {
    stippled_line_enable: bool,
    line_stipple_factor: u32,
    line_stipple_pattern: u16,
}

/// Rasterization, multisample and `VK_EXT_line_rasterization` state.
pub struct RasterizationStage {
    rasterization_state: vk::PipelineRasterizationStateCreateInfo,
    multisample_state: vk::PipelineMultisampleStateCreateInfo,
    line_state: vk::PipelineRasterizationLineStateCreateInfoEXT,
}

impl RasterizationStage {
    pub fn new() -> Self {
        let config = RasterizationStageConfig {
            rasterizer_discard_enable: false,
            depth_clamp_enable: false,
            polygon_mode: vk::PolygonMode::FILL,
            // Anything wider needs the wideLines feature.
            line_width: 1.0,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_bias_enable: false,
        };
        debug!("Creating pipeline rasterization state with config: {config:#?}");
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .rasterizer_discard_enable(config.rasterizer_discard_enable)
            .depth_clamp_enable(config.depth_clamp_enable)
            .polygon_mode(config.polygon_mode)
            .line_width(config.line_width)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(config.depth_bias_enable)
            .build();

        let config_multisample = MultisampleStageConfig {
            sample_shading_enable: false,
            rasterization_samples: vk::SampleCountFlags::_1,
            min_sample_shading: 1.0,
        };
        debug!("Creating pipeline multisample state with config: {config_multisample:#?}");
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(config_multisample.sample_shading_enable)
            .rasterization_samples(config_multisample.rasterization_samples)
            .min_sample_shading(config_multisample.min_sample_shading)
            .build();

        // Mode stays at DEFAULT (zero).
        let config_line = LineStateConfig {
            stippled_line_enable: false,
            line_stipple_factor: 0,
            line_stipple_pattern: 0,
        };
        let line_state = vk::PipelineRasterizationLineStateCreateInfoEXT::builder()
            .stippled_line_enable(config_line.stippled_line_enable)
            .line_stipple_factor(config_line.line_stipple_factor)
            .line_stipple_pattern(config_line.line_stipple_pattern)
            .build();

        Self {
            rasterization_state,
            multisample_state,
            line_state,
        }
    }

    pub fn get_rasterization_state(&self) -> vk::PipelineRasterizationStateCreateInfo {
        self.rasterization_state
    }

    pub fn get_multisample_state(&self) -> vk::PipelineMultisampleStateCreateInfo {
        self.multisample_state
    }

    pub fn get_line_state(&self) -> vk::PipelineRasterizationLineStateCreateInfoEXT {
        self.line_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterizer_defaults() {
        let stage = RasterizationStage::new();
        let rs = stage.get_rasterization_state();
        assert_eq!(rs.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(rs.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(rs.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(rs.line_width, 1.0);

        let ms = stage.get_multisample_state();
        assert_eq!(ms.rasterization_samples, vk::SampleCountFlags::_1);
        assert_eq!(ms.min_sample_shading, 1.0);

        assert_eq!(stage.get_line_state().stippled_line_enable, vk::FALSE);
    }
}
