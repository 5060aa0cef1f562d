use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

#[derive(Debug)]
struct ViewportConfig {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    min_depth: f32,
    max_depth: f32,
}

#[derive(Debug)]
struct ScissorConfig {
    offset_x: i32,
    offset_y: i32,
    extent_width: u32,
    extent_height: u32,
}

/// A single viewport and matching scissor over the fixed offscreen target.
#[derive(Debug)]
pub struct ViewportStage {
    viewport: vk::Viewport,
    scissor: vk::Rect2D,
}

impl ViewportStage {
    pub const DEFAULT_EXTENT: vk::Extent2D = vk::Extent2D {
        width: 64,
        height: 64,
    };

    pub fn new(extent: vk::Extent2D) -> Self {
        let viewport_config = ViewportConfig {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        debug!("Creating Viewport with configuration: \n{viewport_config:#?}");
        let viewport = vk::Viewport::builder()
            .x(viewport_config.x)
            .y(viewport_config.y)
            .width(viewport_config.width)
            .height(viewport_config.height)
            .min_depth(viewport_config.min_depth)
            .max_depth(viewport_config.max_depth)
            .build();

        let scissor_config = ScissorConfig {
            offset_x: 0,
            offset_y: 0,
            extent_width: extent.width,
            extent_height: extent.height,
        };
        debug!("Creating Scissor with configuration: \n{scissor_config:#?}");
        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D {
                x: scissor_config.offset_x,
                y: scissor_config.offset_y,
            })
            .extent(vk::Extent2D {
                width: scissor_config.extent_width,
                height: scissor_config.extent_height,
            })
            .build();

        Self { viewport, scissor }
    }

    pub fn viewport(&self) -> vk::Viewport {
        self.viewport
    }

    pub fn scissor(&self) -> vk::Rect2D {
        self.scissor
    }

    /// Counts only; the arrays are attached at late bind.
    pub fn build_viewport_state(&self) -> vk::PipelineViewportStateCreateInfo {
        vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        }
    }
}

impl Default for ViewportStage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXTENT)
    }
}
