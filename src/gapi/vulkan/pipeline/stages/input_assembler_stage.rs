use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

#[derive(Debug)]
struct InputAssemblyConfig {
    topology: vk::PrimitiveTopology,
    primitive_restart_enable: bool,
}

/// Vertex input and input assembly state. Tests draw nothing, so there are no bindings.
pub struct InputAssemblerStage {
    vertex_input_state: vk::PipelineVertexInputStateCreateInfo,
    input_assembly_state: vk::PipelineInputAssemblyStateCreateInfo,
}

impl InputAssemblerStage {
    pub const DEFAULT_TOPOLOGY: vk::PrimitiveTopology = vk::PrimitiveTopology::TRIANGLE_STRIP;

    pub fn new() -> Self {
        Self::with_topology(Self::DEFAULT_TOPOLOGY)
    }

    pub fn with_topology(topology: vk::PrimitiveTopology) -> Self {
        let config = InputAssemblyConfig {
            topology,
            primitive_restart_enable: false,
        };
        debug!("Creating input assembly state with config: {config:#?}");
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(config.primitive_restart_enable)
            .build();

        // Binding and attribute arrays live in the helper state.
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder().build();

        Self {
            vertex_input_state,
            input_assembly_state,
        }
    }

    pub fn build_vertex_input_state(&self) -> vk::PipelineVertexInputStateCreateInfo {
        self.vertex_input_state
    }

    pub fn build_input_assembly_state(&self) -> vk::PipelineInputAssemblyStateCreateInfo {
        self.input_assembly_state
    }
}
