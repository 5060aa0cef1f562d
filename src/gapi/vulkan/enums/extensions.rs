use crate::vulkan_names;
use vulkanalia::vk;

vulkan_names! {
    /// Instance extensions the harness may turn on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum InstanceExtension {
        /// Messenger-based callback; carries labels and object names.
        ExtDebugUtils = vk::EXT_DEBUG_UTILS_EXTENSION.name,
        /// Flag-based callback predating debug utils.
        ExtDebugReport = vk::EXT_DEBUG_REPORT_EXTENSION.name,
    }
}

vulkan_names! {
    /// Device extensions needed by the optional pipeline builders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum DeviceExtension {
        NvRayTracing = vk::NV_RAY_TRACING_EXTENSION.name,
        KhrGetMemoryRequirements2 = vk::KHR_GET_MEMORY_REQUIREMENTS2_EXTENSION.name,
        ExtLineRasterization = vk::EXT_LINE_RASTERIZATION_EXTENSION.name,
    }
}
