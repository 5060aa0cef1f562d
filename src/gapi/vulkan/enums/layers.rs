use crate::vulkan_names;
use vulkanalia::vk;

vulkan_names! {
    /// Instance layers the harness knows how to enable.
    ///
    /// `Validation` is the layer under test; `ApiDump` only adds a call transcript
    /// next to the monitor output.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum InstanceLayer {
        Validation = vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation"),
        ApiDump = vk::ExtensionName::from_bytes(b"VK_LAYER_LUNARG_api_dump"),
    }
}
