use crate::gapi::vulkan::config::LOADER_DEBUG_ENABLED;
use crate::gapi::vulkan::enums::extensions::InstanceExtension;
use crate::gapi::vulkan::enums::layers::InstanceLayer;
use anyhow::{anyhow, Context};
use log::{debug, trace};
use std::collections::HashSet;
use vulkanalia::loader::{LibloadingLoader, LIBRARY};
use vulkanalia::vk::EntryV1_0;
use vulkanalia::{vk, Instance as VkInstance, VkResult};
use vulkanalia::Entry as VkEntry;

/// # Vulkan Entry
/// Finds the loader on the system and resolves the global commands
/// (`vkCreateInstance`, layer and extension enumeration).
///
/// Nothing device-specific is loaded yet at this point; the ICDs come in with the instance.
pub struct Entry {
    entry: VkEntry,
}

impl Entry {
    /// Loads the platform loader (`libvulkan.so.1`, `vulkan-1.dll`, ...).
    ///
    /// With the `loader_debug` feature the loader is asked to log its search first.
    pub fn new() -> anyhow::Result<Self> {
        if LOADER_DEBUG_ENABLED {
            // Set before anything else touches the environment.
            unsafe { std::env::set_var("VK_LOADER_DEBUG", "all") };
        }
        let loader = unsafe {
            LibloadingLoader::new(LIBRARY)
                .with_context(|| format!("Failed to load Vulkan library: {}", LIBRARY))?
        };
        let entry = unsafe {
            VkEntry::new(loader).map_err(|b| anyhow!("Failed to load Vulkan entry: {}", b))?
        };
        debug!("Vulkan loader found at {}", LIBRARY);
        Ok(Self { entry })
    }

    pub fn create_instance(&self, info: &vk::InstanceCreateInfo) -> VkResult<VkInstance> {
        trace!("Calling create_instance with info: {:?}", info);
        unsafe { self.entry.create_instance(info, None) }
    }

    pub fn available_layers(&self) -> anyhow::Result<HashSet<InstanceLayer>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties() }
            .context("Failed to enumerate instance layers")?
            .iter()
            .filter_map(|l| InstanceLayer::try_from_name(&l.layer_name))
            .collect();
        Ok(layers)
    }

    /// Extensions of the instance, or of `layer` when given.
    pub fn available_extensions(
        &self,
        layer: Option<InstanceLayer>,
    ) -> anyhow::Result<HashSet<InstanceExtension>> {
        let layer_name = layer.map(|l| l.name_buf().as_bytes());
        let extensions = unsafe { self.entry.enumerate_instance_extension_properties(layer_name) }
            .with_context(|| format!("Failed to enumerate extensions of {:?}", layer))?
            .iter()
            .filter_map(|e| InstanceExtension::try_from_name(&e.extension_name))
            .collect();
        Ok(extensions)
    }

    pub fn check_layers_are_available(&self, required: &[InstanceLayer]) -> anyhow::Result<()> {
        let available = self.available_layers()?;
        let missing: Vec<_> = required
            .iter()
            .filter(|layer| !available.contains(layer))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("The following layers are not available: {:?}", missing))
        }
    }

    /// Checks the extensions against the instance and every enabled layer.
    pub fn check_extensions_are_available(
        &self,
        required: &[InstanceExtension],
        layers: &[InstanceLayer],
    ) -> anyhow::Result<()> {
        let mut available = self.available_extensions(None)?;
        for layer in layers {
            available.extend(self.available_extensions(Some(*layer))?);
        }
        let missing: Vec<_> = required
            .iter()
            .inspect(|ext| trace!("Checking instance extension: {}", ext))
            .filter(|ext| !available.contains(ext))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "The following extensions are not available: {:?}",
                missing
            ))
        }
    }
}
