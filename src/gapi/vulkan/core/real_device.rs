use crate::gapi::vulkan::core::instance::Instance;
use crate::gapi::vulkan::core::queues::QueueFamily;
use crate::gapi::vulkan::enums::extensions::DeviceExtension;
use anyhow::{anyhow, Context};
use log::{debug, info};
use std::collections::HashSet;
use vulkanalia::vk;
use vulkanalia::vk::InstanceV1_0;

/// A physical device and everything the harness queries from it up front.
#[derive(Clone, Debug)]
pub struct RealDevice {
    vk_real_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    queue_families: Vec<vk::QueueFamilyProperties>,
    extensions: HashSet<DeviceExtension>,
}

impl RealDevice {
    /// Picks the `index`-th physical device reported by the instance.
    pub fn pick(instance: &Instance, index: usize) -> anyhow::Result<Self> {
        let devices = unsafe { instance.get_vk().enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;
        debug!("Found {} physical device(s)", devices.len());
        let vk_real_device = *devices.get(index).ok_or_else(|| {
            anyhow!(
                "Physical device {} requested but only {} present",
                index,
                devices.len()
            )
        })?;

        let vk_instance = instance.get_vk();
        let properties = unsafe { vk_instance.get_physical_device_properties(vk_real_device) };
        let memory_properties =
            unsafe { vk_instance.get_physical_device_memory_properties(vk_real_device) };
        let queue_families =
            unsafe { vk_instance.get_physical_device_queue_family_properties(vk_real_device) };
        let extensions = unsafe {
            vk_instance.enumerate_device_extension_properties(vk_real_device, None)
        }
        .with_context(|| format!("Failed to enumerate extensions of {:?}", vk_real_device))?
        .iter()
        .filter_map(|e| DeviceExtension::try_from_name(&e.extension_name))
        .collect();

        let device = Self {
            vk_real_device,
            properties,
            memory_properties,
            queue_families,
            extensions,
        };
        info!("Using physical device {}", device.name());
        Ok(device)
    }

    pub fn get_vk(&self) -> vk::PhysicalDevice {
        self.vk_real_device
    }

    pub fn name(&self) -> String {
        self.properties.device_name.to_string()
    }

    pub fn get_properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    pub fn queue_families(&self) -> Vec<QueueFamily> {
        QueueFamily::from_properties(&self.queue_families)
    }

    pub fn supports_extension(&self, extension: DeviceExtension) -> bool {
        self.extensions.contains(&extension)
    }
}
