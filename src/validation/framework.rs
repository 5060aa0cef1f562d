//! The device side of a test: what pipeline helpers and the barrier harness need from the
//! fixture, and the real fixture that owns an instance with the validation layer loaded.

use crate::gapi::vulkan::config::HarnessConfig;
use crate::gapi::vulkan::core::debug::Messenger;
use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::core::entry::Entry;
use crate::gapi::vulkan::core::instance::Instance;
use crate::gapi::vulkan::core::logical_device::LogicalDevice;
use crate::gapi::vulkan::core::queues::QueueFamily;
use crate::gapi::vulkan::core::real_device::RealDevice;
use crate::gapi::vulkan::enums::extensions::DeviceExtension;
use crate::gapi::vulkan::pipeline::ray_tracing::RayTracingPipelineHelper;
use crate::gapi::vulkan::render_pass::RenderPass;
use crate::info_success;
use crate::validation::monitor::{ErrorMonitor, VerdictError};
use anyhow::Context;
use log::{debug, info, warn};
use std::sync::Arc;
use vulkanalia::vk;

/// Everything a test needs from the device it runs on.
pub trait RenderFramework {
    fn monitor(&self) -> &ErrorMonitor;
    fn device(&self) -> &dyn DeviceDispatch;
    fn render_pass(&self) -> vk::RenderPass;
    /// Color attachments of subpass 0 of [`Self::render_pass`].
    fn subpass_color_attachments(&self) -> u32;
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;
    fn device_extension_enabled(&self, extension: DeviceExtension) -> bool;
    fn queue_families(&self) -> &[QueueFamily];
}

/// A device with the validation layer in its chain, reporting into one monitor.
///
/// Field order is teardown order in [`Drop`].
pub struct LayerTest {
    render_pass: RenderPass,
    device: LogicalDevice,
    real_device: RealDevice,
    messenger: Messenger,
    instance: Instance,
    _entry: Entry,
    monitor: Arc<ErrorMonitor>,
}

impl LayerTest {
    pub fn new(config: &HarnessConfig) -> anyhow::Result<Self> {
        debug!("Creating layer test fixture with config: {config:#?}");
        let monitor = Arc::new(ErrorMonitor::new());
        let entry = Entry::new().context("Failed to load the Vulkan loader")?;
        let instance = Instance::new(&entry, config.callback, Arc::as_ptr(&monitor))?;
        let messenger = Messenger::new(&instance, Arc::as_ptr(&monitor), config.callback)
            .context("Failed to register the debug callback")?;
        let real_device = RealDevice::pick(&instance, config.device_index)?;

        let mut extensions = Vec::new();
        if real_device.supports_extension(DeviceExtension::ExtLineRasterization) {
            extensions.push(DeviceExtension::ExtLineRasterization);
        }
        let ray_tracing = RayTracingPipelineHelper::required_device_extensions();
        if config.ray_tracing {
            if ray_tracing.iter().all(|e| real_device.supports_extension(*e)) {
                extensions.extend_from_slice(ray_tracing);
            } else {
                warn!("{} does not support NV ray tracing", real_device.name());
            }
        }

        let device = LogicalDevice::new(&instance, &real_device, &extensions)?;
        let render_pass = RenderPass::new(&device, RenderPass::DEFAULT_FORMAT)?;
        info_success!("Layer test fixture ready on {}", real_device.name());

        Ok(Self {
            render_pass,
            device,
            real_device,
            messenger,
            instance,
            _entry: entry,
            monitor,
        })
    }

    pub fn monitor_handle(&self) -> Arc<ErrorMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn real_device(&self) -> &RealDevice {
        &self.real_device
    }
}

impl RenderFramework for LayerTest {
    fn monitor(&self) -> &ErrorMonitor {
        &self.monitor
    }

    fn device(&self) -> &dyn DeviceDispatch {
        &self.device
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.get_vk()
    }

    fn subpass_color_attachments(&self) -> u32 {
        self.render_pass.subpass_color_attachments()
    }

    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        self.real_device.memory_properties()
    }

    fn device_extension_enabled(&self, extension: DeviceExtension) -> bool {
        self.device.has_extension(extension)
    }

    fn queue_families(&self) -> &[QueueFamily] {
        self.device.queue_families()
    }
}

impl Drop for LayerTest {
    fn drop(&mut self) {
        if let Err(err) = self.device.device_wait_idle() {
            warn!("vkDeviceWaitIdle failed during teardown: {err}");
        }
        self.render_pass.destroy(&self.device);
        self.device.destroy();
        self.messenger.destroy(&self.instance);
        self.instance.destroy();
        // Teardown messages land in a monitor nobody checks anymore.
        self.monitor.reset();
        info!("Layer test fixture torn down");
    }
}

/// Creates a buffer from `info`, expecting `expected` (or success when `None`), and destroys
/// it again if the driver handed one back.
pub fn create_buffer_test(
    test: &dyn RenderFramework,
    info: &vk::BufferCreateInfo,
    expected: Option<&str>,
) -> Result<(), VerdictError> {
    arm(test.monitor(), expected);
    if let Ok(buffer) = test.device().create_buffer(info) {
        test.device().destroy_buffer(buffer);
    }
    verdict(test.monitor(), expected)
}

pub fn create_image_test(
    test: &dyn RenderFramework,
    info: &vk::ImageCreateInfo,
    expected: Option<&str>,
) -> Result<(), VerdictError> {
    arm(test.monitor(), expected);
    if let Ok(image) = test.device().create_image(info) {
        test.device().destroy_image(image);
    }
    verdict(test.monitor(), expected)
}

pub fn create_sampler_test(
    test: &dyn RenderFramework,
    info: &vk::SamplerCreateInfo,
    expected: Option<&str>,
) -> Result<(), VerdictError> {
    arm(test.monitor(), expected);
    if let Ok(sampler) = test.device().create_sampler(info) {
        test.device().destroy_sampler(sampler);
    }
    verdict(test.monitor(), expected)
}

fn arm(monitor: &ErrorMonitor, expected: Option<&str>) {
    match expected {
        Some(msg) => monitor.set_desired_failure_msg(vk::DebugReportFlagsEXT::ERROR, msg),
        None => monitor.expect_success(vk::DebugReportFlagsEXT::ERROR),
    }
}

fn verdict(monitor: &ErrorMonitor, expected: Option<&str>) -> Result<(), VerdictError> {
    match expected {
        Some(_) => monitor.verify_found(),
        None => monitor.verify_not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::fake::FakeFramework;
    use vulkanalia::vk::HasBuilder;

    #[test]
    fn zero_sized_buffer_is_reported() {
        let framework = FakeFramework::new();
        let info = vk::BufferCreateInfo::builder()
            .size(0)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .build();
        create_buffer_test(&framework, &info, Some("VUID-VkBufferCreateInfo-size-00912")).unwrap();
        assert_eq!(framework.device.live_buffers(), 0);
    }

    #[test]
    fn valid_buffer_passes_as_positive_test() {
        let framework = FakeFramework::new();
        let info = vk::BufferCreateInfo::builder()
            .size(256)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .build();
        create_buffer_test(&framework, &info, None).unwrap();
        assert_eq!(framework.device.live_buffers(), 0);
    }

    #[test]
    fn positive_helper_reports_the_offending_message() {
        let framework = FakeFramework::new();
        let info = vk::BufferCreateInfo::builder()
            .size(0)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .build();
        let err = create_buffer_test(&framework, &info, None).unwrap_err();
        match err {
            VerdictError::PositiveViolation { matched, .. } => {
                assert!(matched[0].contains("00912"))
            }
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn images_and_samplers_round_trip_through_the_device() {
        let framework = FakeFramework::new();
        let image = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::_2D)
            .format(vk::Format::B8G8R8A8_UNORM)
            .extent(vk::Extent3D {
                width: 4,
                height: 4,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::_1)
            .usage(vk::ImageUsageFlags::SAMPLED)
            .build();
        create_image_test(&framework, &image, None).unwrap();
        let sampler = vk::SamplerCreateInfo::builder().build();
        create_sampler_test(&framework, &sampler, None).unwrap();
    }
}
