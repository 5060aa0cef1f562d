use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::gapi::vulkan::memory::pick_memory_type;
use anyhow::Context;
use log::debug;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

/// A single-mip, single-layer 2D image with its own allocation bound.
#[derive(Debug)]
pub struct BoundImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
}

impl BoundImage {
    pub fn new(
        device: &dyn DeviceDispatch,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> anyhow::Result<Self> {
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .build();
        debug!("Created ImageCreateInfo struct: {info:#?}");
        let image = device
            .create_image(&info)
            .with_context(|| format!("Failed to create {format:?} image"))?;

        let requirements = device.get_image_memory_requirements(image);
        let memory = pick_memory_type(memory_properties, requirements.memory_type_bits)
            .map_err(anyhow::Error::from)
            .and_then(|memory_type_index| {
                let alloc = vk::MemoryAllocateInfo::builder()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index);
                device
                    .allocate_memory(&alloc)
                    .context("Failed to allocate image memory")
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(err) => {
                device.destroy_image(image);
                return Err(err);
            }
        };
        if let Err(err) = device.bind_image_memory(image, memory, 0) {
            device.destroy_image(image);
            device.free_memory(memory);
            return Err(err).context("Failed to bind image memory");
        }

        Ok(Self {
            image,
            memory,
            format,
        })
    }

    pub fn get_vk(&self) -> vk::Image {
        self.image
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// The whole color aspect of the image.
    pub fn color_range() -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::builder()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
            .build()
    }

    pub fn destroy(&self, device: &dyn DeviceDispatch) {
        device.destroy_image(self.image);
        device.free_memory(self.memory);
    }
}
