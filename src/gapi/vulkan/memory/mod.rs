pub mod buffer;
pub mod image;

use crate::gapi::vulkan::errors::HarnessError;
use vulkanalia::vk;

/// Index of the first memory type allowed by `type_bits` that has all of `flags`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32, HarnessError> {
    (0..properties.memory_type_count)
        .find(|&i| {
            type_bits & (1 << i) != 0
                && properties.memory_types[i as usize]
                    .property_flags
                    .contains(flags)
        })
        .ok_or(HarnessError::NoMemoryType { type_bits, flags })
}

/// Prefers device-local memory and falls back to any allowed type.
pub fn pick_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
) -> Result<u32, HarnessError> {
    find_memory_type(properties, type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .or_else(|_| find_memory_type(properties, type_bits, vk::MemoryPropertyFlags::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (i, flags) in types.iter().enumerate() {
            props.memory_types[i].property_flags = *flags;
        }
        props
    }

    #[test]
    fn honours_type_bits_and_flags() {
        let props = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        assert_eq!(pick_memory_type(&props, 0b111).unwrap(), 1);
        assert_eq!(pick_memory_type(&props, 0b001).unwrap(), 0);
        assert_eq!(
            find_memory_type(&props, 0b110, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap(),
            2
        );
        assert!(matches!(
            find_memory_type(&props, 0b001, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Err(HarnessError::NoMemoryType { type_bits: 1, .. })
        ));
    }
}
