use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

/// Every created queue gets the same priority; the harness never competes for the GPU.
static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// The operations a queue family can run, as far as the tests care.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum QueueCapability {
    Graphics,
    Compute,
    Transfer,
}

impl QueueCapability {
    pub(crate) fn from_flags(flags: vk::QueueFlags) -> Vec<Self> {
        let mut capabilities = Vec::new();
        if flags.contains(vk::QueueFlags::GRAPHICS) {
            capabilities.push(Self::Graphics);
        }
        if flags.contains(vk::QueueFlags::COMPUTE) {
            capabilities.push(Self::Compute);
        }
        // Graphics and compute families can always transfer, even without the bit.
        if flags.intersects(vk::QueueFlags::TRANSFER | vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        {
            capabilities.push(Self::Transfer);
        }
        capabilities
    }
}

impl From<QueueCapability> for vk::QueueFlags {
    fn from(cap: QueueCapability) -> Self {
        match cap {
            QueueCapability::Graphics => vk::QueueFlags::GRAPHICS,
            QueueCapability::Compute => vk::QueueFlags::COMPUTE,
            QueueCapability::Transfer => vk::QueueFlags::TRANSFER,
        }
    }
}

/// One queue family of the physical device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueFamily {
    pub family_index: u32,
    /// Queues the family exposes; the harness only ever creates the first.
    pub count: u32,
    pub capabilities: Vec<QueueCapability>,
}

impl QueueFamily {
    pub fn from_properties(properties: &[vk::QueueFamilyProperties]) -> Vec<Self> {
        properties
            .iter()
            .enumerate()
            .filter(|(_, family)| family.queue_count > 0)
            .map(|(family_index, family)| Self {
                family_index: family_index as u32,
                count: family.queue_count,
                capabilities: QueueCapability::from_flags(family.queue_flags),
            })
            .collect()
    }

    pub fn supports(&self, capability: QueueCapability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// First family that supports `capability`.
pub fn find_family(families: &[QueueFamily], capability: QueueCapability) -> Option<u32> {
    families
        .iter()
        .find(|family| family.supports(capability))
        .map(|family| family.family_index)
}

/// One [`vk::DeviceQueueCreateInfo`] per family, each asking for a single queue.
pub fn create_queue_infos(families: &[QueueFamily]) -> Vec<vk::DeviceQueueCreateInfo> {
    families
        .iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family.family_index)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}
