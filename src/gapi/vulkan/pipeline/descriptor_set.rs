use crate::gapi::vulkan::core::dispatch::DeviceDispatch;
use crate::trace_success;
use log::{debug, warn};
use std::collections::BTreeMap;
use vulkanalia::vk;
use vulkanalia::vk::{Handle, HasBuilder};

#[derive(Clone, Copy, Debug)]
enum Payload {
    Buffer(usize),
    TexelView(usize),
    Image(usize),
}

#[derive(Clone, Copy, Debug)]
struct PendingWrite {
    binding: u32,
    array_element: u32,
    descriptor_type: vk::DescriptorType,
    payload: Payload,
}

/// A layout, a pool sized for it and the single set allocated from that pool.
///
/// Creation never fails outright: a layout or allocation the driver rejects leaves the
/// corresponding handle null, which is what negative descriptor tests want to observe.
/// [`initialized`](Self::initialized) tells the two cases apart.
pub struct OneOffDescriptorSet<'a> {
    device: &'a dyn DeviceDispatch,
    pool: vk::DescriptorPool,
    pub layout: vk::DescriptorSetLayout,
    pub set: vk::DescriptorSet,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    buffer_views: Vec<vk::BufferView>,
    image_infos: Vec<vk::DescriptorImageInfo>,
    pending: Vec<PendingWrite>,
}

impl<'a> OneOffDescriptorSet<'a> {
    pub fn new(
        device: &'a dyn DeviceDispatch,
        bindings: &[vk::DescriptorSetLayoutBinding],
        layout_flags: vk::DescriptorSetLayoutCreateFlags,
    ) -> Self {
        let mut this = Self {
            device,
            pool: vk::DescriptorPool::null(),
            layout: vk::DescriptorSetLayout::null(),
            set: vk::DescriptorSet::null(),
            bindings: bindings.to_vec(),
            buffer_infos: Vec::new(),
            buffer_views: Vec::new(),
            image_infos: Vec::new(),
            pending: Vec::new(),
        };

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .flags(layout_flags)
            .bindings(&this.bindings)
            .build();
        match device.create_descriptor_set_layout(&layout_info) {
            Ok(layout) => this.layout = layout,
            Err(err) => {
                warn!("Descriptor set layout creation failed: {err}");
                return this;
            }
        }

        let pool_sizes = pool_sizes(&this.bindings);
        debug!("Creating one-off descriptor pool with sizes: {pool_sizes:#?}");
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(1)
            .pool_sizes(&pool_sizes)
            .build();
        match device.create_descriptor_pool(&pool_info) {
            Ok(pool) => this.pool = pool,
            Err(err) => {
                warn!("Descriptor pool creation failed: {err}");
                return this;
            }
        }

        let layouts = [this.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(this.pool)
            .set_layouts(&layouts)
            .build();
        match device.allocate_descriptor_sets(&alloc_info) {
            Ok(sets) => {
                if let Some(set) = sets.first() {
                    this.set = *set;
                    trace_success!("Allocated one-off descriptor set {set:?}");
                }
            }
            Err(err) => warn!("Descriptor set allocation failed: {err}"),
        }
        this
    }

    pub fn initialized(&self) -> bool {
        !self.set.is_null()
    }

    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    pub fn write_descriptor_buffer_info(
        &mut self,
        binding: u32,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
        descriptor_type: vk::DescriptorType,
    ) {
        self.buffer_infos.push(
            vk::DescriptorBufferInfo::builder()
                .buffer(buffer)
                .offset(offset)
                .range(range)
                .build(),
        );
        self.push(binding, descriptor_type, Payload::Buffer(self.buffer_infos.len() - 1));
    }

    pub fn write_descriptor_buffer_view(
        &mut self,
        binding: u32,
        view: vk::BufferView,
        descriptor_type: vk::DescriptorType,
    ) {
        self.buffer_views.push(view);
        self.push(binding, descriptor_type, Payload::TexelView(self.buffer_views.len() - 1));
    }

    pub fn write_descriptor_image_info(
        &mut self,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
        descriptor_type: vk::DescriptorType,
    ) {
        self.image_infos.push(
            vk::DescriptorImageInfo::builder()
                .sampler(sampler)
                .image_view(image_view)
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .build(),
        );
        self.push(binding, descriptor_type, Payload::Image(self.image_infos.len() - 1));
    }

    fn push(&mut self, binding: u32, descriptor_type: vk::DescriptorType, payload: Payload) {
        self.pending.push(PendingWrite {
            binding,
            array_element: 0,
            descriptor_type,
            payload,
        });
    }

    /// Flushes every pending write in one `vkUpdateDescriptorSets` call.
    pub fn update_descriptor_sets(&mut self) {
        let writes = self
            .pending
            .iter()
            .map(|pending| {
                let mut write = vk::WriteDescriptorSet {
                    dst_set: self.set,
                    dst_binding: pending.binding,
                    dst_array_element: pending.array_element,
                    descriptor_count: 1,
                    descriptor_type: pending.descriptor_type,
                    ..Default::default()
                };
                match pending.payload {
                    Payload::Buffer(i) => write.buffer_info = &self.buffer_infos[i],
                    Payload::TexelView(i) => write.texel_buffer_view = &self.buffer_views[i],
                    Payload::Image(i) => write.image_info = &self.image_infos[i],
                }
                write
            })
            .collect::<Vec<_>>();
        debug!("Flushing {} descriptor writes", writes.len());
        self.device.update_descriptor_sets(&writes);
        self.pending.clear();
        self.buffer_infos.clear();
        self.buffer_views.clear();
        self.image_infos.clear();
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for OneOffDescriptorSet<'_> {
    fn drop(&mut self) {
        // Destroying the pool frees the set with it.
        if !self.pool.is_null() {
            self.device.destroy_descriptor_pool(self.pool);
        }
        if !self.layout.is_null() {
            self.device.destroy_descriptor_set_layout(self.layout);
        }
    }
}

/// One pool size per descriptor type, each at least 1 so an empty binding list still
/// yields a valid pool.
fn pool_sizes(bindings: &[vk::DescriptorSetLayoutBinding]) -> Vec<vk::DescriptorPoolSize> {
    let mut counts: BTreeMap<i32, u32> = BTreeMap::new();
    for binding in bindings {
        *counts.entry(binding.descriptor_type.as_raw()).or_default() += binding.descriptor_count;
    }
    if counts.is_empty() {
        counts.insert(vk::DescriptorType::UNIFORM_BUFFER.as_raw(), 1);
    }
    counts
        .into_iter()
        .map(|(ty, count)| {
            vk::DescriptorPoolSize::builder()
                .type_(vk::DescriptorType::from_raw(ty))
                .descriptor_count(count.max(1))
                .build()
        })
        .collect()
}
