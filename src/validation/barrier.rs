//! Queue family ownership transfer scenarios.
//!
//! A barrier pair (one image, one buffer) is recorded on a chosen family's command buffers,
//! optionally twice or across two buffers, submitted, and judged by the monitor.

use crate::gapi::vulkan::commands::command_buffers::CommandBuffer;
use crate::gapi::vulkan::commands::command_pool::CommandPool;
use crate::gapi::vulkan::errors::HarnessError;
use crate::gapi::vulkan::memory::buffer::BoundBuffer;
use crate::gapi::vulkan::memory::image::BoundImage;
use crate::validation::framework::RenderFramework;
use anyhow::{anyhow, Context};
use log::{debug, warn};
use std::collections::HashMap;
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

/// Passed as the submitting family to record without submitting.
pub const INVALID_QUEUE_FAMILY: u32 = u32::MAX;

const BARRIER_FLAGS: vk::DebugReportFlagsEXT = vk::DebugReportFlagsEXT::from_bits_truncate(
    vk::DebugReportFlagsEXT::ERROR.bits() | vk::DebugReportFlagsEXT::WARNING.bits(),
);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Modifier {
    #[default]
    None,
    /// Record the barrier twice into the same command buffer.
    DoubleRecord,
    /// Record once into each of the family's two command buffers and submit both.
    DoubleCommandBuffer,
}

/// Queue, pool and two primary command buffers of one family.
#[derive(Debug)]
pub struct QueueFamilyObjects {
    pub index: u32,
    pub queue: vk::Queue,
    pub command_pool: CommandPool,
    pub command_buffer: CommandBuffer,
    pub command_buffer2: CommandBuffer,
}

impl QueueFamilyObjects {
    fn new(test: &dyn RenderFramework, index: u32) -> anyhow::Result<Self> {
        let device = test.device();
        let queue = device.get_device_queue(index, 0);
        let command_pool =
            CommandPool::new(device, index, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)?;
        let buffers = command_pool.allocate(device, 2)?;
        let [command_buffer, command_buffer2] = buffers.as_slice() else {
            command_pool.destroy(device);
            return Err(anyhow!("Expected two command buffers for family {index}"));
        };
        Ok(Self {
            index,
            queue,
            command_buffer: *command_buffer,
            command_buffer2: *command_buffer2,
            command_pool,
        })
    }
}

/// Per-family objects for a set of families; the first family is the default.
pub struct BarrierQueueFamilyContext<'a> {
    test: &'a dyn RenderFramework,
    objects: Vec<QueueFamilyObjects>,
    index_map: HashMap<u32, usize>,
}

impl<'a> BarrierQueueFamilyContext<'a> {
    pub fn new(test: &'a dyn RenderFramework, families: &[u32]) -> anyhow::Result<Self> {
        let mut context = Self {
            test,
            objects: Vec::new(),
            index_map: HashMap::new(),
        };
        for &family in families {
            if context.index_map.contains_key(&family) {
                continue;
            }
            let objects = QueueFamilyObjects::new(test, family)
                .with_context(|| format!("Failed to set up queue family {family}"))?;
            context.index_map.insert(family, context.objects.len());
            context.objects.push(objects);
        }
        if context.objects.is_empty() {
            return Err(anyhow!("Barrier context needs at least one queue family"));
        }
        debug!("Barrier context over families {:?}", families);
        Ok(context)
    }

    pub fn test(&self) -> &'a dyn RenderFramework {
        self.test
    }

    /// The objects of `family`, or of the default family when it has none.
    pub fn queue_family_info(&self, family: u32) -> &QueueFamilyObjects {
        let index = self.index_map.get(&family).copied().unwrap_or(0);
        &self.objects[index]
    }

    /// Waits for the device and returns every command buffer to the initial state.
    pub fn reset(&self) {
        let device = self.test.device();
        if let Err(err) = device.device_wait_idle() {
            warn!("vkDeviceWaitIdle failed while resetting barrier context: {err}");
        }
        for objects in &self.objects {
            if let Err(err) = objects.command_pool.reset(device) {
                warn!("{err:#}");
            }
        }
    }
}

impl Drop for BarrierQueueFamilyContext<'_> {
    fn drop(&mut self) {
        let device = self.test.device();
        if let Err(err) = device.device_wait_idle() {
            warn!("vkDeviceWaitIdle failed while dropping barrier context: {err}");
        }
        for objects in &self.objects {
            objects.command_pool.destroy(device);
        }
    }
}

/// Drives one image barrier and one buffer barrier through [`Self::run`].
pub struct BarrierQueueFamilyTestHelper<'c, 'a> {
    context: &'c BarrierQueueFamilyContext<'a>,
    pub image_barrier: vk::ImageMemoryBarrier,
    pub buffer_barrier: vk::BufferMemoryBarrier,
    image: Option<BoundImage>,
    buffer: Option<BoundBuffer>,
}

impl<'c, 'a> BarrierQueueFamilyTestHelper<'c, 'a> {
    pub const IMAGE_EXTENT: vk::Extent2D = vk::Extent2D {
        width: 32,
        height: 32,
    };
    pub const BUFFER_SIZE: vk::DeviceSize = 256;

    /// A helper around caller-provided barrier templates.
    pub fn new(
        context: &'c BarrierQueueFamilyContext<'a>,
        image_barrier: vk::ImageMemoryBarrier,
        buffer_barrier: vk::BufferMemoryBarrier,
    ) -> Self {
        Self {
            context,
            image_barrier,
            buffer_barrier,
            image: None,
            buffer: None,
        }
    }

    /// A helper with its own image and buffer and TRANSFER_READ barriers over both.
    pub fn init(context: &'c BarrierQueueFamilyContext<'a>) -> anyhow::Result<Self> {
        let test = context.test();
        let device = test.device();
        let image = BoundImage::new(
            device,
            test.memory_properties(),
            Self::IMAGE_EXTENT,
            vk::Format::B8G8R8A8_UNORM,
            vk::ImageUsageFlags::TRANSFER_SRC,
        )?;
        let buffer = match BoundBuffer::new(
            device,
            test.memory_properties(),
            Self::BUFFER_SIZE,
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                image.destroy(device);
                return Err(err);
            }
        };

        let image_barrier = vk::ImageMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_READ)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.get_vk())
            .subresource_range(BoundImage::color_range())
            .build();
        let buffer_barrier = vk::BufferMemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_READ)
            .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer.get_vk())
            .offset(0)
            .size(vk::WHOLE_SIZE as u64)
            .build();

        Ok(Self {
            context,
            image_barrier,
            buffer_barrier,
            image: Some(image),
            buffer: Some(buffer),
        })
    }

    /// Records the barriers with `src`/`dst` substituted on `queue_family`'s command buffers,
    /// submits unless `queue_family` is [`INVALID_QUEUE_FAMILY`], and judges the monitor.
    ///
    /// Non-empty `img_err` / `buf_err` are expected at ERROR or WARNING severity. The context
    /// is reset whatever the outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        img_err: &str,
        buf_err: &str,
        src: u32,
        dst: u32,
        positive: bool,
        queue_family: u32,
        modifier: Modifier,
    ) -> anyhow::Result<()> {
        let monitor = self.context.test().monitor();
        if !img_err.is_empty() {
            monitor.set_desired_failure_msg(BARRIER_FLAGS, img_err);
        }
        if !buf_err.is_empty() {
            monitor.set_desired_failure_msg(BARRIER_FLAGS, buf_err);
        }

        self.image_barrier.src_queue_family_index = src;
        self.image_barrier.dst_queue_family_index = dst;
        self.buffer_barrier.src_queue_family_index = src;
        self.buffer_barrier.dst_queue_family_index = dst;

        let submitted = self.record_and_submit(positive, queue_family, modifier);
        let verdict = if positive {
            monitor.verify_not_found()
        } else {
            monitor.verify_found()
        };
        self.context.reset();
        submitted?;
        verdict?;
        Ok(())
    }

    fn record_and_submit(
        &self,
        positive: bool,
        queue_family: u32,
        modifier: Modifier,
    ) -> anyhow::Result<()> {
        let device = self.context.test().device();
        let family = self.context.queue_family_info(queue_family);
        let buffers: &[CommandBuffer] = match modifier {
            Modifier::DoubleCommandBuffer => &[family.command_buffer, family.command_buffer2],
            _ => std::slice::from_ref(&family.command_buffer),
        };
        let repeats = if modifier == Modifier::DoubleRecord { 2 } else { 1 };

        for command_buffer in buffers {
            command_buffer.record(device, |cb| {
                for _ in 0..repeats {
                    cb.pipeline_barrier(
                        device,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::BY_REGION,
                        Some(&self.buffer_barrier),
                        Some(&self.image_barrier),
                    );
                }
                Ok(())
            })?;
        }

        if queue_family == INVALID_QUEUE_FAMILY {
            return Ok(());
        }
        let submitted = CommandBuffer::submit_and_wait(device, family.queue, buffers)
            .map_err(HarnessError::driver("vkQueueSubmit"));
        match submitted {
            Err(err) if positive => Err(err.into()),
            Err(err) => {
                debug!("Submit failed in negative barrier test: {err}");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

impl Drop for BarrierQueueFamilyTestHelper<'_, '_> {
    fn drop(&mut self) {
        let device = self.context.test().device();
        if let Some(image) = &self.image {
            image.destroy(device);
        }
        if let Some(buffer) = &self.buffer {
            buffer.destroy(device);
        }
    }
}

/// Records one half of an ownership transfer on `family`'s first command buffer, submits it
/// and requires silence from the layer.
pub fn valid_ownership_transfer_op(
    test: &dyn RenderFramework,
    family: &QueueFamilyObjects,
    src_stages: vk::PipelineStageFlags,
    dst_stages: vk::PipelineStageFlags,
    buffer_barrier: Option<&vk::BufferMemoryBarrier>,
    image_barrier: Option<&vk::ImageMemoryBarrier>,
) -> anyhow::Result<()> {
    let device = test.device();
    let monitor = test.monitor();
    monitor.expect_success(vk::DebugReportFlagsEXT::ERROR);
    let submitted = family
        .command_buffer
        .record(device, |cb| {
            cb.pipeline_barrier(
                device,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                buffer_barrier,
                image_barrier,
            );
            Ok(())
        })
        .and_then(|()| {
            family
                .command_buffer
                .queue_and_wait(device, family.queue)
                .map_err(HarnessError::driver("vkQueueSubmit"))
                .map_err(anyhow::Error::from)
        });
    let verdict = monitor.verify_not_found();
    submitted?;
    verdict?;
    Ok(())
}

/// A release on `from` followed by the matching acquire on `to`, both expected to be clean.
pub fn valid_ownership_transfer(
    test: &dyn RenderFramework,
    from: &QueueFamilyObjects,
    to: &QueueFamilyObjects,
    src_stages: vk::PipelineStageFlags,
    dst_stages: vk::PipelineStageFlags,
    buffer_barrier: Option<&vk::BufferMemoryBarrier>,
    image_barrier: Option<&vk::ImageMemoryBarrier>,
) -> anyhow::Result<()> {
    valid_ownership_transfer_op(
        test,
        from,
        src_stages,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        buffer_barrier,
        image_barrier,
    )?;
    valid_ownership_transfer_op(
        test,
        to,
        vk::PipelineStageFlags::TOP_OF_PIPE,
        dst_stages,
        buffer_barrier,
        image_barrier,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::fake::{FakeFramework, BUFFER_FAMILY_VUID, IMAGE_FAMILY_VUID};
    use crate::validation::monitor::VerdictError;

    fn two_family_framework() -> FakeFramework {
        FakeFramework::with_families(2)
    }

    #[test]
    fn ignored_families_are_a_clean_barrier() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[0, 1]).unwrap();
        let mut helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        helper
            .run(
                "",
                "",
                vk::QUEUE_FAMILY_IGNORED,
                vk::QUEUE_FAMILY_IGNORED,
                true,
                0,
                Modifier::None,
            )
            .unwrap();
        assert_eq!(framework.device.submissions(), 1);
    }

    #[test]
    fn out_of_range_family_is_reported_on_both_barriers() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[0]).unwrap();
        let mut helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        helper
            .run(
                IMAGE_FAMILY_VUID,
                BUFFER_FAMILY_VUID,
                0,
                7,
                false,
                0,
                Modifier::None,
            )
            .unwrap();
        // Nothing left over for the next scenario.
        assert!(framework.monitor().desired_failure_msgs().is_empty());
        assert!(framework.monitor().other_failure_msgs().is_empty());
    }

    #[test]
    fn double_record_doubles_the_messages() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[0]).unwrap();
        let mut helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        let err = helper
            .run(IMAGE_FAMILY_VUID, "", 0, 7, false, 0, Modifier::DoubleRecord)
            .unwrap_err();
        let verdict = err.downcast_ref::<VerdictError>().unwrap();
        match verdict {
            VerdictError::Unexpected { unexpected } => assert_eq!(unexpected.len(), 3),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[test]
    fn double_command_buffer_submits_both() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[0, 1]).unwrap();
        let mut helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        helper
            .run(
                "",
                "",
                vk::QUEUE_FAMILY_IGNORED,
                vk::QUEUE_FAMILY_IGNORED,
                true,
                1,
                Modifier::DoubleCommandBuffer,
            )
            .unwrap();
        // One vkQueueSubmit carrying both buffers, then a single drain.
        assert_eq!(framework.device.submit_batches(), vec![vec![2]]);
        assert_eq!(framework.device.queue_waits(), 1);
        assert_eq!(framework.device.recorded_barriers(), 2);
    }

    #[test]
    fn submit_failure_only_fails_positive_runs() {
        let framework = two_family_framework();
        framework.device.fail_queue_operations();
        let context = BarrierQueueFamilyContext::new(&framework, &[0]).unwrap();
        let mut helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        helper
            .run(
                IMAGE_FAMILY_VUID,
                BUFFER_FAMILY_VUID,
                0,
                7,
                false,
                0,
                Modifier::None,
            )
            .unwrap();
        assert!(helper
            .run(
                "",
                "",
                vk::QUEUE_FAMILY_IGNORED,
                vk::QUEUE_FAMILY_IGNORED,
                true,
                0,
                Modifier::DoubleCommandBuffer,
            )
            .unwrap_err()
            .downcast_ref::<HarnessError>()
            .is_some());
    }

    #[test]
    fn invalid_family_records_without_submitting() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[0]).unwrap();
        let mut helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        helper
            .run(
                "",
                "",
                vk::QUEUE_FAMILY_IGNORED,
                vk::QUEUE_FAMILY_IGNORED,
                true,
                INVALID_QUEUE_FAMILY,
                Modifier::None,
            )
            .unwrap();
        assert_eq!(framework.device.submissions(), 0);
        assert_eq!(framework.device.recorded_barriers(), 1);
    }

    #[test]
    fn unknown_family_falls_back_to_the_default() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[1, 0]).unwrap();
        assert_eq!(context.queue_family_info(5).index, 1);
        assert_eq!(context.queue_family_info(0).index, 0);
    }

    #[test]
    fn release_then_acquire_is_clean() {
        let framework = two_family_framework();
        let context = BarrierQueueFamilyContext::new(&framework, &[0, 1]).unwrap();
        let helper = BarrierQueueFamilyTestHelper::init(&context).unwrap();
        let mut buffer_barrier = helper.buffer_barrier;
        buffer_barrier.src_queue_family_index = 0;
        buffer_barrier.dst_queue_family_index = 1;
        valid_ownership_transfer(
            &framework,
            context.queue_family_info(0),
            context.queue_family_info(1),
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            Some(&buffer_barrier),
            None,
        )
        .unwrap();
        assert_eq!(framework.device.submissions(), 2);
    }
}
