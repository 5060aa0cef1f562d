//! The cases the runner binary ships with.

use crate::gapi::vulkan::pipeline::compute::ComputePipelineHelper;
use crate::gapi::vulkan::pipeline::graphics::GraphicsPipelineHelper;
use crate::gapi::vulkan::pipeline::oneshot::{oneshot_positive_test, oneshot_test};
use crate::gapi::vulkan::pipeline::ray_tracing::RayTracingPipelineHelper;
use crate::validation::barrier::{
    valid_ownership_transfer, BarrierQueueFamilyContext, BarrierQueueFamilyTestHelper, Modifier,
};
use crate::validation::framework::{create_buffer_test, RenderFramework};
use crate::validation::runner::{Outcome, TestCase};
use vulkanalia::vk;
use vulkanalia::vk::HasBuilder;

pub const WIDE_LINES_VUID: &str = "VUID-VkGraphicsPipelineCreateInfo-pDynamicStates-00749";
pub const BUFFER_SIZE_VUID: &str = "VUID-VkBufferCreateInfo-size-00912";
pub const IMAGE_FAMILY_VUID: &str = "VUID-VkImageMemoryBarrier-image-04069";
pub const BUFFER_FAMILY_VUID: &str = "VUID-VkBufferMemoryBarrier-buffer-04088";

pub const BUILTIN_CASES: &[TestCase] = &[
    TestCase {
        name: "graphics_pipeline_defaults",
        run: graphics_pipeline_defaults,
    },
    TestCase {
        name: "graphics_pipeline_wide_lines",
        run: graphics_pipeline_wide_lines,
    },
    TestCase {
        name: "compute_pipeline_defaults",
        run: compute_pipeline_defaults,
    },
    TestCase {
        name: "ray_tracing_pipeline_defaults",
        run: ray_tracing_pipeline_defaults,
    },
    TestCase {
        name: "buffer_zero_size",
        run: buffer_zero_size,
    },
    TestCase {
        name: "barrier_ignored_families",
        run: barrier_ignored_families,
    },
    TestCase {
        name: "barrier_family_out_of_range",
        run: barrier_family_out_of_range,
    },
    TestCase {
        name: "barrier_ownership_transfer",
        run: barrier_ownership_transfer,
    },
];

fn graphics_pipeline_defaults(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    oneshot_positive_test::<GraphicsPipelineHelper>(test, |_| {}, vk::DebugReportFlagsEXT::ERROR)?;
    Ok(Outcome::Passed)
}

fn graphics_pipeline_wide_lines(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    oneshot_test::<GraphicsPipelineHelper>(
        test,
        |helper| helper.state.rs_state_ci.line_width = 2.0,
        vk::DebugReportFlagsEXT::ERROR,
        &[WIDE_LINES_VUID],
    )?;
    Ok(Outcome::Passed)
}

fn compute_pipeline_defaults(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    oneshot_positive_test::<ComputePipelineHelper>(test, |_| {}, vk::DebugReportFlagsEXT::ERROR)?;
    Ok(Outcome::Passed)
}

fn ray_tracing_pipeline_defaults(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    if !RayTracingPipelineHelper::supported(test) {
        return Ok(Outcome::Skipped("VK_NV_ray_tracing is not enabled".into()));
    }
    oneshot_positive_test::<RayTracingPipelineHelper>(
        test,
        |_| {},
        vk::DebugReportFlagsEXT::ERROR,
    )?;
    Ok(Outcome::Passed)
}

fn buffer_zero_size(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    let info = vk::BufferCreateInfo::builder()
        .size(0)
        .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .build();
    create_buffer_test(test, &info, Some(BUFFER_SIZE_VUID))?;
    Ok(Outcome::Passed)
}

fn family_indices(test: &dyn RenderFramework) -> Vec<u32> {
    test.queue_families()
        .iter()
        .map(|family| family.family_index)
        .collect()
}

fn barrier_ignored_families(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    let families = family_indices(test);
    let context = BarrierQueueFamilyContext::new(test, &families)?;
    let mut helper = BarrierQueueFamilyTestHelper::init(&context)?;
    helper.run(
        "",
        "",
        vk::QUEUE_FAMILY_IGNORED,
        vk::QUEUE_FAMILY_IGNORED,
        true,
        families[0],
        Modifier::None,
    )?;
    Ok(Outcome::Passed)
}

fn barrier_family_out_of_range(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    let families = family_indices(test);
    let out_of_range = families.iter().max().map_or(0, |max| max + 1);
    let context = BarrierQueueFamilyContext::new(test, &families)?;
    let mut helper = BarrierQueueFamilyTestHelper::init(&context)?;
    helper.run(
        IMAGE_FAMILY_VUID,
        BUFFER_FAMILY_VUID,
        families[0],
        out_of_range,
        false,
        families[0],
        Modifier::None,
    )?;
    Ok(Outcome::Passed)
}

fn barrier_ownership_transfer(test: &dyn RenderFramework) -> anyhow::Result<Outcome> {
    let families = family_indices(test);
    let &[from, to, ..] = families.as_slice() else {
        return Ok(Outcome::Skipped("needs two queue families".into()));
    };
    let context = BarrierQueueFamilyContext::new(test, &[from, to])?;
    let helper = BarrierQueueFamilyTestHelper::init(&context)?;
    let mut buffer_barrier = helper.buffer_barrier;
    buffer_barrier.src_queue_family_index = from;
    buffer_barrier.dst_queue_family_index = to;
    valid_ownership_transfer(
        test,
        context.queue_family_info(from),
        context.queue_family_info(to),
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::TRANSFER,
        Some(&buffer_barrier),
        None,
    )?;
    Ok(Outcome::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::fake::FakeFramework;
    use crate::validation::runner::run_all;

    #[test]
    fn every_case_passes_on_a_full_device() {
        let mut framework = FakeFramework::with_families(2);
        for ext in RayTracingPipelineHelper::required_device_extensions() {
            framework.enable_extension(*ext);
        }
        let summary = run_all(&framework, BUILTIN_CASES, None);
        assert_eq!(summary.failed, Vec::<&str>::new());
        assert_eq!(summary.passed.len(), BUILTIN_CASES.len());
    }

    #[test]
    fn missing_features_skip_instead_of_failing() {
        let framework = FakeFramework::new();
        let summary = run_all(&framework, BUILTIN_CASES, None);
        assert_eq!(
            summary.skipped,
            ["ray_tracing_pipeline_defaults", "barrier_ownership_transfer"]
        );
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn case_names_are_unique() {
        let mut names = BUILTIN_CASES.iter().map(|case| case.name).collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BUILTIN_CASES.len());
    }
}
