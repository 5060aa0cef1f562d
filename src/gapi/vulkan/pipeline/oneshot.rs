use crate::gapi::vulkan::errors::HarnessError;
use crate::validation::framework::RenderFramework;
use log::debug;
use vulkanalia::vk;

/// What the one-shot templates need from a pipeline helper.
pub trait PipelineHelper<'a>: Sized {
    fn new(test: &'a dyn RenderFramework) -> Self;
    /// Fills every create-info record with defaults.
    fn init_info(&mut self) -> anyhow::Result<()>;
    /// Creates the descriptor set, pipeline layout and pipeline cache.
    fn init_state(&mut self) -> anyhow::Result<()>;
    /// Late-binds and creates, destroying any earlier pipeline first.
    fn create_pipeline(&mut self) -> vk::Result;
    fn test(&self) -> &'a dyn RenderFramework;
}

fn prepare<'a, H>(test: &'a dyn RenderFramework, mutator: impl FnOnce(&mut H)) -> anyhow::Result<H>
where
    H: PipelineHelper<'a>,
{
    let mut helper = H::new(test);
    helper.init_info()?;
    mutator(&mut helper);
    helper.init_state()?;
    Ok(helper)
}

/// Builds one pipeline after `mutator` has broken it and checks that every message in
/// `expected` arrives, and nothing else does.
///
/// A failed verdict comes back as a [`VerdictError`](crate::validation::monitor::VerdictError)
/// inside the `anyhow::Error`.
pub fn oneshot_test<'a, H>(
    test: &'a dyn RenderFramework,
    mutator: impl FnOnce(&mut H),
    flags: vk::DebugReportFlagsEXT,
    expected: &[&str],
) -> anyhow::Result<()>
where
    H: PipelineHelper<'a>,
{
    let mut helper = prepare::<H>(test, mutator)?;
    let monitor = helper.test().monitor();
    monitor.set_desired_failure_msgs(flags, expected);
    let status = helper.create_pipeline();
    debug!("Negative pipeline test created pipeline with {status:?}");
    monitor.verify_found()?;
    Ok(())
}

/// Builds one pipeline after `mutator` ran and checks that it is created without any message
/// passing `flags`.
pub fn oneshot_positive_test<'a, H>(
    test: &'a dyn RenderFramework,
    mutator: impl FnOnce(&mut H),
    flags: vk::DebugReportFlagsEXT,
) -> anyhow::Result<()>
where
    H: PipelineHelper<'a>,
{
    let mut helper = prepare::<H>(test, mutator)?;
    let monitor = helper.test().monitor();
    monitor.expect_success(flags);
    let status = helper.create_pipeline();
    let verdict = monitor.verify_not_found();
    HarnessError::check("vkCreate*Pipelines", status)?;
    verdict?;
    Ok(())
}
