//! Expectation-based harness for exercising the Vulkan validation layers.
//!
//! [`validation::monitor::ErrorMonitor`] collects what the layer reports, the pipeline
//! builders under [`gapi::vulkan::pipeline`] produce the objects under test, and
//! [`validation::runner`] ties both into a pass/fail run.

pub mod gapi;
pub mod log;
pub mod validation;
