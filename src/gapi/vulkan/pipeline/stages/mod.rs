//! Default fixed-function and programmable state for the pipeline helpers.
//!
//! Each stage logs the configuration it was built from and hands back plain create-info
//! records. Anything that would point into a slice is left empty; the helpers wire those
//! pointers up when they late-bind the final create info.

pub mod color_blending_stage;
pub mod input_assembler_stage;
pub mod rasterization_stage;
pub mod shader_stage;
pub mod viewport_stage;
