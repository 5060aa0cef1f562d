//! Pipeline helpers: graphics, compute and NV ray tracing, plus the one-shot test templates
//! built on top of them.

pub mod compute;
pub mod descriptor_set;
pub mod graphics;
pub mod oneshot;
pub mod ray_tracing;
pub mod shaders;
pub mod stages;
