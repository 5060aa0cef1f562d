pub mod commands;
pub mod config;
pub mod core;
pub mod enums;
pub mod errors;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
