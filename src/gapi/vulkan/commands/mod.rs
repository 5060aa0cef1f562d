pub mod command_buffers;
pub mod command_pool;
