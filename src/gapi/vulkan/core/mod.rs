pub mod debug;
pub mod dispatch;
pub mod entry;
pub mod instance;
pub mod logical_device;
pub mod queues;
pub mod real_device;
