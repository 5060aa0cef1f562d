pub mod barrier;
pub mod cases;
#[cfg(test)]
pub(crate) mod fake;
pub mod framework;
pub mod monitor;
pub mod runner;
