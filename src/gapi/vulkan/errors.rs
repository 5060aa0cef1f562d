use thiserror::Error;
use vulkanalia::vk;

/// Failures of the harness plumbing itself, as opposed to verdicts about layer messages.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The driver rejected a call the harness needed to succeed.
    #[error("{call} failed: {code}")]
    Driver {
        call: &'static str,
        code: vk::ErrorCode,
    },
    /// The driver returned a non-success status where success was required.
    #[error("{call} returned {result:?}")]
    Status {
        call: &'static str,
        result: vk::Result,
    },
    #[error("Invalid value `{value}` for {key}")]
    Config { key: &'static str, value: String },
    #[error("Failed to compile {stage:?} shader: {message}")]
    ShaderCompile {
        stage: vk::ShaderStageFlags,
        message: String,
    },
    #[error("No memory type satisfies bits {type_bits:#x} with {flags:?}")]
    NoMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },
}

impl HarnessError {
    pub fn driver(call: &'static str) -> impl FnOnce(vk::ErrorCode) -> Self {
        move |code| Self::Driver { call, code }
    }

    pub fn config(key: &'static str, value: impl Into<String>) -> Self {
        Self::Config {
            key,
            value: value.into(),
        }
    }

    /// Turns a raw status into an error unless it is `SUCCESS`.
    pub fn check(call: &'static str, result: vk::Result) -> Result<(), Self> {
        if result == vk::Result::SUCCESS {
            Ok(())
        } else {
            Err(Self::Status { call, result })
        }
    }
}

/// Converts the split success/error codes of a driver call back into one status value.
pub(crate) fn status_of<T>(result: &Result<(T, vk::SuccessCode), vk::ErrorCode>) -> vk::Result {
    match result {
        Ok((_, code)) => vk::Result::from_raw(code.as_raw()),
        Err(code) => vk::Result::from_raw(code.as_raw()),
    }
}
