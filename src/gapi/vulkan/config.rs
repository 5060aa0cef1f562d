use crate::gapi::vulkan::errors::HarnessError;
use log::LevelFilter;
use std::env;

pub(crate) const VALIDATION_ENABLED: bool = cfg!(feature = "validation");
pub(crate) const API_DUMP_ENABLED: bool = cfg!(feature = "api_dump");
pub(crate) const LOADER_DEBUG_ENABLED: bool = cfg!(feature = "loader_debug");

pub const CALLBACK_ENV: &str = "LAYER_HARNESS_CALLBACK";
pub const DEVICE_INDEX_ENV: &str = "LAYER_HARNESS_DEVICE_INDEX";
pub const LOG_ENV: &str = "LAYER_HARNESS_LOG";
pub const RAY_TRACING_ENV: &str = "LAYER_HARNESS_RAY_TRACING";

/// Which debug extension carries layer messages into the monitor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallbackKind {
    /// `VK_EXT_debug_utils` messenger.
    Utils,
    /// Legacy `VK_EXT_debug_report` callback.
    Report,
}

/// Runtime knobs for the runner, read from the environment.
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    pub callback: CallbackKind,
    /// Index into `vkEnumeratePhysicalDevices`.
    pub device_index: usize,
    pub log_level: LevelFilter,
    /// Enable `VK_NV_ray_tracing` on the device when it is supported.
    pub ray_tracing: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            callback: CallbackKind::Utils,
            device_index: 0,
            log_level: LevelFilter::Info,
            ray_tracing: true,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarnessError> {
        let mut config = Self::default();

        if let Some(value) = lookup(CALLBACK_ENV) {
            config.callback = match value.trim().to_ascii_lowercase().as_str() {
                "utils" => CallbackKind::Utils,
                "report" => CallbackKind::Report,
                _ => return Err(HarnessError::config(CALLBACK_ENV, value)),
            };
        }
        if let Some(value) = lookup(DEVICE_INDEX_ENV) {
            config.device_index = value
                .trim()
                .parse()
                .map_err(|_| HarnessError::config(DEVICE_INDEX_ENV, value.clone()))?;
        }
        if let Some(value) = lookup(LOG_ENV) {
            config.log_level = value
                .trim()
                .parse()
                .map_err(|_| HarnessError::config(LOG_ENV, value.clone()))?;
        }
        if let Some(value) = lookup(RAY_TRACING_ENV) {
            config.ray_tracing = match value.trim() {
                "1" | "true" | "on" => true,
                "0" | "false" | "off" => false,
                _ => return Err(HarnessError::config(RAY_TRACING_ENV, value)),
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_use_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.callback, CallbackKind::Utils);
        assert_eq!(config.device_index, 0);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert!(config.ray_tracing);
    }

    #[test]
    fn parses_every_key() {
        let config = HarnessConfig::from_lookup(lookup(&[
            (CALLBACK_ENV, "Report"),
            (DEVICE_INDEX_ENV, "2"),
            (LOG_ENV, "trace"),
            (RAY_TRACING_ENV, "off"),
        ]))
        .unwrap();
        assert_eq!(config.callback, CallbackKind::Report);
        assert_eq!(config.device_index, 2);
        assert_eq!(config.log_level, LevelFilter::Trace);
        assert!(!config.ray_tracing);
    }

    #[test]
    fn rejects_garbage() {
        let err = HarnessConfig::from_lookup(lookup(&[(DEVICE_INDEX_ENV, "first")])).unwrap_err();
        assert!(err.to_string().contains(DEVICE_INDEX_ENV));
        assert!(HarnessConfig::from_lookup(lookup(&[(CALLBACK_ENV, "stderr")])).is_err());
    }
}
