use crate::gapi::vulkan::config::{API_DUMP_ENABLED, CallbackKind, VALIDATION_ENABLED};
use crate::gapi::vulkan::core::debug;
use crate::gapi::vulkan::core::entry::Entry;
use crate::gapi::vulkan::enums::extensions::InstanceExtension;
use crate::gapi::vulkan::enums::layers::InstanceLayer;
use crate::validation::monitor::ErrorMonitor;
use crate::{debug_success, info_success};
use log::{debug, info, trace};
use std::ffi::c_char;
use vulkanalia::vk::{HasBuilder, InstanceV1_0};
use vulkanalia::{vk, Instance as VkInstance};

/// # Vulkan Instance
/// Connection between the harness and the loader, with the validation layer in the chain.
///
/// The instance is created with a debug callback chained into its create info so that
/// messages emitted while the instance itself is created or destroyed also reach the monitor.
#[derive(Clone, Debug)]
pub struct Instance {
    instance: VkInstance,
}

impl Instance {
    /// Creates the instance with the layers selected by the cargo features and the debug
    /// extension matching `callback`.
    ///
    /// `monitor` must stay alive until [`Self::destroy`] returns.
    pub fn new(
        entry: &Entry,
        callback: CallbackKind,
        monitor: *const ErrorMonitor,
    ) -> anyhow::Result<Self> {
        let layers = Self::required_layers();
        debug!("Checking if layers are available: {:?}", layers);
        entry.check_layers_are_available(&layers)?;
        debug_success!("Requested Instance layers are available!");

        let extensions = Self::required_extensions(callback);
        entry.check_extensions_are_available(&extensions, &layers)?;
        info!("Requested extensions: {:?}", extensions);

        let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.name_ptr()).collect();
        let extension_names: Vec<*const c_char> =
            extensions.iter().map(|e| e.name_ptr()).collect();

        let application_info = vk::ApplicationInfo::builder()
            .application_name(b"layer_harness\0")
            .application_version(vk::make_version(1, 0, 0))
            .engine_name(b"layer_harness\0")
            .engine_version(vk::make_version(1, 0, 0))
            .api_version(vk::make_version(1, 1, 0))
            .build();
        trace!("Application info built: {:?}", application_info);

        let mut utils_info = debug::utils_messenger_info(monitor);
        let mut report_info = debug::report_callback_info(monitor);
        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);
        info = match callback {
            CallbackKind::Utils => info.push_next(&mut utils_info),
            CallbackKind::Report => info.push_next(&mut report_info),
        };

        let instance = entry.create_instance(&info)?;
        info_success!("Vulkan Instance created!");
        Ok(Self { instance })
    }

    fn required_layers() -> Vec<InstanceLayer> {
        let mut layers = Vec::new();
        if VALIDATION_ENABLED {
            layers.push(InstanceLayer::Validation);
        }
        if API_DUMP_ENABLED {
            layers.push(InstanceLayer::ApiDump);
        }
        layers
    }

    fn required_extensions(callback: CallbackKind) -> Vec<InstanceExtension> {
        match callback {
            CallbackKind::Utils => vec![InstanceExtension::ExtDebugUtils],
            CallbackKind::Report => vec![InstanceExtension::ExtDebugReport],
        }
    }

    pub fn get_vk(&self) -> &VkInstance {
        &self.instance
    }

    pub fn destroy(&self) {
        debug!("Destroying instance.");
        unsafe { self.instance.destroy_instance(None) }
    }
}
