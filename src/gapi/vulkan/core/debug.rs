use crate::gapi::vulkan::config::CallbackKind;
use crate::gapi::vulkan::core::instance::Instance;
use crate::gapi::vulkan::errors::HarnessError;
use crate::log::log::LAYER_TARGET;
use crate::validation::monitor::ErrorMonitor;
use log::{debug, trace};
use std::ffi::{c_char, CStr};
use std::os::raw::c_void;
use std::slice;
use vulkanalia::vk;
use vulkanalia::vk::{ExtDebugReportExtension, ExtDebugUtilsExtension};

/// Every severity the layers can report; the monitor's own mask does the filtering.
pub const ALL_REPORT_FLAGS: vk::DebugReportFlagsEXT = vk::DebugReportFlagsEXT::all();

/// A queue or command-buffer label as seen by the debug-utils callback.
#[derive(Clone, Debug, PartialEq)]
pub struct DebugLabel {
    pub name: String,
    pub color: [f32; 4],
}

impl DebugLabel {
    pub fn new(name: impl Into<String>, color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DebugObject {
    pub object_type: vk::ObjectType,
    pub handle: u64,
    pub name: Option<String>,
}

/// Owned copy of a `VkDebugUtilsMessengerCallbackDataEXT` and the flags that came with it.
#[derive(Clone, Debug)]
pub struct CallbackRecord {
    pub severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    pub types: vk::DebugUtilsMessageTypeFlagsEXT,
    pub message_id_name: Option<String>,
    pub message_id_number: i32,
    pub message: String,
    pub queue_labels: Vec<DebugLabel>,
    pub cmd_buf_labels: Vec<DebugLabel>,
    pub objects: Vec<DebugObject>,
}

unsafe fn lossy(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

unsafe fn array<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr, count as usize) }
    }
}

impl CallbackRecord {
    /// # Safety
    /// `data` must satisfy the validity rules of `VkDebugUtilsMessengerCallbackDataEXT`.
    pub unsafe fn from_raw(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        types: vk::DebugUtilsMessageTypeFlagsEXT,
        data: &vk::DebugUtilsMessengerCallbackDataEXT,
    ) -> Self {
        let labels = |ptr: *const vk::DebugUtilsLabelEXT, count: u32| unsafe {
            array(ptr, count)
                .iter()
                .map(|label| DebugLabel {
                    name: lossy(label.label_name).unwrap_or_default(),
                    color: label.color,
                })
                .collect::<Vec<_>>()
        };
        unsafe {
            Self {
                severity,
                types,
                message_id_name: lossy(data.message_id_name),
                message_id_number: data.message_id_number,
                message: lossy(data.message).unwrap_or_default(),
                queue_labels: labels(data.queue_labels, data.queue_label_count),
                cmd_buf_labels: labels(data.cmd_buf_labels, data.cmd_buf_label_count),
                objects: array(data.objects, data.object_count)
                    .iter()
                    .map(|object| DebugObject {
                        object_type: object.object_type,
                        handle: object.object_handle,
                        name: lossy(object.object_name),
                    })
                    .collect(),
            }
        }
    }
}

/// Maps a debug-utils (severity, type) pair onto the equivalent debug-report flag.
pub fn report_flags_for(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
) -> vk::DebugReportFlagsEXT {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        vk::DebugReportFlagsEXT::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            vk::DebugReportFlagsEXT::PERFORMANCE_WARNING
        } else {
            vk::DebugReportFlagsEXT::WARNING
        }
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        vk::DebugReportFlagsEXT::INFORMATION
    } else {
        vk::DebugReportFlagsEXT::DEBUG
    }
}

/// Shared tail of both trampolines: severity gate, then the monitor.
fn forward(monitor: &ErrorMonitor, flags: vk::DebugReportFlagsEXT, message: &str) -> vk::Bool32 {
    trace!(target: LAYER_TARGET, "({:?}) {}", flags, message);
    if (flags & monitor.message_flags()).is_empty() {
        return vk::FALSE;
    }
    if monitor.check_for_desired_msg(message) {
        vk::TRUE
    } else {
        vk::FALSE
    }
}

/// `PFN_vkDebugReportCallbackEXT` for the monitor passed as `user_data`.
///
/// Returns `TRUE` only when the message satisfied an expectation, which tells the layer
/// not to print it again.
pub extern "system" fn debug_report_callback(
    flags: vk::DebugReportFlagsEXT,
    _object_type: vk::DebugReportObjectTypeEXT,
    _object: u64,
    _location: usize,
    _message_code: i32,
    _layer_prefix: *const c_char,
    message: *const c_char,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if user_data.is_null() || message.is_null() {
        return vk::FALSE;
    }
    let monitor = unsafe { &*(user_data as *const ErrorMonitor) };
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    forward(monitor, flags, &message)
}

/// `PFN_vkDebugUtilsMessengerCallbackEXT` for the monitor passed as `user_data`.
///
/// The raw record goes to the monitor's hook first (label checks live there), then the
/// message is matched like a debug-report message of the equivalent severity.
pub extern "system" fn debug_utils_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if user_data.is_null() || data.is_null() {
        return vk::FALSE;
    }
    let monitor = unsafe { &*(user_data as *const ErrorMonitor) };
    let data = unsafe { &*data };

    if let Some(hook) = monitor.utils_hook() {
        let record = unsafe { CallbackRecord::from_raw(severity, types, data) };
        hook(&record);
    }

    if data.message.is_null() {
        return vk::FALSE;
    }
    let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();
    forward(monitor, report_flags_for(severity, types), &message)
}

/// Create info for a debug-utils messenger that feeds `monitor`.
pub fn utils_messenger_info(monitor: *const ErrorMonitor) -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT {
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::all(),
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        user_callback: Some(debug_utils_callback),
        user_data: monitor as *mut c_void,
        ..Default::default()
    }
}

/// Create info for a debug-report callback that feeds `monitor`.
pub fn report_callback_info(monitor: *const ErrorMonitor) -> vk::DebugReportCallbackCreateInfoEXT {
    vk::DebugReportCallbackCreateInfoEXT {
        flags: ALL_REPORT_FLAGS,
        callback: Some(debug_report_callback),
        user_data: monitor as *mut c_void,
        ..Default::default()
    }
}

/// The registered callback object; either flavour ends up in the same monitor.
///
/// The monitor must outlive the messenger: the driver holds a raw pointer to it.
#[derive(Clone, Copy, Debug)]
pub enum Messenger {
    Utils(vk::DebugUtilsMessengerEXT),
    Report(vk::DebugReportCallbackEXT),
}

impl Messenger {
    pub fn new(
        instance: &Instance,
        monitor: *const ErrorMonitor,
        kind: CallbackKind,
    ) -> Result<Self, HarnessError> {
        let messenger = match kind {
            CallbackKind::Utils => {
                let info = utils_messenger_info(monitor);
                let messenger = unsafe {
                    instance
                        .get_vk()
                        .create_debug_utils_messenger_ext(&info, None)
                        .map_err(HarnessError::driver("vkCreateDebugUtilsMessengerEXT"))?
                };
                Self::Utils(messenger)
            }
            CallbackKind::Report => {
                let info = report_callback_info(monitor);
                let callback = unsafe {
                    instance
                        .get_vk()
                        .create_debug_report_callback_ext(&info, None)
                        .map_err(HarnessError::driver("vkCreateDebugReportCallbackEXT"))?
                };
                Self::Report(callback)
            }
        };
        debug!("Registered {:?}", messenger);
        Ok(messenger)
    }

    pub fn destroy(&self, instance: &Instance) {
        debug!("Destroying {:?}", self);
        unsafe {
            match *self {
                Self::Utils(messenger) => instance
                    .get_vk()
                    .destroy_debug_utils_messenger_ext(messenger, None),
                Self::Report(callback) => instance
                    .get_vk()
                    .destroy_debug_report_callback_ext(callback, None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;
    use std::sync::Mutex;
    use std::sync::Arc;

    fn report(monitor: &ErrorMonitor, flags: vk::DebugReportFlagsEXT, text: &str) -> vk::Bool32 {
        let message = CString::new(text).unwrap();
        let prefix = CString::new("Validation").unwrap();
        debug_report_callback(
            flags,
            vk::DebugReportObjectTypeEXT::UNKNOWN,
            0,
            0,
            0,
            prefix.as_ptr(),
            message.as_ptr(),
            monitor as *const ErrorMonitor as *mut c_void,
        )
    }

    #[test]
    fn report_callback_gates_on_the_mask() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_failure_msg(vk::DebugReportFlagsEXT::ERROR, "VUID-X");
        assert_eq!(report(&monitor, vk::DebugReportFlagsEXT::WARNING, "VUID-X"), vk::FALSE);
        assert!(monitor.other_failure_msgs().is_empty());
        assert_eq!(report(&monitor, vk::DebugReportFlagsEXT::ERROR, "VUID-X"), vk::TRUE);
        assert_eq!(monitor.verify_found(), Ok(()));
    }

    #[test]
    fn report_callback_returns_false_for_unexpected() {
        let monitor = ErrorMonitor::new();
        assert_eq!(report(&monitor, vk::DebugReportFlagsEXT::ERROR, "stray"), vk::FALSE);
        assert_eq!(monitor.other_failure_msgs(), vec!["stray".to_string()]);
    }

    #[test]
    fn null_pointers_are_ignored() {
        let result = debug_report_callback(
            vk::DebugReportFlagsEXT::ERROR,
            vk::DebugReportObjectTypeEXT::UNKNOWN,
            0,
            0,
            0,
            ptr::null(),
            ptr::null(),
            ptr::null_mut(),
        );
        assert_eq!(result, vk::FALSE);
        let result = debug_utils_callback(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            ptr::null(),
            ptr::null_mut(),
        );
        assert_eq!(result, vk::FALSE);
    }

    #[test]
    fn severity_translation() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;
        use vk::DebugUtilsMessageTypeFlagsEXT as T;
        assert_eq!(report_flags_for(S::ERROR, T::VALIDATION), vk::DebugReportFlagsEXT::ERROR);
        assert_eq!(
            report_flags_for(S::WARNING, T::PERFORMANCE),
            vk::DebugReportFlagsEXT::PERFORMANCE_WARNING
        );
        assert_eq!(report_flags_for(S::WARNING, T::GENERAL), vk::DebugReportFlagsEXT::WARNING);
        assert_eq!(report_flags_for(S::INFO, T::GENERAL), vk::DebugReportFlagsEXT::INFORMATION);
        assert_eq!(report_flags_for(S::VERBOSE, T::GENERAL), vk::DebugReportFlagsEXT::DEBUG);
    }

    #[test]
    fn utils_callback_feeds_hook_and_monitor() {
        let monitor = ErrorMonitor::new();
        let seen: Arc<Mutex<Vec<CallbackRecord>>> = Arc::default();
        let sink = seen.clone();
        monitor.set_utils_hook(Some(Arc::new(move |record: &CallbackRecord| {
            sink.lock().unwrap().push(record.clone());
        })));
        monitor.set_desired_failure_msg(vk::DebugReportFlagsEXT::ERROR, "VUID-L");

        let message = CString::new("VUID-L label check").unwrap();
        let id = CString::new("VUID-L").unwrap();
        let label_name = CString::new("command label").unwrap();
        let object_name = CString::new("the buffer").unwrap();
        let label = vk::DebugUtilsLabelEXT {
            label_name: label_name.as_ptr(),
            color: [0.0, 1.0, 0.0, 1.0],
            ..Default::default()
        };
        let object = vk::DebugUtilsObjectNameInfoEXT {
            object_type: vk::ObjectType::BUFFER,
            object_handle: 42,
            object_name: object_name.as_ptr(),
            ..Default::default()
        };
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            message_id_name: id.as_ptr(),
            message_id_number: 7,
            message: message.as_ptr(),
            cmd_buf_label_count: 1,
            cmd_buf_labels: &label,
            object_count: 1,
            objects: &object,
            ..Default::default()
        };

        let result = debug_utils_callback(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            &data,
            &monitor as *const ErrorMonitor as *mut c_void,
        );
        assert_eq!(result, vk::TRUE);
        assert_eq!(monitor.verify_found(), Ok(()));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let record = &seen[0];
        assert_eq!(record.message_id_name.as_deref(), Some("VUID-L"));
        assert_eq!(record.message_id_number, 7);
        assert!(record.queue_labels.is_empty());
        assert_eq!(
            record.cmd_buf_labels,
            vec![DebugLabel::new("command label", [0.0, 1.0, 0.0, 1.0])]
        );
        assert_eq!(record.objects[0].name.as_deref(), Some("the buffer"));
        assert_eq!(record.objects[0].handle, 42);
    }

    #[test]
    fn info_messages_pass_through_when_unmasked() {
        let monitor = ErrorMonitor::new();
        let message = CString::new("just chatter").unwrap();
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            message: message.as_ptr(),
            ..Default::default()
        };
        let result = debug_utils_callback(
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
            &data,
            &monitor as *const ErrorMonitor as *mut c_void,
        );
        assert_eq!(result, vk::FALSE);
        assert_eq!(monitor.verify_not_found(), Ok(()));
    }

    #[test]
    fn labels_compare_by_name_and_color() {
        let a = DebugLabel::new("pass", [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(a, DebugLabel::new("pass", [1.0, 0.0, 0.0, 1.0]));
        assert_ne!(a, DebugLabel::new("pass", [1.0, 0.0, 0.0, 0.5]));
        assert_ne!(a, DebugLabel::new("other", [1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn create_infos_point_at_the_monitor() {
        let monitor = ErrorMonitor::new();
        let info = utils_messenger_info(&monitor);
        assert_eq!(info.user_data as *const ErrorMonitor, &monitor as *const ErrorMonitor);
        assert!(info.user_callback.is_some());
        let info = report_callback_info(&monitor);
        assert!(info.flags.contains(vk::DebugReportFlagsEXT::ERROR));
        assert!(info.callback.is_some());
    }
}
