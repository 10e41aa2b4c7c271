// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use tracing::{debug, error, info, trace, warn};

use crate::error::{RenderError, Result};

pub(crate) const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Validation-layer output routed into tracing.
pub(crate) struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader hands us a valid callback-data struct for the
    // duration of the call.
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();

    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan {types:?}] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan {types:?}] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!("[vulkan {types:?}] {msg}");
    } else {
        trace!("[vulkan {types:?}] {msg}");
    }
    vk::FALSE
}

impl DebugMessenger {
    pub(crate) fn create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
        vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        }
    }

    pub(crate) unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = Self::create_info();
        let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
            .map_err(RenderError::init("vkCreateDebugUtilsMessengerEXT"))?;
        debug!("debug messenger installed");
        Ok(Self { loader, messenger })
    }

    pub(crate) unsafe fn destroy(&mut self) {
        if self.messenger != vk::DebugUtilsMessengerEXT::null() {
            unsafe {
                self.loader
                    .destroy_debug_utils_messenger(self.messenger, None)
            };
            self.messenger = vk::DebugUtilsMessengerEXT::null();
        }
    }
}

/// Returns the first requested layer the loader does not report.
pub(crate) fn first_missing_layer<'a>(
    available: &[vk::LayerProperties],
    wanted: &[&'a CStr],
) -> Option<&'a CStr> {
    wanted.iter().copied().find(|want| {
        !available
            .iter()
            .any(|l| l.layer_name_as_c_str().map(|n| n == *want).unwrap_or(false))
    })
}
