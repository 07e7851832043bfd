//! Vulkan instance creation and validation message routing.

use crate::error::{GpuError, Result};
use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr, CString};
use trigon_core::Verbosity;

/// Khronos validation layer, enabled together with the debug messenger.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance extensions needed on top of the window system's surface extensions.
pub fn required_instance_extensions(
    window_extensions: &[&'static CStr],
    enable_validation: bool,
) -> Vec<&'static CStr> {
    let mut extensions = window_extensions.to_vec();
    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME);
    }
    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME);

    extensions.sort_unstable();
    extensions.dedup();
    extensions
}

/// Layers requested for the instance.
pub fn required_layers(enable_validation: bool) -> Vec<&'static CStr> {
    if enable_validation {
        vec![VALIDATION_LAYER]
    } else {
        Vec::new()
    }
}

/// Names from `requested` that do not appear in `available`.
pub fn missing_names<'a>(requested: &[&'a CStr], available: &[&'a CStr]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !available.contains(name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Create a Vulkan instance.
///
/// Every requested extension and layer is checked against what the loader
/// reports first; anything missing fails with
/// [`GpuError::MissingInstanceSupport`].
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    window_extensions: &[&'static CStr],
    enable_validation: bool,
    verbosity: Verbosity,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidState("Application name contains a NUL byte".to_string()))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"Trigon")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_0);

    let extensions = required_instance_extensions(window_extensions, enable_validation);
    let layers = required_layers(enable_validation);

    let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None) }?;
    let available_extension_names: Vec<&CStr> = available_extensions
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.extension_name.as_ptr()) })
        .collect();
    let available_layers = unsafe { entry.enumerate_instance_layer_properties() }?;
    let available_layer_names: Vec<&CStr> = available_layers
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) })
        .collect();

    let mut missing = missing_names(&extensions, &available_extension_names);
    missing.extend(missing_names(&layers, &available_layer_names));
    if !missing.is_empty() {
        return Err(GpuError::MissingInstanceSupport(missing));
    }

    for name in &extensions {
        tracing::debug!("Instance extension: {}", name.to_string_lossy());
    }

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();
    let layer_names: Vec<*const c_char> = layers.iter().map(|layer| layer.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    // Chained so messages from instance creation itself are reported too.
    let mut messenger_info = messenger_create_info(verbosity);

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);
    if enable_validation {
        create_info = create_info.push_next(&mut messenger_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }?;

    Ok(instance)
}

/// Severity mask for validation messages at the given verbosity.
pub fn severity_mask(verbosity: Verbosity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let mut mask =
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    if verbosity >= Verbosity::Verbose {
        mask |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    }
    if verbosity >= Verbosity::Trace {
        mask |= vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }
    mask
}

fn messenger_create_info(verbosity: Verbosity) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_mask(verbosity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Routes validation layer messages into `tracing`.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl std::fmt::Debug for DebugMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugMessenger")
            .field("messenger", &self.messenger)
            .finish_non_exhaustive()
    }
}

impl DebugMessenger {
    /// Install the messenger.
    ///
    /// # Safety
    /// The instance must have been created with `VK_EXT_debug_utils` enabled.
    pub unsafe fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        verbosity: Verbosity,
    ) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = messenger_create_info(verbosity);
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;
        Ok(Self { loader, messenger })
    }

    /// Remove the messenger.
    ///
    /// # Safety
    /// Must be called once, before the instance is destroyed.
    pub unsafe fn destroy(&self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let data = unsafe { &*p_callback_data };

    let message_id_name = if data.p_message_id_name.is_null() {
        Cow::from("")
    } else {
        unsafe { CStr::from_ptr(data.p_message_id_name) }.to_string_lossy()
    };
    let message = if data.p_message.is_null() {
        Cow::from("")
    } else {
        unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vulkan", "[{message_type:?} {message_id_name}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vulkan", "[{message_type:?} {message_id_name}] {message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::debug!(target: "vulkan", "[{message_type:?} {message_id_name}] {message}");
        }
        _ => tracing::trace!(target: "vulkan", "[{message_type:?} {message_id_name}] {message}"),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_adds_debug_utils_once() {
        let window = [ash::khr::surface::NAME, ash::ext::debug_utils::NAME];
        let extensions = required_instance_extensions(&window, true);
        let count = extensions
            .iter()
            .filter(|&&name| name == ash::ext::debug_utils::NAME)
            .count();
        assert_eq!(count, 1);
        assert!(extensions.contains(&ash::khr::surface::NAME));
    }

    #[test]
    fn no_debug_utils_without_validation() {
        let extensions = required_instance_extensions(&[ash::khr::surface::NAME], false);
        assert!(!extensions.contains(&ash::ext::debug_utils::NAME));
        assert!(required_layers(false).is_empty());
        assert_eq!(required_layers(true), vec![VALIDATION_LAYER]);
    }

    #[test]
    fn missing_names_reports_only_absent_entries() {
        let requested = [ash::khr::surface::NAME, VALIDATION_LAYER];
        let available = [ash::khr::surface::NAME];
        assert_eq!(
            missing_names(&requested, &available),
            vec!["VK_LAYER_KHRONOS_validation".to_string()]
        );
        assert!(missing_names(&requested, &requested).is_empty());
    }

    #[test]
    fn severity_mask_grows_with_verbosity() {
        let quiet = severity_mask(Verbosity::Quiet);
        assert!(quiet.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
        assert!(!quiet.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
        assert_eq!(severity_mask(Verbosity::Normal), quiet);

        let verbose = severity_mask(Verbosity::Verbose);
        assert!(verbose.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
        assert!(!verbose.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));

        assert!(severity_mask(Verbosity::Trace).contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
    }
}
