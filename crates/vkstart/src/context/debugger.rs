use ash::vk;

use super::instance::vulkan_debug_callback;

///Helper that gets initialised by activating validation layers. Owns the
/// `VK_EXT_debug_utils` messenger that routes validation output to [vulkan_debug_callback].
pub struct Debugger {
    pub debug_instance: ash::ext::debug_utils::Instance,
    pub debug_messenger: vk::DebugUtilsMessengerEXT,
}

impl Debugger {
    ///Severities forwarded by the messenger.
    pub const SEVERITIES: vk::DebugUtilsMessageSeverityFlagsEXT =
        vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw()
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw()
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO.as_raw(),
        );

    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self, vk::Result> {
        let debug_instance = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::SEVERITIES)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let debug_messenger =
            unsafe { debug_instance.create_debug_utils_messenger(&create_info, None)? };

        Ok(Debugger {
            debug_instance,
            debug_messenger,
        })
    }
}

impl Drop for Debugger {
    fn drop(&mut self) {
        unsafe {
            self.debug_instance
                .destroy_debug_utils_messenger(self.debug_messenger, None)
        };
    }
}
