use std::{
    ffi::{CStr, CString},
    sync::Arc,
};

use ash::vk;
use const_cstr::const_cstr;
use raw_window_handle::HasDisplayHandle;

use crate::{error::InstanceError, util::raw_name_eq};

use super::{debugger::Debugger, PhysicalDeviceFilter};

const_cstr! {
    UNKNOWNID = "unknown id";
    NOMSG = "no message";
}

///The external callback that forwards validation messages to the log crate, or to stdout if
/// the `logging` feature is disabled.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    #[allow(unused)] message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut core::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        #[cfg(feature = "logging")]
        log::error!("VkStartDebugMsg: Got Msg, but no data!");
        return vk::FALSE;
    }

    let data = &*p_callback_data;
    let id = data.message_id_number;
    let idname = if !data.p_message_id_name.is_null() {
        CStr::from_ptr(data.p_message_id_name)
    } else {
        CStr::from_ptr(UNKNOWNID.as_ptr())
    };
    let msg = if !data.p_message.is_null() {
        CStr::from_ptr(data.p_message)
    } else {
        CStr::from_ptr(NOMSG.as_ptr())
    };

    #[cfg(feature = "logging")]
    {
        if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            log::error!("[{}: {:?}]: {:?}", id, idname, msg);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            log::warn!("[{}: {:?}]: {:?}", id, idname, msg);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            log::info!("[{}: {:?}]: {:?}", id, idname, msg);
        } else {
            log::trace!("[{}: {:?}]: {:?}", id, idname, msg);
        }
    }

    #[cfg(not(feature = "logging"))]
    {
        println!(
            "VkStartDebugMsg: Level: {:?}, Type: {:?}\nId[{}: {:?}]\nMsg: {:?}",
            message_severity, message_types, id, idname, msg
        );
    }

    //the call that triggered the message should not be aborted
    vk::FALSE
}

///Instance configuration as well as the source entry point. Usually this struct is created via [Instance::load].
pub struct InstanceBuilder {
    pub entry: ash::Entry,
    ///Name reported to the driver as the application's name.
    pub application_name: CString,
    ///Name reported to the driver as the engine's name.
    pub engine_name: CString,
    ///Packed Vulkan version requested via the application info.
    pub api_version: u32,
    pub validation: bool,
    pub enabled_layers: Vec<CString>,
    pub enabled_extensions: Vec<CString>,
    available_layers: Vec<vk::LayerProperties>,
    available_extensions: Vec<vk::ExtensionProperties>,
}

impl InstanceBuilder {
    ///Builds the instance from the current information.
    ///if validation is enabled the Khronos validation layer is pushed and a debug messenger is
    /// installed that forwards all messages to [vulkan_debug_callback].
    pub fn build(mut self) -> Result<Arc<Instance>, InstanceError> {
        let has_validation = self.validation;
        if has_validation {
            self = self.with_layer(c"VK_LAYER_KHRONOS_validation".to_owned())?;
            self = self.with_extension(ash::ext::debug_utils::NAME.to_owned())?;
        }

        let InstanceBuilder {
            entry,
            application_name,
            engine_name,
            api_version,
            validation: _,
            enabled_layers,
            enabled_extensions,
            available_layers: _,
            available_extensions: _,
        } = self;

        let app_desc = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .engine_name(&engine_name)
            .api_version(api_version);

        #[cfg(feature = "logging")]
        {
            log::info!("Instance creation:");
            log::info!(
                "  Vulkan version: {}.{}.{}",
                vk::api_version_major(api_version),
                vk::api_version_minor(api_version),
                vk::api_version_patch(api_version),
            );
            log::info!("  Layers:");
            for l in &enabled_layers {
                log::info!("    {:?}", l);
            }
            log::info!("  Extensions:");
            for e in &enabled_extensions {
                log::info!("    {:?}", e);
            }
        }

        let extension_ptrs = enabled_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<_>>();

        let layer_ptrs = enabled_layers
            .iter()
            .map(|layer| layer.as_ptr())
            .collect::<Vec<_>>();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_desc)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = match unsafe { entry.create_instance(&create_info, None) } {
            Ok(instance) => instance,
            Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER) => {
                #[cfg(feature = "logging")]
                log::error!("vkCreateInstance failed, no compatible ICD found");
                return Err(InstanceError::IncompatibleDriver);
            }
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("vkCreateInstance failed: {}", e);
                return Err(e.into());
            }
        };

        let debugger = if has_validation {
            match Debugger::new(&entry, &instance) {
                Ok(debugger) => Some(debugger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(Arc::new(Instance {
            entry,
            inner: instance,
            api_version,
            debugger,
        }))
    }

    pub fn is_layer_available(&self, name: &CStr) -> bool {
        self.available_layers
            .iter()
            .any(|al| raw_name_eq(&al.layer_name, name))
    }

    ///Returns true if a instance-extension with the given name was found
    pub fn is_extension_available(&self, extension_name: &CStr) -> bool {
        self.available_extensions
            .iter()
            .any(|ext| raw_name_eq(&ext.extension_name, extension_name))
    }

    ///adds an extensions with the given name, if it was not added yet.
    pub fn with_extension(mut self, name: CString) -> Result<Self, InstanceError> {
        if !self.is_extension_available(&name) {
            return Err(InstanceError::MissingExtension(name));
        }

        if self.enabled_extensions.contains(&name) {
            #[cfg(feature = "logging")]
            log::warn!("Tried to enable extension twice: {:?}", name);
            return Ok(self);
        }

        #[cfg(feature = "logging")]
        log::info!("Enabling instance-extension: {:?}", name);
        self.enabled_extensions.push(name);

        Ok(self)
    }

    ///adds an layer with the given name to the list of layers
    pub fn with_layer(mut self, name: CString) -> Result<Self, InstanceError> {
        if !self.is_layer_available(&name) {
            return Err(InstanceError::MissingLayer(name));
        }

        if self.enabled_layers.contains(&name) {
            #[cfg(feature = "logging")]
            log::warn!("Tried to enable layer twice: {:?}", name);
            return Ok(self);
        }

        self.enabled_layers.push(name);

        Ok(self)
    }

    ///Sets the application and engine name reported to the driver.
    pub fn with_application(mut self, application_name: CString, engine_name: CString) -> Self {
        self.application_name = application_name;
        self.engine_name = engine_name;
        self
    }

    ///Sets the requested Vulkan version.
    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }

    ///Enables all extensions that are needed for the surface behind `handle` to work. This is `VK_KHR_surface`
    /// plus the platform specific one (Win32, Xlib, XCB, Wayland ...).
    pub fn for_surface(mut self, handle: &dyn HasDisplayHandle) -> Result<Self, InstanceError> {
        let required_extensions =
            ash_window::enumerate_required_extensions(handle.display_handle()?.as_raw())?;
        for r in required_extensions {
            let st = unsafe { CStr::from_ptr(*r).to_owned() };
            self = self.with_extension(st)?;
        }

        Ok(self)
    }

    ///enables validation layers and a debug messenger that prints either via [println](println), or via the log crate if the `logging` feature is enabled.
    pub fn enable_validation(mut self) -> Self {
        self.validation = true;
        self
    }

    ///Allows changing `self` builder style
    pub fn with(mut self, mapping: impl FnOnce(&mut InstanceBuilder)) -> Self {
        mapping(&mut self);
        self
    }
}

///vkstart instance. Wraps the entry point as well as the created instance into one object.
///
/// # Safety
///
/// This struct is un-clonable for a reason. It implements [Drop] which takes care of destroying the vulkan instance, as well as the debug
/// messenger if it was loaded.
pub struct Instance {
    pub entry: ash::Entry,
    pub inner: ash::Instance,
    ///Version that was requested at creation time.
    pub api_version: u32,
    pub debugger: Option<Debugger>,
}

impl Instance {
    pub const DEFAULT_APPLICATION_NAME: &'static CStr = c"Vulkan Example";
    pub const DEFAULT_ENGINE_NAME: &'static CStr = c"Vulkan Engine";
    ///Vulkan 1.0.3, the smallest version all ICDs are able to provide.
    pub const DEFAULT_API_VERSION: u32 = vk::make_api_version(0, 1, 0, 3);

    ///Creates an instance builder by loading the Vulkan library at runtime via [Entry::load](ash::Entry::load)
    pub fn load() -> Result<InstanceBuilder, InstanceError> {
        let entry = unsafe { ash::Entry::load()? };
        Self::from_entry(entry)
    }

    ///Creates an instance builder for an already loaded entry point.
    pub fn from_entry(entry: ash::Entry) -> Result<InstanceBuilder, InstanceError> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };
        let available_extensions = unsafe { entry.enumerate_instance_extension_properties(None)? };

        Ok(InstanceBuilder {
            entry,
            application_name: Self::DEFAULT_APPLICATION_NAME.to_owned(),
            engine_name: Self::DEFAULT_ENGINE_NAME.to_owned(),
            api_version: Self::DEFAULT_API_VERSION,
            validation: false,
            enabled_extensions: Vec::new(),
            enabled_layers: Vec::new(),
            available_layers,
            available_extensions,
        })
    }

    pub fn validation_enabled(&self) -> bool {
        self.debugger.is_some()
    }
}

pub trait GetDeviceFilter {
    fn create_physical_device_filter(&self) -> Result<PhysicalDeviceFilter, InstanceError>;
}

impl GetDeviceFilter for Arc<Instance> {
    fn create_physical_device_filter(&self) -> Result<PhysicalDeviceFilter, InstanceError> {
        let devices = unsafe { self.inner.enumerate_physical_devices()? };
        Ok(PhysicalDeviceFilter::new(&self.inner, devices))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        //the messenger has to go before its instance
        self.debugger.take();
        unsafe {
            self.inner.destroy_instance(None);
        }
    }
}
