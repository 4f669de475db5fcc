//! ## Context
//!
//! When working with Vulkan the [Device](ash::Device) is entry point for most of the operations.
//! It therefore is needed in most structures and functions calls that somehow transform state related to Vulkan.
//! The device is created from an [Instance](ash::Instance) which represents a runtime instance of Vulkan.
//!
//! Additionally to the device one or multiple [queues](ash::vk::Queue) might be created. They can be understood as
//! a kind of "thread". Basically they are used for scheduling work on the GPU. Multiple queue types exists that can
//! do different types of work.
//!
//! Since those structures closely work together we define an abstraction called [Ctx](context::Ctx), or "Context".
//! The context holds the graphics queue that every chapter submits to.
//!
//! # Examples
//!
//!```ignore
//! //headless, for instance to only enumerate devices.
//! let ctx = Ctx::new_headless(&ContextConfig::default())?;
//!
//! //for a window, also returns the created surface.
//! let (ctx, surface) = Ctx::new_with_surface(&window, &ContextConfig::default())?;
//!```
use std::{ffi::CString, sync::Arc};

mod debugger;
pub use debugger::Debugger;

mod instance;
pub use instance::{vulkan_debug_callback, GetDeviceFilter, Instance, InstanceBuilder};

mod device;
pub use device::{Device, DeviceBuilder};

mod queue;
pub use queue::{Queue, QueueBuilder};

mod physical_device;
pub use physical_device::{device_type_rank, DeviceInfo, PhyDeviceProperties, PhysicalDeviceFilter};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::{error::DeviceError, surface::Surface, VkStartError};

///Configuration of the context creation. The defaults match the tutorial: no validation and the first
/// suitable device.
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub application_name: CString,
    pub engine_name: CString,
    pub api_version: u32,
    ///If set, enables the Khronos validation layer and routes its messages to the log.
    pub validation: bool,
    ///If set, discrete GPUs are chosen over integrated ones. Otherwise the first device that
    /// passes all filters is used.
    pub prefer_discrete: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            application_name: Instance::DEFAULT_APPLICATION_NAME.to_owned(),
            engine_name: Instance::DEFAULT_ENGINE_NAME.to_owned(),
            api_version: Instance::DEFAULT_API_VERSION,
            validation: false,
            prefer_discrete: false,
        }
    }
}

impl ContextConfig {
    ///Creates the instance builder described by this config.
    pub fn instance_builder(&self) -> Result<InstanceBuilder, VkStartError> {
        let mut builder = Instance::load()?
            .with_application(self.application_name.clone(), self.engine_name.clone())
            .with_api_version(self.api_version);
        if self.validation {
            builder = builder.enable_validation();
        }
        Ok(builder)
    }
}

///vkstart's Vulkan context. Can either be constructed by hand, or via helper functions.
#[derive(Clone)]
pub struct Ctx {
    ///Vulkan device including associated queues.
    pub device: Arc<Device>,
    ///The initial vulkan instance used for the context.
    pub instance: Arc<Instance>,
    ///Graphics (and, if created for a surface, present) capable queue.
    pub queue: Queue,
}

impl Ctx {
    ///Creates a new context that does not check for any surface availability.
    pub fn new_headless(config: &ContextConfig) -> Result<Self, VkStartError> {
        let instance = config.instance_builder()?.build()?;
        Self::new_from_instance(instance, None, config)
    }

    ///Creates simple context that has only one graphics queue. Creates the instance in a way that
    ///a surface for the provided window handle can be created and returns that surface.
    pub fn new_with_surface<T>(
        window_handle: &T,
        config: &ContextConfig,
    ) -> Result<(Self, Arc<Surface>), VkStartError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = config
            .instance_builder()?
            .for_surface(window_handle)?
            .build()?;

        //create the surface, so we can check for compatible devices in the filter.
        let surface = Arc::new(Surface::new(&instance, window_handle)?);

        let ctx = Self::new_from_instance(instance, Some(&surface), config)?;

        Ok((ctx, surface))
    }

    ///Creates a context from a given instance. This is also the base creation code for
    /// [Self::new_with_surface] and [Self::new_headless].
    ///
    /// Only queue families that can do graphics work (and present to `surface` if given) are created. The swapchain
    /// extension is enabled if a surface is given.
    pub fn new_from_instance(
        instance: Arc<Instance>,
        surface: Option<&Surface>,
        config: &ContextConfig,
    ) -> Result<Self, VkStartError> {
        let all_devices = instance.create_physical_device_filter()?;
        if all_devices.pdevices.is_empty() {
            return Err(DeviceError::NoPhysicalDevice.into());
        }

        #[cfg(feature = "logging")]
        for info in all_devices.describe() {
            log::info!("Found physical device:\n{}", info);
        }

        let mut device_candidates =
            all_devices.filter_queue_flags(ash::vk::QueueFlags::GRAPHICS);
        if let Some(surface) = surface {
            //presentable families might not be graphics capable, so check again.
            device_candidates = device_candidates
                .filter_presentable(&surface.surface_loader, &surface.surface)
                .filter_queue_flags(ash::vk::QueueFlags::GRAPHICS);
        }
        if config.prefer_discrete {
            device_candidates = device_candidates.prefer_discrete();
        }

        let mut device_candidates = device_candidates.release();
        if device_candidates.is_empty() {
            return Err(DeviceError::NoPhysicalDevice.into());
        }

        let chosen = device_candidates.remove(0);
        let graphics_family = chosen
            .first_family_with(ash::vk::QueueFlags::GRAPHICS)
            .ok_or(DeviceError::NoQueueFamily(ash::vk::QueueFlags::GRAPHICS))?;

        #[cfg(feature = "logging")]
        log::info!(
            "Using device {} with queue family {}",
            chosen.describe().name,
            graphics_family
        );

        let mut device_builder = chosen
            .into_device_builder(instance.clone())?
            .retain_queues(|q| q.family_index == graphics_family);

        // only add swapchain extension if we got a surface
        if surface.is_some() {
            device_builder = device_builder.with_extension(ash::khr::swapchain::NAME);
        }
        let device = device_builder.build()?;

        let queue = device
            .get_first_queue_for_family(graphics_family)
            .cloned()
            .ok_or(DeviceError::NoQueueFamily(ash::vk::QueueFlags::GRAPHICS))?;

        Ok(Ctx {
            device,
            instance,
            queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(Ctx: Send, Sync);
        assert_impl_all!(Device: Send, Sync);
        assert_impl_all!(Instance: Send, Sync);
    }

    #[test]
    fn default_config_matches_tutorial() {
        let config = ContextConfig::default();
        assert_eq!(config.application_name.to_str(), Ok("Vulkan Example"));
        assert_eq!(config.engine_name.to_str(), Ok("Vulkan Engine"));
        assert_eq!(
            crate::util::version_triple(config.api_version),
            (1, 0, 3)
        );
        assert!(!config.validation);
        assert!(!config.prefer_discrete);
    }
}
