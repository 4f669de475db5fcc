use super::{Queue, QueueBuilder};
use crate::{error::DeviceError, util};
use std::{ffi::CStr, sync::Arc};

///Helper that lets you setup device properties and possibly needed extensions before creating the actual
/// device.
pub struct DeviceBuilder {
    ///Instance based on which the device is creates
    pub instance: Arc<crate::context::Instance>,
    ///The physical device from which this will be an abstraction
    pub physical_device: ash::vk::PhysicalDevice,
    ///Queue family index, and properties of all queues that will be created.
    pub queues: Vec<QueueBuilder>,
    pub features: ash::vk::PhysicalDeviceFeatures,

    ///List of device extensions that are enabled. The name is usually obtained via `ash::khr::swapchain::NAME`.
    pub device_extensions: Vec<&'static CStr>,
}

impl DeviceBuilder {
    ///Checks that all device extensions are supported.
    fn check_extensions(&self) -> Result<(), DeviceError> {
        let all_supported = unsafe {
            self.instance
                .inner
                .enumerate_device_extension_properties(self.physical_device)?
        };

        #[cfg(feature = "logging")]
        {
            log::trace!("Supported extensions");
            for ext in all_supported.iter() {
                log::trace!("  {}", util::name_from_raw(&ext.extension_name));
            }
        }

        for ext in self.device_extensions.iter() {
            if !all_supported
                .iter()
                .any(|supported| util::raw_name_eq(&supported.extension_name, ext))
            {
                return Err(DeviceError::UnsupportedExtension(
                    ext.to_string_lossy().into_owned(),
                ));
            }
        }

        Ok(())
    }

    ///Allows changing `self` builder style
    pub fn with(mut self, mut mapping: impl FnMut(&mut DeviceBuilder)) -> Self {
        mapping(&mut self);
        self
    }

    ///Pushes the new extension. The name is usually obtained from the extensions definition like this:
    ///```ignore
    ///  builder.with_extension(ash::khr::swapchain::NAME);
    ///```
    /// Pushing an extension twice has no effect.
    pub fn with_extension(mut self, ext_name: &'static CStr) -> Self {
        if !self.device_extensions.contains(&ext_name) {
            self.device_extensions.push(ext_name);
        }
        self
    }

    ///Only keeps the queue families for which `keep` returns true.
    pub fn retain_queues(mut self, keep: impl FnMut(&QueueBuilder) -> bool) -> Self {
        self.queues.retain(keep);
        self
    }

    pub fn build(self) -> Result<Arc<Device>, DeviceError> {
        //before starting anything, check that the extensions are supported
        self.check_extensions()?;

        let DeviceBuilder {
            instance,
            physical_device,
            queues,
            features,
            device_extensions,
        } = self;

        let queue_create_infos = queues
            .iter()
            .map(|q| q.as_create_info())
            .collect::<Vec<_>>();

        let extension_ptrs = device_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect::<Vec<_>>();

        #[cfg(feature = "logging")]
        {
            log::info!("Device creation:");
            log::info!("  Queue families: {:?}", queues.iter().map(|q| q.family_index).collect::<Vec<_>>());
            log::info!("  Extensions: {:?}", device_extensions);
        }

        //NOTE: according to the vulkan doc device layers are deprecated. We therefore don't expose
        //anything related to that.
        let create_info = ash::vk::DeviceCreateInfo::default()
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features)
            .queue_create_infos(&queue_create_infos);

        unsafe { Device::new_from_info(instance, physical_device, &create_info, &queues) }
    }
}

///Thin device abstraction that keeps the underlying instance (and therefore entrypoint) alive.
/// and takes care of device destruction once its dropped.
///
/// # Safety and self creation
/// Since the struct is completely public it is possible to create a device "on your own". In that case you'll have to make sure
/// that the instance is associated with the device and the queues actually exist.
pub struct Device {
    ///The raw ash device
    pub inner: ash::Device,
    pub instance: Arc<crate::context::Instance>,
    pub physical_device: ash::vk::PhysicalDevice,
    pub queues: Vec<Queue>,
}

impl Device {
    ///Mini helper function that creates the device from an already created instance and physical device, using
    /// the supplied device and creation infos.
    /// The function assumes that device and queues can be created from the device. No additional checking is done.
    ///
    /// # Safety
    /// The queue families of `queue_builder` have to exist in that way on the physical device, and enabled
    /// extensions in `device_create_info` have to be supported.
    pub unsafe fn new_from_info(
        instance: Arc<crate::context::Instance>,
        physical_device: ash::vk::PhysicalDevice,
        device_create_info: &ash::vk::DeviceCreateInfo<'_>,
        queue_builder: &[QueueBuilder],
    ) -> Result<Arc<Self>, DeviceError> {
        let device = instance
            .inner
            .create_device(physical_device, device_create_info, None)?;

        //now setup the queues for the infos we prepared before
        let queues = queue_builder
            .iter()
            .flat_map(|queue_family| {
                (0..queue_family.priorities.len()).map(|queue_index| Queue {
                    family_index: queue_family.family_index,
                    properties: queue_family.properties,
                    inner: device.get_device_queue(queue_family.family_index, queue_index as u32),
                })
            })
            .collect();

        Ok(Arc::new(Device {
            inner: device,
            instance,
            physical_device,
            queues,
        }))
    }

    ///Returns the first queue for the given family, if there is any.
    pub fn get_first_queue_for_family(&self, family: u32) -> Option<&Queue> {
        self.queues.iter().find(|q| q.family_index == family)
    }

    ///Returns the first queue whose family supports `flags`.
    pub fn first_queue_with(&self, flags: ash::vk::QueueFlags) -> Option<&Queue> {
        self.queues
            .iter()
            .find(|q| q.properties.queue_flags.contains(flags))
    }

    ///Blocks until the device is idle. Errors are logged and otherwise ignored, since this is mostly used before tearing
    /// things down.
    pub fn wait_idle(&self) {
        if let Err(_e) = unsafe { self.inner.device_wait_idle() } {
            #[cfg(feature = "logging")]
            log::error!("Failed to wait for device idle: {}", _e);
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.inner.destroy_device(None) };
    }
}
