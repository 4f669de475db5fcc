use crate::{error::DeviceError, util};

use super::{DeviceBuilder, QueueBuilder};
use std::{fmt::Display, sync::Arc};

///Human readable summary of a physical device. This is what the device chapter reports for each
/// enumerated GPU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: ash::vk::PhysicalDeviceType,
    pub driver_version: u32,
    ///`(major, minor, patch)` of the supported Vulkan version.
    pub api_version: (u32, u32, u32),
}

impl DeviceInfo {
    pub fn from_properties(properties: &ash::vk::PhysicalDeviceProperties) -> Self {
        DeviceInfo {
            name: util::name_from_raw(&properties.device_name),
            device_type: properties.device_type,
            driver_version: properties.driver_version,
            api_version: util::version_triple(properties.api_version),
        }
    }
}

impl Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Device Name:    {}", self.name)?;
        writeln!(f, "Device Type:    {:?}", self.device_type)?;
        writeln!(f, "Driver Version: {}", self.driver_version)?;
        write!(
            f,
            "API Version:    {}.{}.{}",
            self.api_version.0, self.api_version.1, self.api_version.2
        )
    }
}

///Ranks device types for [PhysicalDeviceFilter::prefer_discrete]. Higher is better.
pub fn device_type_rank(device_type: ash::vk::PhysicalDeviceType) -> u8 {
    match device_type {
        ash::vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        ash::vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        ash::vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        ash::vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

///Collection off all properties for this physical device. Can be used to easily create a [DeviceBuilder](DeviceBuilder).
/// Is usually acquired from a [PhysicalDeviceFilter](PhysicalDeviceFilter), or by using `new`.
pub struct PhyDeviceProperties {
    pub phydev: ash::vk::PhysicalDevice,
    pub properties: ash::vk::PhysicalDeviceProperties,
    pub queue_properties: Vec<(usize, ash::vk::QueueFamilyProperties)>,
}

impl PhyDeviceProperties {
    ///Creates Self from just a physical device definition. Fills in `queue_properties` with all available properties.
    pub fn new(instance: &ash::Instance, physical_device: ash::vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let queues =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        PhyDeviceProperties {
            phydev: physical_device,
            properties,
            queue_properties: queues.into_iter().enumerate().collect(),
        }
    }

    pub fn describe(&self) -> DeviceInfo {
        DeviceInfo::from_properties(&self.properties)
    }

    ///Returns the index of the first remaining queue family that supports `flags`.
    pub fn first_family_with(&self, flags: ash::vk::QueueFlags) -> Option<u32> {
        self.queue_properties
            .iter()
            .find(|(_idx, properties)| properties.queue_flags.contains(flags))
            .map(|(idx, _)| *idx as u32)
    }

    ///creates a device builder for this physical device and its current properties. One queue is
    /// created for each remaining queue family.
    pub fn into_device_builder(
        self,
        instance: Arc<crate::context::Instance>,
    ) -> Result<DeviceBuilder, DeviceError> {
        if self.queue_properties.is_empty() {
            return Err(DeviceError::NoQueueFamily(ash::vk::QueueFlags::empty()));
        }

        Ok(DeviceBuilder {
            instance,
            physical_device: self.phydev,
            queues: self
                .queue_properties
                .into_iter()
                .map(|(idx, properties)| QueueBuilder {
                    family_index: idx as u32,
                    properties,
                    priorities: vec![1.0], //per default create one queue
                })
                .collect(),
            device_extensions: Vec::new(),
            features: ash::vk::PhysicalDeviceFeatures::default(),
        })
    }
}

///Filter that lets you select a sub-set of all physical devices.
/// use [ash::Instance::enumerate_physical_devices](ash::Instance::enumerate_physical_devices) to get a list of all devices
/// and [PhysicalDeviceFilter::new](PhysicalDeviceFilter::new) to create this filter.
pub struct PhysicalDeviceFilter {
    ///All available devices.
    pub pdevices: Vec<PhyDeviceProperties>,
}

impl PhysicalDeviceFilter {
    pub fn new(instance: &ash::Instance, phydevices: Vec<ash::vk::PhysicalDevice>) -> Self {
        PhysicalDeviceFilter {
            pdevices: phydevices
                .into_iter()
                .map(|phy| PhyDeviceProperties::new(instance, phy))
                .collect(),
        }
    }

    ///removes all devices that do not contain the device type bits.
    pub fn filter_type(mut self, dev_type: ash::vk::PhysicalDeviceType) -> Self {
        self.pdevices
            .retain(|dev| dev.properties.device_type == dev_type);
        self
    }

    ///removes all devices that do not contain a queue with the given flags
    pub fn filter_queue_flags(mut self, flags: ash::vk::QueueFlags) -> Self {
        self.pdevices.retain(|dev| {
            dev.queue_properties.iter().any(|(_idx, f)| {
                #[cfg(feature = "logging")]
                log::trace!("Checking {:?} for {:?}", f.queue_flags, flags);
                f.queue_flags.contains(flags)
            })
        });

        self
    }

    ///Custom filter on the cached properties
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: FnMut(&PhyDeviceProperties) -> bool,
    {
        self.pdevices = self.pdevices.into_iter().filter(filter).collect();
        self
    }

    ///Removes all devices and queues that can not present on the supplied surface
    pub fn filter_presentable(
        mut self,
        surface_loader: &ash::khr::surface::Instance,
        surface: &ash::vk::SurfaceKHR,
    ) -> Self {
        self.pdevices = self.pdevices.into_iter().filter_map(|mut pdev|{
            //check each queue if it is presentable, if not filter out queue
            pdev.queue_properties.retain(|(qidx, _queue)| {
                match unsafe{surface_loader.get_physical_device_surface_support(pdev.phydev, *qidx as u32, *surface)}{
                    Ok(res) => res,
                    Err(_e) => {
                        #[cfg(feature="logging")]
                        log::warn!("Failed to query surface capability on queue family {} of physical device {}: {}", qidx, util::name_from_raw(&pdev.properties.device_name), _e);
                        false
                    }
                }
            });
            //Check if any family is left, otherwise remove device completely
            if pdev.queue_properties.is_empty(){
                None
            }else{
                Some(pdev)
            }
        }).collect();
        self
    }

    ///Orders the remaining devices discrete first, then integrated, virtual and CPU devices. The
    /// order within one type is kept.
    pub fn prefer_discrete(mut self) -> Self {
        self.pdevices
            .sort_by_key(|dev| std::cmp::Reverse(device_type_rank(dev.properties.device_type)));
        self
    }

    ///Describes all remaining devices.
    pub fn describe(&self) -> Vec<DeviceInfo> {
        self.pdevices.iter().map(|d| d.describe()).collect()
    }

    ///Releases the current filtered physical devices and queues. You can use [into_device_builder](PhyDeviceProperties::into_device_builder) to start and create an abstract device for these.
    pub fn release(self) -> Vec<PhyDeviceProperties> {
        self.pdevices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    fn properties(name: &[u8], device_type: vk::PhysicalDeviceType) -> vk::PhysicalDeviceProperties {
        let mut properties = vk::PhysicalDeviceProperties {
            device_type,
            driver_version: 42,
            api_version: vk::make_api_version(0, 1, 3, 275),
            ..Default::default()
        };
        for (dst, src) in properties.device_name.iter_mut().zip(name.iter()) {
            *dst = *src as std::ffi::c_char;
        }
        properties
    }

    fn phydev(
        device_type: vk::PhysicalDeviceType,
        families: &[vk::QueueFlags],
    ) -> PhyDeviceProperties {
        PhyDeviceProperties {
            phydev: vk::PhysicalDevice::null(),
            properties: properties(b"Test GPU", device_type),
            queue_properties: families
                .iter()
                .map(|flags| vk::QueueFamilyProperties {
                    queue_flags: *flags,
                    queue_count: 1,
                    ..Default::default()
                })
                .enumerate()
                .collect(),
        }
    }

    #[test]
    fn device_report() {
        let info = DeviceInfo::from_properties(&properties(
            b"Test GPU",
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ));
        assert_eq!(info.name, "Test GPU");
        assert_eq!(info.api_version, (1, 3, 275));
        assert_eq!(
            info.to_string(),
            "Device Name:    Test GPU\nDevice Type:    DISCRETE_GPU\nDriver Version: 42\nAPI Version:    1.3.275"
        );
    }

    #[test]
    fn queue_filter_and_family_lookup() {
        let filter = PhysicalDeviceFilter {
            pdevices: vec![
                phydev(vk::PhysicalDeviceType::CPU, &[vk::QueueFlags::TRANSFER]),
                phydev(
                    vk::PhysicalDeviceType::INTEGRATED_GPU,
                    &[vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE],
                ),
            ],
        }
        .filter_queue_flags(vk::QueueFlags::GRAPHICS);

        let devices = filter.release();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].first_family_with(vk::QueueFlags::GRAPHICS), Some(1));
        assert_eq!(devices[0].first_family_with(vk::QueueFlags::COMPUTE), Some(0));
        assert_eq!(devices[0].first_family_with(vk::QueueFlags::SPARSE_BINDING), None);
    }

    #[test]
    fn discrete_devices_first() {
        let filter = PhysicalDeviceFilter {
            pdevices: vec![
                phydev(vk::PhysicalDeviceType::CPU, &[vk::QueueFlags::GRAPHICS]),
                phydev(vk::PhysicalDeviceType::INTEGRATED_GPU, &[vk::QueueFlags::GRAPHICS]),
                phydev(vk::PhysicalDeviceType::DISCRETE_GPU, &[vk::QueueFlags::GRAPHICS]),
            ],
        }
        .prefer_discrete();

        let types = filter
            .describe()
            .into_iter()
            .map(|d| d.device_type)
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                vk::PhysicalDeviceType::DISCRETE_GPU,
                vk::PhysicalDeviceType::INTEGRATED_GPU,
                vk::PhysicalDeviceType::CPU
            ]
        );
    }

    #[test]
    fn type_filter() {
        let filter = PhysicalDeviceFilter {
            pdevices: vec![
                phydev(vk::PhysicalDeviceType::CPU, &[vk::QueueFlags::GRAPHICS]),
                phydev(vk::PhysicalDeviceType::DISCRETE_GPU, &[vk::QueueFlags::GRAPHICS]),
            ],
        }
        .filter_type(vk::PhysicalDeviceType::DISCRETE_GPU);
        assert_eq!(filter.pdevices.len(), 1);
    }
}
