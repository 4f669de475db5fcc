use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::SurfaceError;

///Format used if the surface has no preference, which it signals by reporting a single `UNDEFINED` format.
pub const FALLBACK_SURFACE_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;

///Selects the color format and color space a swapchain for this surface should use.
///
/// If the surface reports exactly one format which is `UNDEFINED`, there is no preferred format and
/// [FALLBACK_SURFACE_FORMAT] is used. Otherwise the first reported format is used. The color space is always taken
/// from the first entry.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, SurfaceError> {
    let first = formats.first().ok_or(SurfaceError::NoFormats)?;
    let format = if formats.len() == 1 && first.format == vk::Format::UNDEFINED {
        FALLBACK_SURFACE_FORMAT
    } else {
        first.format
    };

    Ok(vk::SurfaceFormatKHR {
        format,
        color_space: first.color_space,
    })
}

///Returns the extent in `capabilities`, or `None` if the surface leaves the extent up to the swapchain.
pub fn defined_extent(capabilities: &vk::SurfaceCapabilitiesKHR) -> Option<vk::Extent2D> {
    match capabilities.current_extent {
        vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        }
        | vk::Extent2D {
            width: 0,
            height: 0,
        } => None,
        extent => Some(extent),
    }
}

///using [ash-window](https://crates.io/crates/ash-window) to safely find a surface for a given window
/// handle. Also keeps the instance alive long enough to destroy the created surface in time.
pub struct Surface {
    ///keeps the surface alive
    pub instance: Arc<crate::context::Instance>,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    pub fn new<T>(
        instance: &Arc<crate::context::Instance>,
        window_handle: &T,
    ) -> Result<Self, SurfaceError>
    where
        T: HasWindowHandle + HasDisplayHandle + ?Sized,
    {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.inner,
                window_handle.display_handle()?.as_raw(),
                window_handle.window_handle()?.as_raw(),
                None,
            )?
        };
        let surface_loader = ash::khr::surface::Instance::new(&instance.entry, &instance.inner);

        #[cfg(feature = "logging")]
        log::info!("Created surface {:?}", surface);

        Ok(Surface {
            instance: instance.clone(),
            surface,
            surface_loader,
        })
    }

    pub fn get_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR, SurfaceError> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)?
        })
    }

    pub fn get_formats(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::SurfaceFormatKHR>, SurfaceError> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(physical_device, self.surface)?
        })
    }

    pub fn get_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>, SurfaceError> {
        Ok(unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)?
        })
    }

    ///Queries the formats of this surface and selects one via [choose_surface_format].
    pub fn select_format(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceFormatKHR, SurfaceError> {
        let formats = self.get_formats(physical_device)?;
        let chosen = choose_surface_format(&formats)?;

        #[cfg(feature = "logging")]
        log::info!(
            "Surface reports {} format(s), using {:?} in {:?}",
            formats.len(),
            chosen.format,
            chosen.color_space
        );

        Ok(chosen)
    }

    ///Tries to read the current surface extent. Returns `None` if the extent is determined by the swapchain, which is
    /// the case on some platforms (like Linux+Wayland).
    /// Note that this can be different than the swapchain extent, for instance right after a resize.
    pub fn get_current_extent(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Option<vk::Extent2D>, SurfaceError> {
        let capabilities = self.get_capabilities(physical_device)?;
        Ok(defined_extent(&capabilities))
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(SurfaceError::NoFormats)
        ));
    }

    #[test]
    fn single_undefined_falls_back() {
        let chosen = choose_surface_format(&[format(
            vk::Format::UNDEFINED,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )])
        .unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn first_format_wins() {
        let chosen = choose_surface_format(&[
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ])
        .unwrap();
        assert_eq!(
            chosen,
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT)
        );
    }

    #[test]
    fn undefined_among_others_is_kept() {
        let chosen = choose_surface_format(&[
            format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ])
        .unwrap();
        assert_eq!(chosen.format, vk::Format::UNDEFINED);
    }

    #[test]
    fn special_extents_are_undefined() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            ..Default::default()
        };
        assert_eq!(defined_extent(&caps), None);
        caps.current_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        assert_eq!(defined_extent(&caps), None);
        caps.current_extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        assert_eq!(
            defined_extent(&caps),
            Some(vk::Extent2D {
                width: 1280,
                height: 720
            })
        );
    }
}
