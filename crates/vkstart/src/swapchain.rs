use std::sync::Arc;

use ash::vk;
use smallvec::SmallVec;

use crate::{
    context::Device,
    error::{SurfaceError, SwapchainError},
    surface::{defined_extent, Surface},
    sync::Semaphore,
};

///How the swapchain images are shared between queue families.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SharingMode {
    Exclusive,
    Concurrent {
        ///The queue family indices of families that can access the image concurrently.
        queue_family_indices: SmallVec<[u32; 4]>,
    },
}

///Number of images to request. One more than the minimum, so the application does not have to wait on the presentation
/// engine, clamped to the maximum. A maximum of 0 means "no limit".
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

///Returns the extent the swapchain has to use. If the surface dictates an extent that one is used, otherwise `requested`
/// (usually the window's size) is clamped into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if let Some(extent) = defined_extent(capabilities) {
        return extent;
    }

    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities
                .max_image_extent
                .width
                .max(capabilities.min_image_extent.width),
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities
                .max_image_extent
                .height
                .max(capabilities.min_image_extent.height),
        ),
    }
}

///Returns the first mode of `preference` that is supported. Falls back to FIFO, which every implementation has to support,
/// and after that to the first supported mode.
pub fn choose_present_mode(
    preference: &[vk::PresentModeKHR],
    supported: &[vk::PresentModeKHR],
) -> Option<vk::PresentModeKHR> {
    preference
        .iter()
        .find(|mode| supported.contains(mode))
        .or_else(|| supported.iter().find(|mode| **mode == vk::PresentModeKHR::FIFO))
        .or_else(|| supported.first())
        .copied()
}

///Returns `count` elements, reusing the leading ones of `current` and creating the missing ones with `create`.
fn resized<T: Clone, E>(
    current: &[T],
    count: usize,
    mut create: impl FnMut() -> Result<T, E>,
) -> Result<Vec<T>, E> {
    let mut resized = Vec::with_capacity(count);
    resized.extend(current.iter().take(count).cloned());
    while resized.len() < count {
        resized.push(create()?);
    }
    Ok(resized)
}

///Everything needed to (re)create a swapchain for a surface.
#[derive(Clone, Debug)]
pub struct SwapchainDesc {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub image_count: u32,
    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: SharingMode,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub is_clipped: bool,
}

impl SwapchainDesc {
    pub fn as_create_info<'a>(
        &'a self,
        surface: vk::SurfaceKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> vk::SwapchainCreateInfoKHR<'a> {
        let info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(self.image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(self.extent)
            .image_array_layers(self.array_layers)
            .image_usage(self.usage)
            .pre_transform(self.transform)
            .composite_alpha(self.composite_alpha)
            .present_mode(self.present_mode)
            .clipped(self.is_clipped)
            .old_swapchain(old_swapchain);

        match &self.sharing_mode {
            SharingMode::Exclusive => info.image_sharing_mode(vk::SharingMode::EXCLUSIVE),
            SharingMode::Concurrent {
                queue_family_indices,
            } => info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(queue_family_indices),
        }
    }
}

pub struct SwapchainBuilder {
    ///Surface based on which the swapchain will be build.
    pub surface: Arc<Surface>,
    ///Device for which the swapchain will be build.
    pub device: Arc<Device>,

    ///Color format and color space of the images.
    pub format: vk::SurfaceFormatKHR,
    ///Ordered list of preferred present modes. If none of those are present FIFO is used.
    pub present_mode_preference: Vec<vk::PresentModeKHR>,

    pub image_count: u32,

    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: SharingMode,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub is_clipped: bool,
}

impl SwapchainBuilder {
    pub fn build(self) -> Result<Swapchain, SwapchainError> {
        if self.extent.width == 0 || self.extent.height == 0 {
            return Err(SwapchainError::ZeroExtent(self.extent));
        }

        let supported_modes = self.surface.get_present_modes(self.device.physical_device)?;
        let present_mode = choose_present_mode(&self.present_mode_preference, &supported_modes)
            .ok_or(SurfaceError::NoPresentModes)?;

        let desc = SwapchainDesc {
            format: self.format,
            present_mode,
            image_count: self.image_count,
            extent: self.extent,
            array_layers: self.array_layers,
            usage: self.usage,
            sharing_mode: self.sharing_mode,
            transform: self.transform,
            composite_alpha: self.composite_alpha,
            is_clipped: self.is_clipped,
        };

        #[cfg(feature = "logging")]
        log::info!("Creating swapchain: {:#?}", desc);

        let loader = ash::khr::swapchain::Device::new(&self.device.instance.inner, &self.device.inner);
        let swapchain = unsafe {
            loader.create_swapchain(
                &desc.as_create_info(self.surface.surface, vk::SwapchainKHR::null()),
                None,
            )?
        };

        let (images, views) = match Swapchain::images_and_views(&self.device, &loader, swapchain, &desc) {
            Ok(iv) => iv,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        let acquire_semaphore = resized(&[], images.len(), || Semaphore::new(&self.device));
        let render_finished_semaphore =
            resized(&[], images.len(), || Semaphore::new(&self.device));
        let (acquire_semaphore, render_finished_semaphore) =
            match (acquire_semaphore, render_finished_semaphore) {
                (Ok(acquire), Ok(finished)) => (acquire, finished),
                (Err(e), _) | (_, Err(e)) => {
                    for view in views {
                        unsafe { self.device.inner.destroy_image_view(view, None) };
                    }
                    unsafe { loader.destroy_swapchain(swapchain, None) };
                    return Err(e.into());
                }
            };

        Ok(Swapchain {
            loader,
            swapchain,
            surface: self.surface,
            device: self.device,
            desc,
            images,
            views,
            acquire_semaphore,
            render_finished_semaphore,
            next_semaphore: 0,
        })
    }

    ///Moves `mode` to the front of the preference list.
    fn prefer_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.present_mode_preference.retain(|m| *m != mode);
        self.present_mode_preference.insert(0, mode);
        self
    }

    ///Prefers FIFO_RELAXED presentation, which falls back to FIFO.
    pub fn with_vsync(self) -> Self {
        self.prefer_present_mode(vk::PresentModeKHR::FIFO_RELAXED)
    }

    ///Tries to prefer immediate presentation.
    pub fn with_immediate_present(self) -> Self {
        self.prefer_present_mode(vk::PresentModeKHR::IMMEDIATE)
    }

    ///enables you to chain multiple assignments to a constructed builder. For instance
    ///
    ///```ignore
    /// builder.with(|b| b.usage |= ash::vk::ImageUsageFlags::TRANSFER_DST)
    ///    .with(|b| b.is_clipped = true)
    ///    .build()?;
    ///```
    pub fn with<FILTER>(mut self, mut filter: FILTER) -> Self
    where
        FILTER: FnMut(&mut Self),
    {
        filter(&mut self);
        self
    }
}

///An acquired swapchain image and the primitives needed to render to and present it.
pub struct SwapchainImage {
    ///The actual image, owned by the swapchain.
    pub image: vk::Image,
    ///Color view of `image`.
    pub view: vk::ImageView,
    ///Index identifying the image when presenting
    pub index: u32,
    ///Semaphore that gets signaled when the image was acquired. Work writing to the image should wait for it.
    pub sem_acquire: Arc<Semaphore>,
    ///Semaphore that is signaled when this image is ready for present. Should be signaled by the commandbuffer
    /// that is writing to the image.
    pub sem_present: Arc<Semaphore>,
}

pub struct Swapchain {
    pub loader: ash::khr::swapchain::Device,
    pub swapchain: vk::SwapchainKHR,
    ///associated surface. Needed to keep the surface alive until the swapchain is dropped.
    pub surface: Arc<Surface>,
    pub device: Arc<Device>,
    ///Description the current swapchain was created from. Used when recreating.
    pub desc: SwapchainDesc,

    ///all images of the swapchain.
    pub images: Vec<vk::Image>,
    ///One color view per image, in the same order.
    pub views: Vec<vk::ImageView>,
    //NOTE: Hidden, since those are fully managed by this struct.
    acquire_semaphore: Vec<Arc<Semaphore>>,
    render_finished_semaphore: Vec<Arc<Semaphore>>,
    next_semaphore: usize,
}

impl Swapchain {
    ///Creates a new swapchain builder where all fields are set either with defaults, or data obtained from surface capabilities.
    ///
    /// `requested_extent` is used if the surface does not dictate an extent itself, which is the case on Wayland for instance.
    /// Usually this is the window's inner size.
    pub fn builder(
        device: &Arc<Device>,
        surface: &Arc<Surface>,
        requested_extent: vk::Extent2D,
    ) -> Result<SwapchainBuilder, SwapchainError> {
        let format = surface.select_format(device.physical_device)?;
        let capabilities = surface.get_capabilities(device.physical_device)?;

        let composite_alpha = [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::INHERIT,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        ]
        .into_iter()
        .find(|alpha| capabilities.supported_composite_alpha.contains(*alpha))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE);

        Ok(SwapchainBuilder {
            surface: surface.clone(),
            device: device.clone(),
            format,
            present_mode_preference: vec![vk::PresentModeKHR::FIFO],
            image_count: choose_image_count(&capabilities),
            extent: choose_extent(&capabilities, requested_extent),
            array_layers: 1,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            sharing_mode: SharingMode::Exclusive,
            transform: if capabilities
                .supported_transforms
                .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
            {
                vk::SurfaceTransformFlagsKHR::IDENTITY
            } else {
                capabilities.current_transform
            },
            composite_alpha,
            is_clipped: true,
        })
    }

    fn images_and_views(
        device: &Arc<Device>,
        loader: &ash::khr::swapchain::Device,
        swapchain: vk::SwapchainKHR,
        desc: &SwapchainDesc,
    ) -> Result<(Vec<vk::Image>, Vec<vk::ImageView>), vk::Result> {
        let images = unsafe { loader.get_swapchain_images(swapchain)? };
        let mut views = Vec::with_capacity(images.len());
        for image in images.iter() {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(desc.format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            match unsafe { device.inner.create_image_view(&create_info, None) } {
                Ok(view) => views.push(view),
                Err(e) => {
                    for view in views {
                        unsafe { device.inner.destroy_image_view(view, None) };
                    }
                    return Err(e);
                }
            }
        }

        Ok((images, views))
    }

    ///Retrieves the next image that should be written to. Note that all required information (acquire semaphore and
    /// a semaphore to be signaled when finished rendering) is included in that image.
    pub fn acquire_next_image(&mut self) -> Result<SwapchainImage, SwapchainError> {
        let acquire_semaphore = self.acquire_semaphore[self.next_semaphore].clone();
        let present_semaphore = self.render_finished_semaphore[self.next_semaphore].clone();
        self.next_semaphore = (self.next_semaphore + 1) % self.acquire_semaphore.len();

        let (index, is_suboptimal) = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                acquire_semaphore.inner,
                vk::Fence::null(),
            )?
        };

        if is_suboptimal {
            #[cfg(feature = "logging")]
            log::warn!("Acquired image is suboptimal!");
        }

        Ok(SwapchainImage {
            image: self.images[index as usize],
            view: self.views[index as usize],
            index,
            sem_acquire: acquire_semaphore,
            sem_present: present_semaphore,
        })
    }

    ///Recreates the swapchain with the same settings it was created from, but for `extent`. The old swapchain is passed
    /// to the driver as `old_swapchain` and destroyed after the new one was created successfully.
    pub fn recreate(&mut self, extent: vk::Extent2D) -> Result<(), SwapchainError> {
        if extent.width == 0 || extent.height == 0 {
            return Err(SwapchainError::ZeroExtent(extent));
        }

        let mut desc = self.desc.clone();
        desc.extent = extent;

        let new_swapchain = unsafe {
            self.loader
                .create_swapchain(&desc.as_create_info(self.surface.surface, self.swapchain), None)?
        };

        let (images, views) =
            match Self::images_and_views(&self.device, &self.loader, new_swapchain, &desc) {
                Ok(iv) => iv,
                Err(e) => {
                    unsafe { self.loader.destroy_swapchain(new_swapchain, None) };
                    return Err(e.into());
                }
            };

        //The driver may hand out a different number of images, one semaphore pair is needed per image.
        let acquire_semaphore = resized(&self.acquire_semaphore, images.len(), || {
            Semaphore::new(&self.device)
        });
        let render_finished_semaphore = resized(&self.render_finished_semaphore, images.len(), || {
            Semaphore::new(&self.device)
        });
        let (acquire_semaphore, render_finished_semaphore) =
            match (acquire_semaphore, render_finished_semaphore) {
                (Ok(acquire), Ok(finished)) => (acquire, finished),
                (Err(e), _) | (_, Err(e)) => {
                    for view in views {
                        unsafe { self.device.inner.destroy_image_view(view, None) };
                    }
                    unsafe { self.loader.destroy_swapchain(new_swapchain, None) };
                    return Err(e.into());
                }
            };

        self.destroy_views();
        unsafe { self.loader.destroy_swapchain(self.swapchain, None) };

        self.swapchain = new_swapchain;
        self.images = images;
        self.views = views;
        self.desc = desc;
        self.acquire_semaphore = acquire_semaphore;
        self.render_finished_semaphore = render_finished_semaphore;
        self.next_semaphore = 0;

        #[cfg(feature = "logging")]
        log::info!("Recreated swapchain for {:?}", extent);

        Ok(())
    }

    ///Will enqueue a present command for `image`. It will wait for `image.sem_present`. An error is returned
    /// if the swapchain failed to present the image for some reason. Usually this means that either the surface size
    /// has changed, or that the window's surface is lost.
    pub fn present_image(&self, image: SwapchainImage, queue: &vk::Queue) -> ash::prelude::VkResult<()> {
        let present_info = vk::PresentInfoKHR::default()
            .swapchains(core::slice::from_ref(&self.swapchain))
            .image_indices(core::slice::from_ref(&image.index))
            .wait_semaphores(core::slice::from_ref(&image.sem_present.inner));

        match unsafe { self.loader.queue_present(*queue, &present_info) } {
            Ok(true) => {
                #[cfg(feature = "logging")]
                log::warn!("Suboptimal image on present. returning error");
                Err(vk::Result::SUBOPTIMAL_KHR)
            }
            Ok(false) => Ok(()),
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("Error while presenting image: {}", e);
                Err(e)
            }
        }
    }

    fn destroy_views(&mut self) {
        for view in self.views.drain(..) {
            unsafe { self.device.inner.destroy_image_view(view, None) };
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
