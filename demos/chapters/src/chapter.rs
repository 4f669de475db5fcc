use anyhow::Result;
use vkstart::{
    ash::vk,
    context::{ContextConfig, Ctx, GetDeviceFilter},
    swapchain::Swapchain,
    util::version_triple,
    window::{WindowDesc, WindowSystem, WinitWindowSystem},
    DeviceError,
};
use vkstart_commands::swapchain_images_to_color_attachment;

pub fn instance(config: &ContextConfig) -> Result<()> {
    let instance = config.instance_builder()?.build()?;
    let (major, minor, patch) = version_triple(instance.api_version);
    log::info!(
        "Created instance for Vulkan {}.{}.{} (validation: {})",
        major,
        minor,
        patch,
        instance.validation_enabled()
    );
    Ok(())
}

pub fn devices(config: &ContextConfig) -> Result<()> {
    let instance = config.instance_builder()?.build()?;

    let filter = instance.create_physical_device_filter()?;
    if filter.pdevices.is_empty() {
        return Err(DeviceError::NoPhysicalDevice.into());
    }
    for (idx, info) in filter.describe().into_iter().enumerate() {
        println!("Device [{}]\n{}\n", idx, info);
    }

    let ctx = Ctx::new_from_instance(instance, None, config)?;
    log::info!(
        "Created logical device with a queue of family {}",
        ctx.queue.family_index
    );
    ctx.device.wait_idle();
    Ok(())
}

pub fn window(desc: &WindowDesc) -> Result<()> {
    let mut windows = WinitWindowSystem::new()?;
    let window = windows.create_window(desc)?;
    windows.wait_for_close(&window)?;
    Ok(())
}

pub fn surface(config: &ContextConfig, desc: &WindowDesc) -> Result<()> {
    let mut windows = WinitWindowSystem::new()?;
    let window = windows.create_window(desc)?;

    let (ctx, surface) = Ctx::new_with_surface(&window, config)?;
    let format = surface.select_format(ctx.device.physical_device)?;
    log::info!(
        "Surface format: {:?}, color space: {:?}",
        format.format,
        format.color_space
    );

    windows.wait_for_close(&window)?;
    ctx.device.wait_idle();
    Ok(())
}

pub fn swapchain(config: &ContextConfig, desc: &WindowDesc) -> Result<()> {
    let mut windows = WinitWindowSystem::new()?;
    let window = windows.create_window(desc)?;

    let (ctx, surface) = Ctx::new_with_surface(&window, config)?;

    //the inner size is in physical pixels, which might differ from the requested logical size.
    let size = window.inner_size();
    let swapchain = Swapchain::builder(
        &ctx.device,
        &surface,
        vk::Extent2D {
            width: size.width,
            height: size.height,
        },
    )?
    .build()?;
    log::info!(
        "Created swapchain with {} images of {:?}",
        swapchain.images.len(),
        swapchain.desc.extent
    );

    swapchain_images_to_color_attachment(&ctx.device, &ctx.queue, &swapchain)?;

    windows.wait_for_close(&window)?;
    ctx.device.wait_idle();
    Ok(())
}
