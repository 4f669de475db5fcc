use std::sync::Arc;

use vkstart::{
    ash::vk,
    context::{Device, Queue},
    resources::{CommandBufferAllocator, CommandPool},
    swapchain::Swapchain,
};

use crate::{BarrierBuilder, LayoutTransition, ManagedCommands, RecordingError};

///Moves every image of `swapchain` from `UNDEFINED` into `COLOR_ATTACHMENT_OPTIMAL`, so that the first frame can render
/// into any of them.
///
///Returns when the transition has finished executing on `queue`.
pub fn swapchain_images_to_color_attachment(
    device: &Arc<Device>,
    queue: &Queue,
    swapchain: &Swapchain,
) -> Result<(), RecordingError> {
    let mut barriers = BarrierBuilder::new();
    for image in swapchain.images.iter() {
        let transition = LayoutTransition::resolve(
            *image,
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )?;
        barriers.image_layout_transition(&transition);
    }

    let command_pool = CommandPool::new(
        device,
        queue.family_index,
        vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
    )?;
    let command_buffer = command_pool.allocate_buffer(vk::CommandBufferLevel::PRIMARY)?;
    let mut cb = ManagedCommands::new(device, command_buffer)?;

    #[cfg(feature = "logging")]
    log::info!(
        "Transitioning {} swapchain images to COLOR_ATTACHMENT_OPTIMAL",
        swapchain.images.len()
    );

    //NOTE: the images are owned by the swapchain, which outlives this function since we wait for execution below.
    let mut recorder = cb.start_recording()?;
    barriers.record(&mut recorder);
    recorder.finish_recording()?;

    cb.submit(device, queue, &[], &[])?;
    cb.wait()?;

    Ok(())
}
