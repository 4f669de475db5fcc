use std::ffi::CString;

use ash::{vk, LoadingError};
use raw_window_handle::HandleError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Failed to load Vulkan entry point: {0}")]
    EntryLoading(#[from] LoadingError),
    #[error("Cannot find a compatible Vulkan installable client driver (ICD). Please make sure your driver supports Vulkan before continuing.")]
    IncompatibleDriver,
    #[error("Instance extension {0:?} is not available")]
    MissingExtension(CString),
    #[error("Instance layer {0:?} is not available")]
    MissingLayer(CString),
    #[error("Window handle not available: {0}")]
    Handle(#[from] HandleError),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Extension {0} is not supported by device")]
    UnsupportedExtension(String),
    #[error("No physical device found. Is a Vulkan capable GPU and driver installed?")]
    NoPhysicalDevice,
    #[error("Device has no queue family supporting {0:?}")]
    NoQueueFamily(vk::QueueFlags),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Surface reports no supported formats")]
    NoFormats,
    #[error("Surface reports no supported present modes")]
    NoPresentModes,
    #[error("Window handle not available: {0}")]
    Handle(#[from] HandleError),
}

#[derive(Error, Debug)]
pub enum SwapchainError {
    #[error("Swapchain can't have a extent of 0 on either axis, was: {0:?}")]
    ZeroExtent(vk::Extent2D),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

#[derive(Error, Debug)]
pub enum CommandBufferError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Command pool is not resettable")]
    PoolNotResetable,
    #[error("Submitting to queue failed with {0}")]
    SubmitFailed(vk::Result),
    #[error("Failed to allocate command buffer. Requested {count}, got {allocated}")]
    FailedToAllocate { allocated: usize, count: usize },
}

///Window system errors. The platform errors are kept as messages since they are not
/// guaranteed to be sendable.
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Event loop error: {0}")]
    EventLoop(String),
    #[error("Failed to create window: {0}")]
    Creation(String),
}

#[derive(Error, Debug)]
pub enum VkStartError {
    #[error("Instance error: {0}")]
    InstanceError(#[from] InstanceError),
    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),
    #[error("Surface error: {0}")]
    SurfaceError(#[from] SurfaceError),
    #[error("Swapchain error: {0}")]
    SwapchainError(#[from] SwapchainError),
    #[error("CommandBuffer error: {0}")]
    CommandBufferError(#[from] CommandBufferError),
    #[error("Window error: {0}")]
    WindowError(#[from] WindowError),
}

#[cfg(test)]
mod test {
    use static_assertions::assert_impl_all;

    use crate::{
        error::{
            CommandBufferError, DeviceError, InstanceError, SurfaceError, SwapchainError,
            WindowError,
        },
        VkStartError,
    };

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(InstanceError: Send, Sync);
        assert_impl_all!(DeviceError: Send, Sync);
        assert_impl_all!(SurfaceError: Send, Sync);
        assert_impl_all!(SwapchainError: Send, Sync);
        assert_impl_all!(CommandBufferError: Send, Sync);
        assert_impl_all!(WindowError: Send, Sync);
        assert_impl_all!(VkStartError: Send, Sync);
    }

    #[test]
    fn incompatible_driver_mentions_icd() {
        let msg = InstanceError::IncompatibleDriver.to_string();
        assert!(msg.contains("installable client driver"));
    }

    #[test]
    fn errors_convert_into_top_level() {
        let err: VkStartError = DeviceError::NoPhysicalDevice.into();
        assert!(matches!(
            err,
            VkStartError::DeviceError(DeviceError::NoPhysicalDevice)
        ));
        let err: SwapchainError = SurfaceError::NoFormats.into();
        assert!(matches!(err, SwapchainError::Surface(SurfaceError::NoFormats)));
    }
}
