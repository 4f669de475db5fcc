//! # Synchronisation
//!
//! vkstart uses a thin wrapper around Vulkan's native synchronisation primitives. There are mainly
//! - memory barriers: recorded into a command buffer, they define memory state transitions. See the `vkstart-commands`
//!   crate for their construction.
//! - semaphores: synchronise work between queue operations on the GPU, for instance "image acquired" before "render to
//!   image" before "present image".
//! - fences: let the host wait for a queue submission to finish.
//!
//! The tutorial targets Vulkan 1.0, therefore only binary semaphores are wrapped.
use crate::context::Device;
use std::sync::Arc;

///Single binary semaphore.
pub struct Semaphore {
    pub inner: ash::vk::Semaphore,
    pub device: Arc<Device>,
}

impl Semaphore {
    pub fn new(device: &Arc<Device>) -> Result<Arc<Self>, ash::vk::Result> {
        let semaphore = unsafe {
            device
                .inner
                .create_semaphore(&ash::vk::SemaphoreCreateInfo::default(), None)?
        };

        Ok(Arc::new(Semaphore {
            inner: semaphore,
            device: device.clone(),
        }))
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_semaphore(self.inner, None);
        }
    }
}

///Host-device synchronisation primitive. Gets signaled when the submission it was passed to has finished.
pub struct Fence {
    pub inner: ash::vk::Fence,
    pub device: Arc<Device>,
}

impl Fence {
    ///Creates a new fence. If `signaled` is set the first [wait](Fence::wait) returns immediately.
    pub fn new(device: &Arc<Device>, signaled: bool) -> Result<Arc<Self>, ash::vk::Result> {
        let flags = if signaled {
            ash::vk::FenceCreateFlags::SIGNALED
        } else {
            ash::vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            device
                .inner
                .create_fence(&ash::vk::FenceCreateInfo::default().flags(flags), None)?
        };

        Ok(Arc::new(Fence {
            inner: fence,
            device: device.clone(),
        }))
    }

    ///Blocks until the fence is signaled, or `timeout` (in nanoseconds) has passed.
    pub fn wait(&self, timeout: u64) -> Result<(), ash::vk::Result> {
        unsafe {
            self.device
                .inner
                .wait_for_fences(core::slice::from_ref(&self.inner), true, timeout)
        }
    }

    ///Resets the fence to the unsignaled state.
    pub fn reset(&self) -> Result<(), ash::vk::Result> {
        unsafe {
            self.device
                .inner
                .reset_fences(core::slice::from_ref(&self.inner))
        }
    }

    ///Returns true if the fence is signaled.
    pub fn get_status(&self) -> Result<bool, ash::vk::Result> {
        unsafe { self.device.inner.get_fence_status(self.inner) }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.inner.destroy_fence(self.inner, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(Semaphore: Send, Sync);
        assert_impl_all!(Fence: Send, Sync);
    }
}
