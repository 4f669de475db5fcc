use std::sync::Arc;

use ash::vk;

use crate::{context::Device, error::CommandBufferError};

///Pool command buffers are allocated from. Bound to a single queue family.
pub struct CommandPool {
    pub device: Arc<Device>,
    pub queue_family: u32,
    pub inner: vk::CommandPool,
    ///True if the pool was created with `RESET_COMMAND_BUFFER`, which allows resetting single buffers.
    pub can_reset_buffer: bool,
}

impl CommandPool {
    pub fn new(
        device: &Arc<Device>,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Arc<Self>, CommandBufferError> {
        let inner = unsafe {
            device.inner.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .flags(flags)
                    .queue_family_index(queue_family),
                None,
            )?
        };

        Ok(Arc::new(CommandPool {
            device: device.clone(),
            queue_family,
            inner,
            can_reset_buffer: flags.contains(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
        }))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        //All buffers hold an Arc to the pool, so none is left at this point.
        unsafe { self.device.inner.destroy_command_pool(self.inner, None) }
    }
}

///Something command buffers can be allocated from, reset and freed on.
pub trait CommandBufferAllocator {
    ///Resets `command_buffer`. Fails with [PoolNotResetable](CommandBufferError::PoolNotResetable) if the allocator does not
    /// support resetting single buffers.
    ///
    /// `release_resources` maps to `VK_COMMAND_BUFFER_RESET_RELEASE_RESOURCES_BIT`.
    fn reset(
        &self,
        command_buffer: &vk::CommandBuffer,
        release_resources: bool,
    ) -> Result<(), CommandBufferError>;

    ///Allocates a single command buffer of the given level.
    fn allocate_buffer(
        self,
        level: vk::CommandBufferLevel,
    ) -> Result<CommandBuffer<Self>, CommandBufferError>
    where
        Self: Sized;

    ///Allocates `count` buffers one by one. On failure the error is returned together with the buffers that were
    /// allocated up to that point.
    fn allocate_buffers(
        self,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> Result<Vec<CommandBuffer<Self>>, (CommandBufferError, Vec<CommandBuffer<Self>>)>
    where
        Self: Sized + Clone,
    {
        let mut buffers = Vec::with_capacity(count as usize);
        while buffers.len() < count as usize {
            match self.clone().allocate_buffer(level) {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => return Err((e, buffers)),
            }
        }
        Ok(buffers)
    }

    fn device(&self) -> &ash::Device;
    fn raw(&self) -> &vk::CommandPool;
}

impl CommandBufferAllocator for Arc<CommandPool> {
    fn reset(
        &self,
        command_buffer: &vk::CommandBuffer,
        release_resources: bool,
    ) -> Result<(), CommandBufferError> {
        if !self.can_reset_buffer {
            return Err(CommandBufferError::PoolNotResetable);
        }

        let flags = if release_resources {
            vk::CommandBufferResetFlags::RELEASE_RESOURCES
        } else {
            vk::CommandBufferResetFlags::empty()
        };
        unsafe { self.device.inner.reset_command_buffer(*command_buffer, flags)? };
        Ok(())
    }

    fn allocate_buffer(
        self,
        level: vk::CommandBufferLevel,
    ) -> Result<CommandBuffer<Self>, CommandBufferError> {
        let allocated = unsafe {
            self.device.inner.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.inner)
                    .level(level)
                    .command_buffer_count(1),
            )?
        };

        let inner = allocated
            .first()
            .copied()
            .ok_or(CommandBufferError::FailedToAllocate {
                allocated: 0,
                count: 1,
            })?;

        #[cfg(feature = "logging")]
        log::trace!(
            "Allocated {:?} command buffer {:?} on family {}",
            level,
            inner,
            self.queue_family
        );

        Ok(CommandBuffer { pool: self, inner })
    }

    fn device(&self) -> &ash::Device {
        &self.device.inner
    }

    fn raw(&self) -> &vk::CommandPool {
        &self.inner
    }
}

///Command buffer that is freed on its pool when dropped.
pub struct CommandBuffer<P: CommandBufferAllocator> {
    pub pool: P,
    pub inner: vk::CommandBuffer,
}

impl<P: CommandBufferAllocator> CommandBuffer<P> {
    pub fn reset(&mut self, release_resources: bool) -> Result<(), CommandBufferError> {
        self.pool.reset(&self.inner, release_resources)
    }
}

impl<P: CommandBufferAllocator> Drop for CommandBuffer<P> {
    fn drop(&mut self) {
        unsafe {
            self.pool
                .device()
                .free_command_buffers(*self.pool.raw(), core::slice::from_ref(&self.inner))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(CommandPool: Send, Sync);
        assert_impl_all!(CommandBuffer<Arc<CommandPool>>: Send, Sync);
    }
}
