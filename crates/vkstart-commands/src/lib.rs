//! # vkstart-commands
//!
//! Command recording on top of [CommandBuffer][vkstart::resources::CommandBuffer]. The main parts are
//!
//! - [ManagedCommands] and its [Recorder]: records commands and captures all resources they need until the fence of the
//!   submission is signaled.
//! - [BarrierRecorder]: the one operation the layout transitions need from a command buffer. Implemented by [Recorder],
//!   [RawRecorder] and whatever a test wants to observe.
//! - the [layout] module which decides the access masks of an image layout transition and records the barrier.
//! - [BarrierBuilder] which batches several barriers into one `vkCmdPipelineBarrier`.

use std::{any::Any, sync::Arc};

use thiserror::Error;
use vkstart::ash::{self, vk};
use vkstart::{
    context::{Device, Queue},
    resources::{CommandBuffer, CommandBufferAllocator},
    sync::{Fence, Semaphore},
    CommandBufferError,
};

mod barrier_builder;
pub use barrier_builder::BarrierBuilder;

pub mod layout;
pub use layout::{transition_image_layout, LayoutTransition, LayoutTransitionError, TransitionLayout};

mod swapchain_init;
pub use swapchain_init::swapchain_images_to_color_attachment;

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Command buffer error: {0}")]
    CommandBuffer(#[from] CommandBufferError),
    #[error("Layout transition error: {0}")]
    Layout(#[from] LayoutTransitionError),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

///Anything a pipeline barrier can be recorded into.
pub trait BarrierRecorder {
    ///Records a `vkCmdPipelineBarrier` with the given stages and barriers.
    fn pipeline_barrier(
        &mut self,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_memory_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_memory_barriers: &[vk::ImageMemoryBarrier<'_>],
    );
}

///Records directly into a raw command buffer. Use this if the command buffer is not managed by [ManagedCommands].
pub struct RawRecorder<'a> {
    pub device: &'a ash::Device,
    pub command_buffer: vk::CommandBuffer,
}

impl<'a> RawRecorder<'a> {
    /// # Safety
    ///
    /// `command_buffer` has to be allocated from `device` and in the recording state for as long as this
    /// recorder is used.
    pub unsafe fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        RawRecorder {
            device,
            command_buffer,
        }
    }
}

impl BarrierRecorder for RawRecorder<'_> {
    fn pipeline_barrier(
        &mut self,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_memory_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_memory_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                memory_barriers,
                buffer_memory_barriers,
                image_memory_barriers,
            )
        }
    }
}

///A resource kept alive until the command buffer that uses it has finished.
pub type Captured = Box<dyn Any + Send + 'static>;

///Wrapper around the [CommandBuffer](vkstart::resources::CommandBuffer)
/// that tracks used resources lifetimes.
pub struct ManagedCommands<P: CommandBufferAllocator> {
    ///Associated command buffer
    pub inner: CommandBuffer<P>,
    ///All resources needed for the current `inner` command buffer to be valid.
    pub resources: Vec<Captured>,
    ///Associated fence that represents the `in use` state on the gpu.
    pub fence: Arc<Fence>,
    ///True between a successful submit and the next wait on `fence`.
    in_flight: bool,
}

///Only a submission that reached the queue signals the fence. A fence that got reset for a failed submit stays
/// unsignaled forever, so waiting on it would never return.
fn needs_wait(in_flight: bool, fence_status: Result<bool, vk::Result>) -> bool {
    in_flight && !matches!(fence_status, Ok(true))
}

impl<P: CommandBufferAllocator> ManagedCommands<P> {
    ///Creates a new ManagedCommands instance from a command buffer. Assumes that the command buffer is resetable. Otherwise
    /// [Recorder] creation fails.
    pub fn new(device: &Arc<Device>, command_buffer: CommandBuffer<P>) -> Result<Self, RecordingError> {
        Ok(ManagedCommands {
            inner: command_buffer,
            resources: Vec::new(),
            fence: Fence::new(device, true)?,
            in_flight: false,
        })
    }

    ///waits for the execution fence to get signaled. Returns immediately if nothing was submitted since the last wait.
    pub fn wait(&mut self) -> Result<(), vk::Result> {
        if needs_wait(self.in_flight, self.fence.get_status()) {
            self.fence.wait(u64::MAX)?;
        }
        self.in_flight = false;
        Ok(())
    }

    ///Starts recording a new command buffer. Might block until any execution of this command buffer has finished.
    ///
    /// If you want prevent blocking, use `wait`.
    pub fn start_recording(&mut self) -> Result<Recorder<'_, P>, RecordingError> {
        self.wait()?;
        //Execution finished, so nothing needs the captured resources anymore.
        self.resources.clear();

        self.inner.reset(true)?;

        unsafe {
            self.inner.pool.device().begin_command_buffer(
                self.inner.inner,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?
        };

        Ok(Recorder {
            buffer: self,
            has_finished_recording: false,
        })
    }

    ///Submits the recorded commands to `queue`.
    ///
    /// Execution starts once all `wait_semaphores` are signaled, each waited on at the supplied stage.
    /// `signal_semaphores` will be signaled when the execution has finished.
    ///
    /// If the submission fails, nothing executes and the next [wait](Self::wait) returns immediately.
    pub fn submit(
        &mut self,
        device: &Arc<Device>,
        queue: &Queue,
        wait_semaphores: &[(Arc<Semaphore>, vk::PipelineStageFlags)],
        signal_semaphores: &[Arc<Semaphore>],
    ) -> Result<(), RecordingError> {
        for sem in wait_semaphores
            .iter()
            .map(|(sem, _stage)| sem)
            .chain(signal_semaphores.iter())
        {
            self.resources.push(Box::new(sem.clone()));
        }

        let (local_wait_semaphores, local_wait_stages): (Vec<_>, Vec<_>) = wait_semaphores
            .iter()
            .map(|(sem, stage)| (sem.inner, *stage))
            .unzip();
        let local_signal_semaphores = signal_semaphores
            .iter()
            .map(|s| s.inner)
            .collect::<Vec<_>>();

        self.fence.reset()?;

        let submit_info = vk::SubmitInfo::default()
            .command_buffers(core::slice::from_ref(&self.inner.inner))
            .wait_semaphores(&local_wait_semaphores)
            .wait_dst_stage_mask(&local_wait_stages)
            .signal_semaphores(&local_signal_semaphores);

        if let Err(e) = unsafe {
            device.inner.queue_submit(
                queue.inner,
                core::slice::from_ref(&submit_info),
                self.fence.inner,
            )
        } {
            #[cfg(feature = "logging")]
            log::error!(
                "Failed to submit command buffer to queue {}: {}",
                queue.family_index,
                e
            );
            return Err(CommandBufferError::SubmitFailed(e).into());
        }

        self.in_flight = true;
        Ok(())
    }
}

impl<P: CommandBufferAllocator> Drop for ManagedCommands<P> {
    fn drop(&mut self) {
        //if not signaled, wait for the fence to end
        if needs_wait(self.in_flight, self.fence.get_status()) {
            #[cfg(feature = "logging")]
            log::trace!("Waiting for fence");

            if let Err(_e) = self.fence.wait(u64::MAX) {
                #[cfg(feature = "logging")]
                log::error!("Failed waiting for fence on ManagedCommands drop: {}", _e);
            }
        }
    }
}

pub struct Recorder<'a, P: CommandBufferAllocator> {
    //hosting command buffer,
    buffer: &'a mut ManagedCommands<P>,
    has_finished_recording: bool,
}

impl<P: CommandBufferAllocator> Recorder<'_, P> {
    ///Records a command `cmd`. All resources used in `cmd` have to have a static lifetime, since they will be tracked by
    /// this recorder, and after finishing recording by the parents [ManagedCommands].
    ///
    ///```ignore
    ///recorder.record({
    ///    let swapchain = swapchain.clone(); //moved into the closure, kept alive until execution finished.
    ///    move |device, cmd| unsafe {
    ///        device.cmd_clear_color_image(
    ///            *cmd,
    ///            swapchain.images[0],
    ///            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    ///            &clear_color,
    ///            &[range],
    ///        )
    ///    }
    ///});
    ///```
    pub fn record<F>(&mut self, cmd: F)
    where
        F: Fn(&ash::Device, &vk::CommandBuffer) + Send + 'static,
    {
        let cmd = Box::new(cmd);
        cmd(self.buffer.inner.pool.device(), &self.buffer.inner.inner);
        self.buffer.resources.push(cmd);
    }

    ///Finishes recording of this buffer.
    pub fn finish_recording(mut self) -> Result<(), RecordingError> {
        self.has_finished_recording = true;
        unsafe {
            self.buffer
                .inner
                .pool
                .device()
                .end_command_buffer(self.buffer.inner.inner)?
        };

        Ok(())
    }
}

impl<P: CommandBufferAllocator> BarrierRecorder for Recorder<'_, P> {
    fn pipeline_barrier(
        &mut self,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_memory_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_memory_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        //Barriers only carry handles, the caller is responsible for keeping those alive.
        unsafe {
            self.buffer.inner.pool.device().cmd_pipeline_barrier(
                self.buffer.inner.inner,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                memory_barriers,
                buffer_memory_barriers,
                image_memory_barriers,
            )
        }
    }
}

///Prevents leaving the command buffer in a recording state.
///This is however most likely a bug on the caller's side, therefore an error is logged.
impl<P: CommandBufferAllocator> Drop for Recorder<'_, P> {
    fn drop(&mut self) {
        if !self.has_finished_recording {
            #[cfg(feature = "logging")]
            log::error!("Finish recording on drop. The recorded commands are most likely incomplete!");
            if let Err(_e) = unsafe {
                self.buffer
                    .inner
                    .pool
                    .device()
                    .end_command_buffer(self.buffer.inner.inner)
            } {
                #[cfg(feature = "logging")]
                log::error!(
                    "Failed to end recording of command buffer in Recorder's drop implementation: {}",
                    _e
                );
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::BarrierRecorder;
    use vkstart::ash::vk;

    ///Plain copy of the fields of a recorded image barrier.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CapturedImageBarrier {
        pub image: vk::Image,
        pub old_layout: vk::ImageLayout,
        pub new_layout: vk::ImageLayout,
        pub src_access_mask: vk::AccessFlags,
        pub dst_access_mask: vk::AccessFlags,
        pub src_queue_family_index: u32,
        pub dst_queue_family_index: u32,
        ///`(aspect, base mip, level count, base layer, layer count)` of the subresource range.
        pub subresource_range: (vk::ImageAspectFlags, u32, u32, u32, u32),
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct CapturedBarrierCall {
        pub src_stage_mask: vk::PipelineStageFlags,
        pub dst_stage_mask: vk::PipelineStageFlags,
        pub dependency_flags: vk::DependencyFlags,
        pub memory_barrier_count: usize,
        pub buffers: Vec<(vk::Buffer, vk::AccessFlags, vk::AccessFlags)>,
        pub images: Vec<CapturedImageBarrier>,
    }

    ///Records every pipeline barrier call instead of talking to a device.
    #[derive(Default, Debug)]
    pub struct CapturingRecorder {
        pub calls: Vec<CapturedBarrierCall>,
    }

    impl BarrierRecorder for CapturingRecorder {
        fn pipeline_barrier(
            &mut self,
            src_stage_mask: vk::PipelineStageFlags,
            dst_stage_mask: vk::PipelineStageFlags,
            dependency_flags: vk::DependencyFlags,
            memory_barriers: &[vk::MemoryBarrier<'_>],
            buffer_memory_barriers: &[vk::BufferMemoryBarrier<'_>],
            image_memory_barriers: &[vk::ImageMemoryBarrier<'_>],
        ) {
            self.calls.push(CapturedBarrierCall {
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                memory_barrier_count: memory_barriers.len(),
                buffers: buffer_memory_barriers
                    .iter()
                    .map(|b| (b.buffer, b.src_access_mask, b.dst_access_mask))
                    .collect(),
                images: image_memory_barriers
                    .iter()
                    .map(|b| CapturedImageBarrier {
                        image: b.image,
                        old_layout: b.old_layout,
                        new_layout: b.new_layout,
                        src_access_mask: b.src_access_mask,
                        dst_access_mask: b.dst_access_mask,
                        src_queue_family_index: b.src_queue_family_index,
                        dst_queue_family_index: b.dst_queue_family_index,
                        subresource_range: (
                            b.subresource_range.aspect_mask,
                            b.subresource_range.base_mip_level,
                            b.subresource_range.level_count,
                            b.subresource_range.base_array_layer,
                            b.subresource_range.layer_count,
                        ),
                    })
                    .collect(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::sync::Arc;
    use vkstart::resources::CommandPool;

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(RecordingError: Send, Sync);
        assert_impl_all!(ManagedCommands<Arc<CommandPool>>: Send);
    }

    #[test]
    fn failed_submit_is_never_waited_on() {
        //reset fence of a submit that never reached the queue
        assert!(!needs_wait(false, Ok(false)));
        assert!(!needs_wait(false, Ok(true)));
        assert!(!needs_wait(false, Err(vk::Result::ERROR_DEVICE_LOST)));
    }

    #[test]
    fn submitted_work_is_waited_on() {
        assert!(needs_wait(true, Ok(false)));
        //let the wait report the error
        assert!(needs_wait(true, Err(vk::Result::ERROR_DEVICE_LOST)));
        assert!(!needs_wait(true, Ok(true)));
    }
}
