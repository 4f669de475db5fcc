use tinyvec::TinyVec;
use vkstart::ash::vk;

use crate::{layout::LayoutTransition, BarrierRecorder};

const BARRIERS_ON_STACK: usize = 4;

///Barrier building helper. Lets you add barriers for images and buffers
/// via a simple builder API, and records all of them with a single pipeline barrier.
///
/// Uses tinyvec internally. [STACK_ALLOCATION](Self::STACK_ALLOCATION) barriers of each type are kept on the stack, the
/// builder however can outgrow that value.
#[derive(Debug)]
pub struct BarrierBuilder {
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub dependency_flags: vk::DependencyFlags,
    pub images: TinyVec<[vk::ImageMemoryBarrier<'static>; BARRIERS_ON_STACK]>,
    pub buffers: TinyVec<[vk::BufferMemoryBarrier<'static>; BARRIERS_ON_STACK]>,
}

///Both stages default to `TOP_OF_PIPE`, which is what [LayoutTransition]s use.
impl Default for BarrierBuilder {
    fn default() -> Self {
        BarrierBuilder {
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dependency_flags: vk::DependencyFlags::empty(),
            images: TinyVec::default(),
            buffers: TinyVec::default(),
        }
    }
}

impl BarrierBuilder {
    ///Amount of barriers that can be stack allocated.
    pub const STACK_ALLOCATION: usize = BARRIERS_ON_STACK;

    pub fn new() -> Self {
        Self::default()
    }

    ///Sets the stages the recorded barrier waits on (`src`) and blocks (`dst`).
    pub fn with_stages(mut self, src: vk::PipelineStageFlags, dst: vk::PipelineStageFlags) -> Self {
        self.src_stage = src;
        self.dst_stage = dst;
        self
    }

    ///Adds this barrier.
    ///
    /// # Safety
    ///
    /// Make sure that the `image` handle is alive until the barrier is used on the GPU.
    /// This is not enforced by this object since it is dropped whenever the command buffer is build. Therefore, there is no
    /// way for it to extent the lifetime as needed.
    #[allow(clippy::too_many_arguments)]
    pub fn image_barrier(
        &mut self,
        image: vk::Image,
        subresource_range: vk::ImageSubresourceRange,
        src_access_mask: vk::AccessFlags,
        src_layout: vk::ImageLayout,
        src_queue_family: u32,
        dst_access_mask: vk::AccessFlags,
        dst_layout: vk::ImageLayout,
        dst_queue_family: u32,
    ) -> &mut Self {
        let item = vk::ImageMemoryBarrier::default()
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(src_access_mask)
            .old_layout(src_layout)
            .src_queue_family_index(src_queue_family)
            .dst_access_mask(dst_access_mask)
            .new_layout(dst_layout)
            .dst_queue_family_index(dst_queue_family);

        #[cfg(feature = "logging")]
        log::trace!("full_transition[{:?}] {:#?}", image, item);

        self.images.push(item);
        self
    }

    ///Pushes an already resolved layout transition. The image handle has to stay alive until the barrier was executed,
    /// same as for [Self::image_barrier].
    ///
    /// The transition is recorded with the stages of this builder, not with
    /// [SRC_STAGE](LayoutTransition::SRC_STAGE) and [DST_STAGE](LayoutTransition::DST_STAGE).
    pub fn image_layout_transition(&mut self, transition: &LayoutTransition) -> &mut Self {
        #[cfg(feature = "logging")]
        {
            log::trace!(
                "layout[{:?}] {:?} -> {:?}",
                transition.image,
                transition.old_layout,
                transition.new_layout
            );
            if !self.uses_transition_stages() {
                log::trace!(
                    "layout[{:?}] recorded with stages {:?} -> {:?} instead of {:?} -> {:?}",
                    transition.image,
                    self.src_stage,
                    self.dst_stage,
                    LayoutTransition::SRC_STAGE,
                    LayoutTransition::DST_STAGE
                );
            }
        }

        self.images.push(transition.as_image_memory_barrier());
        self
    }

    ///Adds this barrier to the internal collection.
    ///
    /// # Safety
    ///
    /// Make sure that the `buffer` handle is alive until the barrier is used on the GPU.
    #[allow(clippy::too_many_arguments)]
    pub fn buffer_barrier(
        &mut self,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        src_access_mask: vk::AccessFlags,
        src_queue_family: u32,
        dst_access_mask: vk::AccessFlags,
        dst_queue_family: u32,
    ) -> &mut Self {
        let item = vk::BufferMemoryBarrier::default()
            .buffer(buffer)
            .offset(offset)
            .size(size)
            .src_access_mask(src_access_mask)
            .src_queue_family_index(src_queue_family)
            .dst_access_mask(dst_access_mask)
            .dst_queue_family_index(dst_queue_family);
        self.buffers.push(item);

        self
    }

    ///Returns true if the builder records with the same stages [LayoutTransition::record] uses.
    pub fn uses_transition_stages(&self) -> bool {
        self.src_stage == LayoutTransition::SRC_STAGE && self.dst_stage == LayoutTransition::DST_STAGE
    }

    ///Returns true if at least one barrier has been added.
    pub fn has_barrier(&self) -> bool {
        !self.images.is_empty() || !self.buffers.is_empty()
    }

    ///Records all pushed barriers with one pipeline barrier. Records nothing if no barrier was pushed.
    pub fn record<R: BarrierRecorder + ?Sized>(&self, recorder: &mut R) {
        if !self.has_barrier() {
            return;
        }

        recorder.pipeline_barrier(
            self.src_stage,
            self.dst_stage,
            self.dependency_flags,
            &[],
            self.buffers.as_slice(),
            self.images.as_slice(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::CapturingRecorder;
    use vkstart::ash::vk::Handle;

    #[test]
    fn empty_builder_records_nothing() {
        let builder = BarrierBuilder::new();
        assert!(!builder.has_barrier());

        let mut recorder = CapturingRecorder::default();
        builder.record(&mut recorder);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn batches_into_one_call() {
        let mut builder = BarrierBuilder::new();
        //more than fit on the stack
        for i in 0..(BarrierBuilder::STACK_ALLOCATION as u64 + 2) {
            let transition = LayoutTransition::resolve(
                vk::Image::from_raw(i + 1),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )
            .unwrap();
            builder.image_layout_transition(&transition);
        }
        builder.buffer_barrier(
            vk::Buffer::from_raw(7),
            0,
            vk::WHOLE_SIZE,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::QUEUE_FAMILY_IGNORED,
            vk::AccessFlags::SHADER_READ,
            vk::QUEUE_FAMILY_IGNORED,
        );
        assert!(builder.has_barrier());

        let mut recorder = CapturingRecorder::default();
        builder.record(&mut recorder);

        assert_eq!(recorder.calls.len(), 1);
        let call = &recorder.calls[0];
        assert_eq!(call.src_stage_mask, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(call.images.len(), BarrierBuilder::STACK_ALLOCATION + 2);
        assert_eq!(call.images[0].image, vk::Image::from_raw(1));
        assert_eq!(
            call.images[0].new_layout,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        assert_eq!(
            call.buffers,
            vec![(
                vk::Buffer::from_raw(7),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ
            )]
        );
    }

    #[test]
    fn custom_stages() {
        let mut builder = BarrierBuilder::new().with_stages(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::TRANSFER,
        );
        builder.image_barrier(
            vk::Image::from_raw(3),
            vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::QUEUE_FAMILY_IGNORED,
            vk::AccessFlags::TRANSFER_READ,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::QUEUE_FAMILY_IGNORED,
        );

        let mut recorder = CapturingRecorder::default();
        builder.record(&mut recorder);
        assert_eq!(
            recorder.calls[0].src_stage_mask,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
        assert_eq!(
            recorder.calls[0].dst_stage_mask,
            vk::PipelineStageFlags::TRANSFER
        );
    }

    #[test]
    fn transition_takes_builder_stages() {
        let transition = LayoutTransition::resolve(
            vk::Image::from_raw(5),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        )
        .unwrap();

        let mut builder = BarrierBuilder::new();
        assert!(builder.uses_transition_stages());
        builder = builder.with_stages(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::TRANSFER,
        );
        assert!(!builder.uses_transition_stages());
        builder.image_layout_transition(&transition);

        let mut recorder = CapturingRecorder::default();
        builder.record(&mut recorder);

        let call = &recorder.calls[0];
        assert_eq!(
            call.src_stage_mask,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
        assert_eq!(call.dst_stage_mask, vk::PipelineStageFlags::TRANSFER);
        //masks and layouts are still the resolved ones
        assert_eq!(call.images[0].src_access_mask, transition.src_access_mask);
        assert_eq!(call.images[0].dst_access_mask, transition.dst_access_mask);
        assert_eq!(
            call.images[0].new_layout,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL
        );
    }
}
