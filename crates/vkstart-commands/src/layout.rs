//! # Image layout transitions
//!
//! Moves an image from one [layout](vk::ImageLayout) to another by recording an image memory barrier. The access masks of
//! the barrier are derived from the two layouts by two static tables:
//!
//! | old layout                  | source access                     |
//! |-----------------------------|-----------------------------------|
//! | PREINITIALIZED              | HOST_WRITE \| TRANSFER_WRITE      |
//! | COLOR_ATTACHMENT_OPTIMAL    | COLOR_ATTACHMENT_WRITE            |
//! | DEPTH_STENCIL_ATTACHMENT_OPTIMAL | DEPTH_STENCIL_ATTACHMENT_WRITE |
//! | TRANSFER_SRC_OPTIMAL        | TRANSFER_READ                     |
//! | SHADER_READ_ONLY_OPTIMAL    | SHADER_READ                       |
//! | UNDEFINED, TRANSFER_DST_OPTIMAL | none                          |
//!
//! | new layout                  | source access                     | destination access            |
//! |-----------------------------|-----------------------------------|-------------------------------|
//! | TRANSFER_DST_OPTIMAL        | kept                              | TRANSFER_WRITE                |
//! | TRANSFER_SRC_OPTIMAL        | adds TRANSFER_READ                | TRANSFER_READ                 |
//! | COLOR_ATTACHMENT_OPTIMAL    | replaced by TRANSFER_READ         | COLOR_ATTACHMENT_WRITE        |
//! | DEPTH_STENCIL_ATTACHMENT_OPTIMAL | kept                         | DEPTH_STENCIL_ATTACHMENT_WRITE |
//! | SHADER_READ_ONLY_OPTIMAL    | replaced by HOST_WRITE \| TRANSFER_WRITE | SHADER_READ            |
//!
//! Note that the COLOR_ATTACHMENT_OPTIMAL and SHADER_READ_ONLY_OPTIMAL targets throw away the access derived from the old
//! layout, while the others keep or extend it. Coming from COLOR_ATTACHMENT_OPTIMAL into SHADER_READ_ONLY_OPTIMAL
//! therefore does not wait for the attachment writes. This mirrors the classic tutorial behaviour and is most likely a
//! bug there.
//!
//! Both sides of the barrier use `TOP_OF_PIPE` and the barrier always covers the first mip level of the first array layer.
//! UNDEFINED and PREINITIALIZED can not be transitioned to. Every layout not listed above is rejected.

use thiserror::Error;
use vkstart::ash::vk;

use crate::BarrierRecorder;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutTransitionError {
    #[error("Image layout {layout:?} is not handled by layout transitions")]
    UnhandledLayout { layout: vk::ImageLayout },
    #[error("Image layout {layout:?} can not be the target of a layout transition")]
    InvalidTargetLayout { layout: vk::ImageLayout },
}

///The layouts a [LayoutTransition] can be resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionLayout {
    Undefined,
    Preinitialized,
    ColorAttachmentOptimal,
    DepthStencilAttachmentOptimal,
    TransferSrcOptimal,
    TransferDstOptimal,
    ShaderReadOnlyOptimal,
}

const fn access_union(a: vk::AccessFlags, b: vk::AccessFlags) -> vk::AccessFlags {
    vk::AccessFlags::from_raw(a.as_raw() | b.as_raw())
}

const HOST_OR_TRANSFER_WRITE: vk::AccessFlags =
    access_union(vk::AccessFlags::HOST_WRITE, vk::AccessFlags::TRANSFER_WRITE);

///What happens to the source access of the old layout when transitioning into a layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRule {
    Keep,
    Merge(vk::AccessFlags),
    Overwrite(vk::AccessFlags),
}

impl SourceRule {
    pub const fn apply(self, src_access: vk::AccessFlags) -> vk::AccessFlags {
        match self {
            SourceRule::Keep => src_access,
            SourceRule::Merge(flags) => access_union(src_access, flags),
            SourceRule::Overwrite(flags) => flags,
        }
    }
}

///Source access implied by the old layout.
const SOURCE_ACCESS: [(TransitionLayout, vk::AccessFlags); 7] = [
    (TransitionLayout::Undefined, vk::AccessFlags::empty()),
    (TransitionLayout::Preinitialized, HOST_OR_TRANSFER_WRITE),
    (
        TransitionLayout::ColorAttachmentOptimal,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    ),
    (
        TransitionLayout::DepthStencilAttachmentOptimal,
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    ),
    (
        TransitionLayout::TransferSrcOptimal,
        vk::AccessFlags::TRANSFER_READ,
    ),
    (TransitionLayout::TransferDstOptimal, vk::AccessFlags::empty()),
    (
        TransitionLayout::ShaderReadOnlyOptimal,
        vk::AccessFlags::SHADER_READ,
    ),
];

///Source rule and destination access per target layout. Layouts missing here are no valid targets.
const DESTINATION_ACCESS: [(TransitionLayout, SourceRule, vk::AccessFlags); 5] = [
    (
        TransitionLayout::TransferDstOptimal,
        SourceRule::Keep,
        vk::AccessFlags::TRANSFER_WRITE,
    ),
    (
        TransitionLayout::TransferSrcOptimal,
        SourceRule::Merge(vk::AccessFlags::TRANSFER_READ),
        vk::AccessFlags::TRANSFER_READ,
    ),
    (
        TransitionLayout::ColorAttachmentOptimal,
        SourceRule::Overwrite(vk::AccessFlags::TRANSFER_READ),
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    ),
    (
        TransitionLayout::DepthStencilAttachmentOptimal,
        SourceRule::Keep,
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    ),
    (
        TransitionLayout::ShaderReadOnlyOptimal,
        SourceRule::Overwrite(HOST_OR_TRANSFER_WRITE),
        vk::AccessFlags::SHADER_READ,
    ),
];

impl TransitionLayout {
    pub const ALL: [TransitionLayout; 7] = [
        TransitionLayout::Undefined,
        TransitionLayout::Preinitialized,
        TransitionLayout::ColorAttachmentOptimal,
        TransitionLayout::DepthStencilAttachmentOptimal,
        TransitionLayout::TransferSrcOptimal,
        TransitionLayout::TransferDstOptimal,
        TransitionLayout::ShaderReadOnlyOptimal,
    ];

    pub const fn as_vk(self) -> vk::ImageLayout {
        match self {
            TransitionLayout::Undefined => vk::ImageLayout::UNDEFINED,
            TransitionLayout::Preinitialized => vk::ImageLayout::PREINITIALIZED,
            TransitionLayout::ColorAttachmentOptimal => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            TransitionLayout::DepthStencilAttachmentOptimal => {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            }
            TransitionLayout::TransferSrcOptimal => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            TransitionLayout::TransferDstOptimal => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            TransitionLayout::ShaderReadOnlyOptimal => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    ///Access that has to be finished before the image can leave this layout.
    pub fn source_access(self) -> vk::AccessFlags {
        SOURCE_ACCESS
            .iter()
            .find(|(layout, _)| *layout == self)
            .map(|(_, access)| *access)
            .unwrap_or_default()
    }

    ///Source rule and destination access when transitioning into this layout. `None` if this layout can't be a target.
    pub fn destination_access(self) -> Option<(SourceRule, vk::AccessFlags)> {
        DESTINATION_ACCESS
            .iter()
            .find(|(layout, _, _)| *layout == self)
            .map(|(_, rule, access)| (*rule, *access))
    }

    ///Returns the `(src, dst)` access masks of a transition from `old` to `new`.
    pub fn access_masks(
        old: TransitionLayout,
        new: TransitionLayout,
    ) -> Result<(vk::AccessFlags, vk::AccessFlags), LayoutTransitionError> {
        let (rule, dst_access) =
            new.destination_access()
                .ok_or(LayoutTransitionError::InvalidTargetLayout {
                    layout: new.as_vk(),
                })?;
        Ok((rule.apply(old.source_access()), dst_access))
    }
}

impl TryFrom<vk::ImageLayout> for TransitionLayout {
    type Error = LayoutTransitionError;
    fn try_from(layout: vk::ImageLayout) -> Result<Self, Self::Error> {
        TransitionLayout::ALL
            .into_iter()
            .find(|l| l.as_vk() == layout)
            .ok_or(LayoutTransitionError::UnhandledLayout { layout })
    }
}

impl From<TransitionLayout> for vk::ImageLayout {
    fn from(layout: TransitionLayout) -> Self {
        layout.as_vk()
    }
}

///A resolved layout transition of a single image. Can be recorded directly, or pushed into a
/// [BarrierBuilder](crate::BarrierBuilder).
#[derive(Clone, Copy, Debug)]
pub struct LayoutTransition {
    pub image: vk::Image,
    pub subresource_range: vk::ImageSubresourceRange,
    pub old_layout: TransitionLayout,
    pub new_layout: TransitionLayout,
    pub src_access_mask: vk::AccessFlags,
    pub dst_access_mask: vk::AccessFlags,
}

impl LayoutTransition {
    pub const SRC_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::TOP_OF_PIPE;
    pub const DST_STAGE: vk::PipelineStageFlags = vk::PipelineStageFlags::TOP_OF_PIPE;

    ///Resolves the access masks for transitioning the first mip level and layer of `image` (with the given aspect)
    /// from `old_layout` to `new_layout`. Nothing is recorded.
    pub fn resolve(
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<Self, LayoutTransitionError> {
        let resolved = Self::resolve_layouts(image, aspect_mask, old_layout, new_layout);

        #[cfg(feature = "logging")]
        if let Err(e) = &resolved {
            log::error!(
                "Can't transition {:?} from {:?} to {:?}: {}",
                image,
                old_layout,
                new_layout,
                e
            );
        }

        resolved
    }

    fn resolve_layouts(
        image: vk::Image,
        aspect_mask: vk::ImageAspectFlags,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<Self, LayoutTransitionError> {
        let old_layout = TransitionLayout::try_from(old_layout)?;
        let new_layout = TransitionLayout::try_from(new_layout)?;
        let (src_access_mask, dst_access_mask) =
            TransitionLayout::access_masks(old_layout, new_layout)?;

        Ok(LayoutTransition {
            image,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            old_layout,
            new_layout,
            src_access_mask,
            dst_access_mask,
        })
    }

    pub fn as_image_memory_barrier(&self) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .image(self.image)
            .subresource_range(self.subresource_range)
            .old_layout(self.old_layout.as_vk())
            .new_layout(self.new_layout.as_vk())
            .src_access_mask(self.src_access_mask)
            .dst_access_mask(self.dst_access_mask)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
    }

    ///Records this transition as a single pipeline barrier.
    pub fn record<R: BarrierRecorder + ?Sized>(&self, recorder: &mut R) {
        #[cfg(feature = "logging")]
        log::trace!(
            "layout[{:?}] {:?} -> {:?}",
            self.image,
            self.old_layout,
            self.new_layout
        );

        recorder.pipeline_barrier(
            Self::SRC_STAGE,
            Self::DST_STAGE,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            core::slice::from_ref(&self.as_image_memory_barrier()),
        );
    }
}

///Records a barrier into `recorder` that moves `image` from `old_layout` to `new_layout`.
///
/// `recorder` has to be recording, and `old_layout` has to be the layout `image` is in when the barrier executes. Neither
/// is checked. On error nothing is recorded.
pub fn transition_image_layout<R: BarrierRecorder + ?Sized>(
    recorder: &mut R,
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<(), LayoutTransitionError> {
    LayoutTransition::resolve(image, aspect_mask, old_layout, new_layout)?.record(recorder);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::CapturingRecorder;
    use vkstart::ash::vk::{AccessFlags as A, Handle, ImageLayout as L};

    fn image() -> vk::Image {
        vk::Image::from_raw(0x42)
    }

    fn transition(old: L, new: L) -> (CapturingRecorder, Result<(), LayoutTransitionError>) {
        let mut recorder = CapturingRecorder::default();
        let result =
            transition_image_layout(&mut recorder, image(), vk::ImageAspectFlags::COLOR, old, new);
        (recorder, result)
    }

    fn masks(old: L, new: L) -> (vk::AccessFlags, vk::AccessFlags) {
        let (recorder, result) = transition(old, new);
        assert!(result.is_ok());
        let barrier = recorder.calls[0].images[0];
        (barrier.src_access_mask, barrier.dst_access_mask)
    }

    #[test]
    fn preinitialized_to_transfer_dst() {
        assert_eq!(
            masks(L::PREINITIALIZED, L::TRANSFER_DST_OPTIMAL),
            (A::HOST_WRITE | A::TRANSFER_WRITE, A::TRANSFER_WRITE)
        );
    }

    #[test]
    fn color_attachment_to_transfer_src() {
        assert_eq!(
            masks(L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL),
            (A::COLOR_ATTACHMENT_WRITE | A::TRANSFER_READ, A::TRANSFER_READ)
        );
    }

    #[test]
    fn transfer_src_to_color_attachment() {
        assert_eq!(
            masks(L::TRANSFER_SRC_OPTIMAL, L::COLOR_ATTACHMENT_OPTIMAL),
            (A::TRANSFER_READ, A::COLOR_ATTACHMENT_WRITE)
        );
    }

    #[test]
    fn shader_read_to_shader_read() {
        assert_eq!(
            masks(L::SHADER_READ_ONLY_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL),
            (A::HOST_WRITE | A::TRANSFER_WRITE, A::SHADER_READ)
        );
    }

    #[test]
    fn overwriting_targets_ignore_old_layout() {
        for old in TransitionLayout::ALL {
            assert_eq!(
                masks(old.as_vk(), L::COLOR_ATTACHMENT_OPTIMAL),
                (A::TRANSFER_READ, A::COLOR_ATTACHMENT_WRITE)
            );
            assert_eq!(
                masks(old.as_vk(), L::SHADER_READ_ONLY_OPTIMAL),
                (A::HOST_WRITE | A::TRANSFER_WRITE, A::SHADER_READ)
            );
        }
    }

    #[test]
    fn all_recognized_pairs() {
        let source = |old: TransitionLayout| match old {
            TransitionLayout::Preinitialized => A::HOST_WRITE | A::TRANSFER_WRITE,
            TransitionLayout::ColorAttachmentOptimal => A::COLOR_ATTACHMENT_WRITE,
            TransitionLayout::DepthStencilAttachmentOptimal => A::DEPTH_STENCIL_ATTACHMENT_WRITE,
            TransitionLayout::TransferSrcOptimal => A::TRANSFER_READ,
            TransitionLayout::ShaderReadOnlyOptimal => A::SHADER_READ,
            TransitionLayout::Undefined | TransitionLayout::TransferDstOptimal => A::empty(),
        };

        for old in TransitionLayout::ALL {
            for new in TransitionLayout::ALL {
                let expected = match new {
                    TransitionLayout::TransferDstOptimal => Some((source(old), A::TRANSFER_WRITE)),
                    TransitionLayout::TransferSrcOptimal => {
                        Some((source(old) | A::TRANSFER_READ, A::TRANSFER_READ))
                    }
                    TransitionLayout::ColorAttachmentOptimal => {
                        Some((A::TRANSFER_READ, A::COLOR_ATTACHMENT_WRITE))
                    }
                    TransitionLayout::DepthStencilAttachmentOptimal => {
                        Some((source(old), A::DEPTH_STENCIL_ATTACHMENT_WRITE))
                    }
                    TransitionLayout::ShaderReadOnlyOptimal => {
                        Some((A::HOST_WRITE | A::TRANSFER_WRITE, A::SHADER_READ))
                    }
                    TransitionLayout::Undefined | TransitionLayout::Preinitialized => None,
                };

                let resolved = LayoutTransition::resolve(
                    image(),
                    vk::ImageAspectFlags::COLOR,
                    old.as_vk(),
                    new.as_vk(),
                );
                match expected {
                    Some(masks) => {
                        let resolved = resolved.unwrap();
                        assert_eq!(
                            (resolved.src_access_mask, resolved.dst_access_mask),
                            masks,
                            "{:?} -> {:?}",
                            old,
                            new
                        );
                    }
                    None => assert_eq!(
                        resolved.err(),
                        Some(LayoutTransitionError::InvalidTargetLayout {
                            layout: new.as_vk()
                        })
                    ),
                }
            }
        }
    }

    #[test]
    fn invalid_targets_record_nothing() {
        for new in [L::UNDEFINED, L::PREINITIALIZED] {
            let (recorder, result) = transition(L::TRANSFER_DST_OPTIMAL, new);
            assert_eq!(
                result,
                Err(LayoutTransitionError::InvalidTargetLayout { layout: new })
            );
            assert!(recorder.calls.is_empty());
        }
    }

    #[test]
    fn unhandled_layouts_record_nothing() {
        let (recorder, result) = transition(L::PRESENT_SRC_KHR, L::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(
            result,
            Err(LayoutTransitionError::UnhandledLayout {
                layout: L::PRESENT_SRC_KHR
            })
        );
        assert!(recorder.calls.is_empty());

        let (recorder, result) = transition(L::UNDEFINED, L::GENERAL);
        assert_eq!(
            result,
            Err(LayoutTransitionError::UnhandledLayout { layout: L::GENERAL })
        );
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn records_single_top_of_pipe_barrier() {
        let (recorder, result) = transition(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL);
        assert!(result.is_ok());
        assert_eq!(recorder.calls.len(), 1);

        let call = &recorder.calls[0];
        assert_eq!(call.src_stage_mask, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(call.dst_stage_mask, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(call.dependency_flags, vk::DependencyFlags::empty());
        assert_eq!(call.memory_barrier_count, 0);
        assert!(call.buffers.is_empty());
        assert_eq!(call.images.len(), 1);

        let barrier = call.images[0];
        assert_eq!(barrier.image, image());
        assert_eq!(barrier.old_layout, L::UNDEFINED);
        assert_eq!(barrier.new_layout, L::TRANSFER_DST_OPTIMAL);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(barrier.dst_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }

    #[test]
    fn covers_first_mip_and_layer() {
        let mut recorder = CapturingRecorder::default();
        transition_image_layout(
            &mut recorder,
            image(),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
            L::UNDEFINED,
            L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();

        assert_eq!(
            recorder.calls[0].images[0].subresource_range,
            (
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
                0,
                1,
                0,
                1
            )
        );

        let resolved = LayoutTransition::resolve(
            image(),
            vk::ImageAspectFlags::COLOR,
            L::UNDEFINED,
            L::TRANSFER_DST_OPTIMAL,
        )
        .unwrap();
        let range = resolved.as_image_memory_barrier().subresource_range;
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.base_mip_level, 0);
        assert_eq!(range.level_count, 1);
        assert_eq!(range.base_array_layer, 0);
        assert_eq!(range.layer_count, 1);
    }

    #[test]
    fn depth_attachment_to_transfer_src_merges() {
        assert_eq!(
            masks(L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL),
            (
                A::DEPTH_STENCIL_ATTACHMENT_WRITE | A::TRANSFER_READ,
                A::TRANSFER_READ
            )
        );
    }

    #[test]
    fn unhandled_old_layout_reported_before_target() {
        let (recorder, result) = transition(L::GENERAL, L::UNDEFINED);
        assert_eq!(
            result,
            Err(LayoutTransitionError::UnhandledLayout { layout: L::GENERAL })
        );
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn identical_calls_record_identical_barriers() {
        let (first, _) = transition(L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL);
        let (second, _) = transition(L::COLOR_ATTACHMENT_OPTIMAL, L::TRANSFER_SRC_OPTIMAL);
        assert_eq!(first.calls, second.calls);
    }

    #[test]
    fn layout_conversion() {
        for layout in TransitionLayout::ALL {
            assert_eq!(TransitionLayout::try_from(layout.as_vk()), Ok(layout));
            assert_eq!(vk::ImageLayout::from(layout), layout.as_vk());
        }
        assert!(TransitionLayout::try_from(L::GENERAL).is_err());
    }
}
