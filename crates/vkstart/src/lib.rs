//! # vkstart
//!
//! Chapter-by-chapter Vulkan bootstrap on top of [Ash](ash).
//!
//! # Usage
//!
//! vkstart provides transparent wrappers around the objects every Vulkan program creates before it can draw anything:
//! the [Instance](context::Instance), the [Device](context::Device) with its [queues](context::Queue), a window
//! [Surface](surface::Surface) and the [Swapchain](swapchain::Swapchain). Each wrapper keeps its parent alive and destroys
//! its handle when dropped. Usually there are builders that fill in sensible defaults, but every field is public so the
//! objects can also be created by hand.
//!
//! The chapters build on each other:
//!
//! 1. [Instance](context::Instance) creation,
//! 2. physical device enumeration and [Device](context::Device) creation,
//! 3. a native window via the [window] capability interface,
//! 4. the [Surface](surface::Surface) and its format selection,
//! 5. the [Swapchain](swapchain::Swapchain).
//!
//! Structures that are not sensitive to lifetime requirements (like create info) are not wrapped.

pub use ash;
pub use raw_window_handle;

///Structures you need to get started. Basically [Instance](context::Instance) and [Device](context::Device) creation.
/// Also includes the [Ctx](context::Ctx) struct, which bundles both with the graphics queue.
pub mod context;

///Command pools and command buffers.
pub mod resources;

///Window surface related structures. Includes a self managed [Surface](surface::Surface) type.
pub mod surface;

/// [Swapchain](swapchain::Swapchain) type that can be created from a [Surface](surface::Surface). Includes helpers
/// to select formats, present modes and extents.
pub mod swapchain;

///Vulkan synchronisation primitives
pub mod sync;

///Platform independent window creation.
pub mod window;

mod error;
pub use error::{
    CommandBufferError, DeviceError, InstanceError, SurfaceError, SwapchainError, VkStartError,
    WindowError,
};

///Small helpers, mostly conversions of raw Vulkan data.
pub mod util;
