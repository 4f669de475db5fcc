//! Resources that are allocated from the device and recorded into. For now only command pools and their buffers.
mod command_buffer;
pub use command_buffer::{CommandBuffer, CommandBufferAllocator, CommandPool};
