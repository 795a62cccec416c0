//! Error types for buffer construction.

use thiserror::Error;

/// Errors that can occur when creating a [`FrameBuffer`](crate::FrameBuffer).
///
/// Construction is the only fallible operation in the core. Contract
/// violations (a second writer, a second reserved reader) are programming
/// errors and assert instead; runtime conditions (gaps, underflow) are
/// reported through return values on the reader and writer paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The block region could not be allocated.
    #[error("failed to allocate {bytes} bytes of block storage")]
    AllocationFailed {
        /// Size of the attempted allocation.
        bytes: usize,
    },

    /// The requested geometry does not fit in the address space.
    #[error("block region of {block_size} x {block_count} bytes overflows the address space")]
    RegionTooLarge {
        /// Configured block size in bytes.
        block_size: usize,
        /// Configured number of blocks.
        block_count: usize,
    },
}
