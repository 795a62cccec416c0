//! Page-aligned block region allocation.
//!
//! All blocks live in one contiguous `block_count * block_size` byte region.
//! The region is page-aligned so downstream consumers can hand block
//! pointers straight to direct unbuffered disk I/O.

use crate::error::BufferError;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Alignment fallback when the host page size cannot be queried.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Contiguous page-aligned storage for `block_count` blocks of `block_size`
/// bytes each. Allocated once, zeroed, never resized.
pub(crate) struct BlockStorage {
    region: NonNull<u8>,
    layout: Layout,
    block_size: usize,
    block_count: usize,
}

// SAFETY: the region is plain bytes with no interior invariants; all access
// goes through `block_ptr` under the ring protocol (the writer touches only
// the slot at the write cursor, readers only slots strictly behind it).
unsafe impl Send for BlockStorage {}
unsafe impl Sync for BlockStorage {}

impl BlockStorage {
    /// Allocates the zeroed block region, aligned for direct unbuffered I/O.
    pub(crate) fn allocate(block_size: usize, block_count: usize) -> Result<Self, BufferError> {
        let too_large = BufferError::RegionTooLarge {
            block_size,
            block_count,
        };
        let bytes = block_size.checked_mul(block_count).ok_or(too_large)?;
        let layout = Layout::from_size_align(bytes, page_size()).map_err(|_| too_large)?;

        // SAFETY: the layout has non-zero size (geometry is validated
        // non-zero by BufferConfig) and a power-of-two alignment.
        let ptr = unsafe { alloc_zeroed(layout) };
        let region = NonNull::new(ptr).ok_or(BufferError::AllocationFailed { bytes })?;

        Ok(Self {
            region,
            layout,
            block_size,
            block_count,
        })
    }

    /// Returns the size of one block in bytes.
    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        self.block_size
    }

    /// Raw pointer to the start of the slot at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be in bounds. The caller must honor the ring protocol:
    /// mutable access only to the slot at the write cursor, shared access
    /// only to slots strictly behind it.
    #[inline]
    pub(crate) unsafe fn block_ptr(&self, index: usize) -> *mut u8 {
        debug_assert!(
            index < self.block_count,
            "slot {} outside ring of {} blocks",
            index,
            self.block_count
        );
        // SAFETY: index * block_size is inside the region allocated in
        // `allocate` (index < block_count per the caller contract).
        unsafe { self.region.as_ptr().add(index * self.block_size) }
    }
}

impl Drop for BlockStorage {
    fn drop(&mut self) {
        // SAFETY: the region was allocated in `allocate` with this exact
        // layout and has not been freed.
        unsafe { dealloc(self.region.as_ptr(), self.layout) };
    }
}

/// Host page size, for direct-I/O-compatible alignment of the block region.
#[cfg(unix)]
fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page > 0 {
        page as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}

#[cfg(not(unix))]
fn page_size() -> usize {
    FALLBACK_PAGE_SIZE
}
