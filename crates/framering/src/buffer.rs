use crate::config::BufferConfig;
use crate::error::BufferError;
use crate::reader::Reader;
use crate::storage::BlockStorage;
use crate::writer::Writer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

// =============================================================================
// SYNCHRONIZATION STRATEGY
// =============================================================================
//
// One coarse mutex and one condition variable per buffer.
//
// The mutex protects the cursor state (`Shared`): the write cursor, the
// cycle counter, the write-enable flag, the reserved reader's cursor, and
// every frame-info entry. Block bytes are NOT mutex-protected; the ring
// protocol makes byte access race-free:
//
// - The writer writes only into the slot at `index_in`, and no reader reads
//   that slot (readers deliver only slots strictly behind the write cursor).
// - Readers read slots they have not yet released. An unreserved reader that
//   gets lapped may observe a slot being rewritten; its release then fails
//   the (index, cycle) underflow check and the caller discards the bytes.
// - The reserved reader is never lapped: a commit that would advance onto
//   its cursor is converted into a gap instead.
//
// The commit critical section is O(1) and ends in a broadcast, because any
// subset of readers may be waiting on the same edge. Reader critical
// sections are O(1). Only the reader acquire path blocks, in bounded slices.
//
// =============================================================================

/// Per-slot metadata, parallel to the block array.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FrameInfo {
    /// True iff the slot is a gap marker: the data stream is discontinuous
    /// at this point. The marker stays on the slot until the writer commits
    /// live data into it again, so late readers report the discontinuity
    /// before delivering that data.
    pub(crate) gap: bool,
    /// Commit-time wall clock in microseconds since the epoch. Meaningful
    /// only for slots committed as live data.
    pub(crate) timestamp: u64,
}

/// Cursor state shared between the writer and all readers, guarded by the
/// buffer mutex.
pub(crate) struct Shared {
    /// Gap flags and timestamps, one entry per slot.
    pub(crate) frame_info: Box<[FrameInfo]>,
    /// The slot the writer fills next.
    pub(crate) index_in: usize,
    /// Incremented exactly when `index_in` wraps to 0. Together with the
    /// index it forms a logical timestamp of position.
    pub(crate) cycle_count: u64,
    /// While set, every commit is forced into a gap (halt/resume surface).
    pub(crate) write_blocked: bool,
    /// Read cursor of the reserved reader, if one is open. The writer
    /// refuses to advance onto this slot.
    pub(crate) reserved_out: Option<usize>,
}

/// State shared by all handles onto one buffer.
pub(crate) struct BufferInner {
    pub(crate) config: BufferConfig,
    pub(crate) storage: BlockStorage,
    pub(crate) shared: Mutex<Shared>,
    /// Broadcast on every commit and on reader interruption.
    pub(crate) cond: Condvar,
    writer_taken: AtomicBool,
}

impl BufferInner {
    /// Locks the shared cursor state.
    ///
    /// Poisoning is ignored: every critical section leaves `Shared`
    /// consistent before any call that could panic.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-capacity in-memory ring of fixed-size frame blocks.
///
/// One producer deposits blocks at stream rate through the [`Writer`]
/// handle; any number of [`Reader`]s drain them concurrently. The buffer
/// marks gaps when the producer cannot deliver live data, guarantees
/// lossless delivery to at most one *reserved* reader, and wakes waiting
/// readers with bounded latency.
///
/// `FrameBuffer` is a cheap clonable handle; all clones refer to the same
/// ring. Geometry is fixed at construction and the buffer is never resized.
pub struct FrameBuffer {
    inner: Arc<BufferInner>,
}

impl FrameBuffer {
    /// Creates a buffer with the given geometry.
    ///
    /// Allocates the page-aligned block region and the zeroed frame-info
    /// array. Fails only if the region cannot be allocated.
    pub fn new(config: BufferConfig) -> Result<Self, BufferError> {
        let storage = BlockStorage::allocate(config.block_size, config.block_count)?;
        let frame_info = vec![FrameInfo::default(); config.block_count].into_boxed_slice();

        Ok(Self {
            inner: Arc::new(BufferInner {
                config,
                storage,
                shared: Mutex::new(Shared {
                    frame_info,
                    index_in: 0,
                    cycle_count: 0,
                    write_blocked: false,
                    reserved_out: None,
                }),
                cond: Condvar::new(),
                writer_taken: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the size of one block in bytes.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.inner.config.block_size
    }

    /// Returns the number of blocks in the ring.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.inner.config.block_count
    }

    /// Enables or disables live writes.
    ///
    /// While disabled, every commit is forced into a gap regardless of the
    /// writer's intent. Re-enabling restores normal behavior with no other
    /// state change. This is the halt/resume surface used by control and
    /// debug tooling.
    pub fn set_write_enabled(&self, enabled: bool) {
        self.inner.lock().write_blocked = !enabled;
    }

    /// Returns true if live writes are currently enabled.
    pub fn write_enabled(&self) -> bool {
        !self.inner.lock().write_blocked
    }

    /// Snapshot of `(write index, cycle count)` for the status surface.
    pub fn write_position(&self) -> (usize, u64) {
        let shared = self.inner.lock();
        (shared.index_in, shared.cycle_count)
    }

    /// Claims the buffer's single writer handle.
    ///
    /// # Panics
    ///
    /// Panics if the writer has already been claimed. The buffer supports
    /// exactly one producer; a second one is a programming error, not a
    /// runtime condition.
    pub fn writer(&self) -> Writer {
        let taken = self.inner.writer_taken.swap(true, Ordering::AcqRel);
        assert!(!taken, "frame buffer supports exactly one writer");
        let index_in = self.inner.lock().index_in;
        Writer::new(Arc::clone(&self.inner), index_in)
    }

    /// Opens a reader positioned at the current write cursor.
    ///
    /// Fresh readers start at "now"; they do not consume history. A
    /// reserved reader is never overwritten by the writer, which is how the
    /// persistence path guarantees losslessness; live subscribers open
    /// unreserved readers and tolerate loss.
    ///
    /// # Panics
    ///
    /// Panics if `reserved` is true while another reserved reader is open.
    pub fn reader(&self, reserved: bool) -> Reader {
        Reader::open(Arc::clone(&self.inner), reserved)
    }
}

impl Clone for FrameBuffer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_queries() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        assert_eq!(buffer.block_size(), 8);
        assert_eq!(buffer.block_count(), 4);
        assert_eq!(buffer.write_position(), (0, 0));
    }

    #[test]
    fn test_write_enable_toggle_round_trip() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        assert!(buffer.write_enabled());

        buffer.set_write_enabled(false);
        assert!(!buffer.write_enabled());

        buffer.set_write_enabled(true);
        assert!(buffer.write_enabled());
        assert_eq!(buffer.write_position(), (0, 0));
    }

    #[test]
    fn test_clone_shares_state() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        let clone = buffer.clone();

        clone.set_write_enabled(false);
        assert!(!buffer.write_enabled());
    }

    #[test]
    #[should_panic(expected = "exactly one writer")]
    fn test_second_writer_asserts() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        let _writer = buffer.writer();
        let _second = buffer.writer();
    }

    #[test]
    #[should_panic(expected = "at most one reserved reader")]
    fn test_second_reserved_reader_asserts() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        let _reserved = buffer.reader(true);
        let _second = buffer.reader(true);
    }

    #[test]
    fn test_reserved_slot_freed_on_reader_drop() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        drop(buffer.reader(true));
        // The slot is free again.
        let _reserved = buffer.reader(true);
    }

    #[test]
    fn test_many_unreserved_readers() {
        let buffer = FrameBuffer::new(BufferConfig::new(8, 4)).unwrap();
        let _a = buffer.reader(false);
        let _b = buffer.reader(false);
        let _c = buffer.reader(false);
    }
}
