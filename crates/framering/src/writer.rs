use crate::buffer::BufferInner;
use crate::invariants::{debug_assert_cursor_mirror, debug_assert_slot_bounds};
use std::sync::Arc;

/// Producer handle. Exactly one exists per buffer.
///
/// The writer is wait-free against readers: [`write_block`](Self::write_block)
/// takes no lock, and the commit critical section is O(1).
pub struct Writer {
    inner: Arc<BufferInner>,
    /// Local mirror of the shared write cursor. Exact because only this
    /// handle's commits move the cursor.
    index_in: usize,
}

// Note: Writer intentionally does NOT implement Clone. A second handle
// would let two threads fill the same slot concurrently, which the
// single-producer contract forbids.

impl Writer {
    pub(crate) fn new(inner: Arc<BufferInner>, index_in: usize) -> Self {
        Self { inner, index_in }
    }

    /// Zero-copy mutable access to the block at the write cursor.
    ///
    /// The slot stays valid, and exclusively owned by the writer, until the
    /// returned guard commits. Dropping the guard without committing
    /// abandons the bytes; the same slot is handed out again.
    pub fn write_block(&mut self) -> WriteBlock<'_> {
        let slot = self.index_in;
        let block_size = self.inner.storage.block_size();
        // SAFETY: `slot` is the write cursor. Readers deliver only slots
        // strictly behind the cursor, so no reader reads this slot, and this
        // unique handle is the only writer; the mutable borrow is exclusive
        // for the guard's lifetime.
        let slice =
            unsafe { std::slice::from_raw_parts_mut(self.inner.storage.block_ptr(slot), block_size) };
        WriteBlock {
            slice,
            writer: self,
        }
    }

    /// Commit algorithm shared by the data and gap paths.
    fn commit_internal(&mut self, is_gap: bool, timestamp: u64) -> bool {
        let block_count = self.inner.config.block_count;
        let mut shared = self.inner.lock();
        debug_assert_cursor_mirror!(self.index_in, shared.index_in);

        let effective_gap = is_gap || shared.write_blocked;
        let accepted = if effective_gap {
            // The marker occupies the slot without advancing; the next live
            // commit reuses the same slot.
            shared.frame_info[self.index_in].gap = true;
            true
        } else {
            let new_index = (self.index_in + 1) % block_count;
            debug_assert_slot_bounds!("write", new_index, block_count);

            if shared.reserved_out == Some(new_index) {
                // Advancing would trap the reserved reader's pending block.
                shared.frame_info[self.index_in].gap = true;
                false
            } else {
                shared.frame_info[self.index_in].timestamp = timestamp;
                shared.frame_info[new_index].gap = false;
                shared.index_in = new_index;
                if new_index == 0 {
                    shared.cycle_count += 1;
                }
                self.index_in = new_index;
                true
            }
        };

        // Broadcast, not signal: any subset of readers may be waiting on
        // this edge.
        self.inner.cond.notify_all();
        drop(shared);
        accepted
    }
}

/// Zero-copy write access to the slot at the write cursor.
///
/// Obtained from [`Writer::write_block`]; consumed by
/// [`commit`](Self::commit) or [`commit_gap`](Self::commit_gap).
pub struct WriteBlock<'a> {
    slice: &'a mut [u8],
    writer: &'a mut Writer,
}

impl WriteBlock<'_> {
    /// Mutable view of the block bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.slice
    }

    /// Commits the block as live data carrying `timestamp` (microseconds
    /// since the epoch, see [`clock`](crate::clock)).
    ///
    /// Returns `false` when the commit was converted into a gap because
    /// advancing would overwrite the reserved reader's pending slot. The
    /// caller can account for the dropped block and retry later with fresh
    /// bytes in the same slot; there is no point retrying the same commit
    /// immediately.
    ///
    /// While writes are disabled
    /// ([`set_write_enabled`](crate::FrameBuffer::set_write_enabled)), the
    /// commit is forced into a gap and returns `true`.
    pub fn commit(self, timestamp: u64) -> bool {
        self.writer.commit_internal(false, timestamp)
    }

    /// Commits the slot as a gap marker: the data stream is discontinuous
    /// at this point and the slot bytes are not meaningful.
    ///
    /// Gap commits never advance the cursor and are never back-pressured.
    pub fn commit_gap(self) {
        self.writer.commit_internal(true, 0);
    }
}

#[cfg(test)]
mod tests {
    use crate::{BufferConfig, FrameBuffer};

    fn buffer(block_count: usize) -> FrameBuffer {
        FrameBuffer::new(BufferConfig::new(8, block_count)).unwrap()
    }

    #[test]
    fn test_commit_advances_cursor() {
        let buffer = buffer(4);
        let mut writer = buffer.writer();

        let mut block = writer.write_block();
        block.as_mut_slice().fill(0xAB);
        assert!(block.commit(1000));
        assert_eq!(buffer.write_position(), (1, 0));
    }

    #[test]
    fn test_wrap_increments_cycle_exactly_once() {
        let buffer = buffer(4);
        let mut writer = buffer.writer();

        for ts in 0..4 {
            assert!(writer.write_block().commit(ts));
        }
        assert_eq!(buffer.write_position(), (0, 1));

        assert!(writer.write_block().commit(4));
        assert_eq!(buffer.write_position(), (1, 1));
    }

    #[test]
    fn test_gap_commit_does_not_advance() {
        let buffer = buffer(4);
        let mut writer = buffer.writer();

        writer.write_block().commit_gap();
        writer.write_block().commit_gap();
        assert_eq!(buffer.write_position(), (0, 0));
    }

    #[test]
    fn test_disabled_writes_are_forced_into_gaps() {
        let buffer = buffer(4);
        let mut writer = buffer.writer();

        buffer.set_write_enabled(false);
        // Not back-pressure: the commit is accepted, as a gap.
        assert!(writer.write_block().commit(1000));
        assert_eq!(buffer.write_position(), (0, 0));

        buffer.set_write_enabled(true);
        assert!(writer.write_block().commit(2000));
        assert_eq!(buffer.write_position(), (1, 0));
    }

    #[test]
    fn test_reserved_reader_back_pressure_single_slot_ring() {
        let buffer = buffer(1);
        let _reserved = buffer.reader(true);
        let mut writer = buffer.writer();

        // Every commit would advance onto the reserved cursor.
        assert!(!writer.write_block().commit(1));
        assert!(!writer.write_block().commit(2));
        assert_eq!(buffer.write_position(), (0, 0));
    }

    #[test]
    fn test_uncommitted_block_is_handed_out_again() {
        let buffer = buffer(4);
        let mut writer = buffer.writer();

        writer.write_block().as_mut_slice().fill(0x11);
        // Dropped uncommitted; cursor did not move.
        assert_eq!(buffer.write_position(), (0, 0));

        let mut block = writer.write_block();
        assert_eq!(block.as_mut_slice()[0], 0x11);
        assert!(block.commit(1));
        assert_eq!(buffer.write_position(), (1, 0));
    }
}
