use crate::buffer::BufferInner;
use crate::invariants::debug_assert_slot_bounds;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tracing::warn;

/// Consumer handle over a frame buffer.
///
/// Each reader tracks its own read cursor and receives blocks in the order
/// the writer committed them, interleaved with at most one `None` per gap
/// run. Readers start at the current write position and never see history.
///
/// An unreserved reader that falls a full ring behind is lapped by the
/// writer; the loss surfaces when it releases its block
/// ([`ReadBlock::release`] returns `false`) and the reader resynchronizes
/// to the current write position automatically. The reserved reader is
/// never lapped.
pub struct Reader {
    inner: Arc<BufferInner>,
    /// Cleared under the buffer lock to interrupt a blocking acquire.
    /// Shared with [`InterruptHandle`]s.
    running: Arc<AtomicBool>,
    /// This reader's next-to-consume slot.
    index_out: usize,
    /// Snapshot of the buffer cycle counter as of the last cursor update.
    cycle_count: u64,
    /// Latch ensuring each gap run is reported exactly once per reader.
    gap_reported: bool,
    reserved: bool,
}

impl Reader {
    pub(crate) fn open(inner: Arc<BufferInner>, reserved: bool) -> Self {
        let (index_out, cycle_count) = {
            let mut shared = inner.lock();
            if reserved {
                assert!(
                    shared.reserved_out.is_none(),
                    "frame buffer supports at most one reserved reader"
                );
                shared.reserved_out = Some(shared.index_in);
            }
            (shared.index_in, shared.cycle_count)
        };

        Self {
            inner,
            running: Arc::new(AtomicBool::new(true)),
            index_out,
            cycle_count,
            gap_reported: false,
            reserved,
        }
    }

    /// Returns a handle that can interrupt this reader from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            inner: Arc::clone(&self.inner),
            running: Arc::clone(&self.running),
        }
    }

    /// True until the reader is interrupted.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Blocks until the next block, gap edge, or interruption.
    ///
    /// Returns `None` when:
    /// - the reader was interrupted,
    /// - the stream has a gap at the read cursor that this reader has not
    ///   reported yet (the data block, if any, comes on the next call), or
    /// - a full wait slice elapsed with no progress; this is logged and the
    ///   caller treats it exactly as "no data".
    ///
    /// Otherwise returns the block at the read cursor together with its
    /// commit timestamp. The block stays valid until released.
    pub fn acquire(&mut self) -> Option<ReadBlock<'_>> {
        let wait_slice = self.inner.config.wait_timeout;
        let mut shared = self.inner.lock();
        let mut timed_out = false;

        let found = loop {
            if !self.running.load(Ordering::Relaxed) {
                break None;
            }
            let info = shared.frame_info[self.index_out];
            if info.gap && !self.gap_reported {
                // First observation of this gap run.
                break None;
            }
            if self.index_out != shared.index_in {
                break Some(info.timestamp);
            }
            if timed_out {
                // A full slice elapsed and nothing moved. Healthy operation
                // never reaches this; report "no data" and let the caller
                // decide what to do with it.
                warn!(
                    index_out = self.index_out,
                    slice_ms = wait_slice.as_millis() as u64,
                    "reader wait timed out with no progress"
                );
                break None;
            }

            let (guard, result) = self
                .inner
                .cond
                .wait_timeout(shared, wait_slice)
                .unwrap_or_else(PoisonError::into_inner);
            shared = guard;
            timed_out = result.timed_out();
        };
        drop(shared);

        self.gap_reported = found.is_none();
        let timestamp = found?;

        let block_size = self.inner.storage.block_size();
        // SAFETY: index_out is strictly behind the write cursor, so the
        // writer does not touch this slot while the borrow lives -- unless
        // it laps this (unreserved) reader, in which case the bytes are
        // stale by contract and release() reports the underflow so the
        // caller discards them. The reserved reader cannot be lapped.
        let data = unsafe {
            std::slice::from_raw_parts(
                self.inner.storage.block_ptr(self.index_out).cast_const(),
                block_size,
            )
        };
        Some(ReadBlock {
            reader: self,
            data,
            timestamp,
        })
    }

    /// Underflow check and cursor advance, shared with [`ReadBlock::release`].
    fn release_internal(&mut self) -> bool {
        let block_count = self.inner.config.block_count;
        let mut shared = self.inner.lock();

        // Position is the pair (index, cycle): it distinguishes "writer one
        // cycle ahead" from "cursors happened to line up". Equal indices are
        // always underflow.
        let safe = (shared.index_in > self.index_out && shared.cycle_count == self.cycle_count)
            || (shared.index_in < self.index_out && shared.cycle_count == self.cycle_count + 1);

        if safe {
            self.index_out = (self.index_out + 1) % block_count;
            if self.index_out == 0 {
                self.cycle_count += 1;
            }
        } else {
            // Lapped: resynchronize to the write position and drop the stale
            // gap latch. The caller discards whatever it derived from the
            // lost portion of the stream.
            self.index_out = shared.index_in;
            self.cycle_count = shared.cycle_count;
            self.gap_reported = false;
        }
        debug_assert_slot_bounds!("read", self.index_out, block_count);

        if self.reserved {
            shared.reserved_out = Some(self.index_out);
        }
        safe
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        if self.reserved {
            self.inner.lock().reserved_out = None;
        }
    }
}

/// One delivered block, valid until released.
///
/// Obtained from [`Reader::acquire`]. Dropping the guard without calling
/// [`release`](Self::release) does not advance the read cursor; the same
/// block is delivered again on the next acquire.
pub struct ReadBlock<'a> {
    reader: &'a mut Reader,
    data: &'a [u8],
    timestamp: u64,
}

impl ReadBlock<'_> {
    /// The block bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.data
    }

    /// Commit-time wall clock of the block, in microseconds since the epoch.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Releases the block and advances the reader by one slot.
    ///
    /// Returns `false` if the reader underflowed: the writer lapped it
    /// while the block was held, the read position was reset to the current
    /// write position, and any downstream state derived from the lost
    /// portion (an open output file, say) must be discarded. The reader
    /// itself remains usable.
    pub fn release(self) -> bool {
        self.reader.release_internal()
    }
}

/// Interrupts a reader's blocking acquire from another thread.
///
/// Obtained from [`Reader::interrupt_handle`]. Interruption is idempotent
/// and permanent: every subsequent acquire returns `None` immediately.
#[derive(Clone)]
pub struct InterruptHandle {
    inner: Arc<BufferInner>,
    running: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Clears the reader's running flag and wakes it.
    ///
    /// A pending acquire returns `None` promptly, well within one wait
    /// slice. Taking the lock orders the store before the broadcast so the
    /// waiter cannot miss the wakeup.
    pub fn interrupt(&self) {
        let _shared = self.inner.lock();
        self.running.store(false, Ordering::Relaxed);
        self.inner.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use crate::{BufferConfig, FrameBuffer};
    use std::time::{Duration, Instant};

    fn fast_buffer(block_count: usize) -> FrameBuffer {
        let config =
            BufferConfig::new(8, block_count).with_wait_timeout(Duration::from_millis(20));
        FrameBuffer::new(config).unwrap()
    }

    #[test]
    fn test_acquire_delivers_committed_block() {
        let buffer = fast_buffer(4);
        let mut writer = buffer.writer();
        let mut reader = buffer.reader(false);

        let mut block = writer.write_block();
        block.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(block.commit(1000));

        let block = reader.acquire().expect("one block available");
        assert_eq!(block.as_slice(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(block.timestamp(), 1000);
        assert!(block.release());
    }

    #[test]
    fn test_gap_reported_exactly_once_then_data() {
        let buffer = fast_buffer(4);
        let mut writer = buffer.writer();
        let mut reader = buffer.reader(false);

        // A run of forced gaps is one discontinuity.
        writer.write_block().commit_gap();
        writer.write_block().commit_gap();

        assert!(reader.acquire().is_none());

        // The next live commit reuses the gap slot.
        let mut block = writer.write_block();
        block.as_mut_slice().fill(0x42);
        assert!(block.commit(2000));

        let block = reader.acquire().expect("data after the gap");
        assert_eq!(block.timestamp(), 2000);
        assert_eq!(block.as_slice()[0], 0x42);
        assert!(block.release());
    }

    #[test]
    fn test_underflow_resynchronizes_to_write_position() {
        let buffer = fast_buffer(4);
        let mut writer = buffer.writer();
        let mut reader = buffer.reader(false);

        assert!(writer.write_block().commit(1));
        let held = reader.acquire().expect("block available");

        // Writer wraps the whole ring while the block is held.
        for ts in 2..=5 {
            assert!(writer.write_block().commit(ts));
        }
        assert_eq!(buffer.write_position(), (1, 1));

        // Equal cursors with mismatched cycles: lapped.
        assert!(!held.release());

        // The reader is resynchronized and usable: the next commit is
        // delivered normally.
        assert!(writer.write_block().commit(6));
        let block = reader.acquire().expect("resynchronized reader sees new data");
        assert_eq!(block.timestamp(), 6);
        assert!(block.release());
    }

    #[test]
    fn test_timeout_with_no_progress_returns_none() {
        let buffer = fast_buffer(4);
        let _writer = buffer.writer();
        let mut reader = buffer.reader(false);

        let start = Instant::now();
        assert!(reader.acquire().is_none());
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_interrupted_reader_acquires_nothing() {
        let buffer = fast_buffer(4);
        let mut writer = buffer.writer();
        let mut reader = buffer.reader(false);
        let handle = reader.interrupt_handle();

        assert!(writer.write_block().commit(1));

        handle.interrupt();
        handle.interrupt(); // idempotent
        assert!(!reader.is_running());
        assert!(reader.acquire().is_none());
    }
}
