//! Framering - Frame Block Ring Buffer for Fast-Acquisition Streams
//!
//! The in-memory buffer at the heart of a high-rate data-stream archiver.
//! One producer thread deposits fixed-size blocks at stream rate; any number
//! of consumer threads drain them concurrently for disk persistence and for
//! live network subscribers.
//!
//! # Key Features
//!
//! - Fixed-capacity, page-aligned ring storage (direct-I/O friendly)
//! - Gap marking when the producer cannot deliver live data
//! - One *reserved* reader the writer refuses to overwrite (the lossless
//!   persistence path); unreserved readers tolerate loss and detect it
//! - Zero-copy write and read guards
//! - Bounded-latency wakeups: one mutex + condition variable per buffer,
//!   broadcast on every commit, timed wait slices as a liveness safety net
//!
//! # Example
//!
//! ```
//! use framering::{clock, BufferConfig, FrameBuffer};
//!
//! let buffer = FrameBuffer::new(BufferConfig::new(4096, 64)).unwrap();
//! let mut writer = buffer.writer();
//! let mut reader = buffer.reader(false);
//!
//! // Producer: fill the current slot in place, then commit it.
//! let mut block = writer.write_block();
//! block.as_mut_slice()[..4].copy_from_slice(b"data");
//! assert!(block.commit(clock::now_micros()));
//!
//! // Consumer: acquire blocks (or gap notifications), then release.
//! let block = reader.acquire().expect("one block committed");
//! assert_eq!(&block.as_slice()[..4], b"data");
//! assert!(block.release());
//! ```

mod buffer;
pub mod clock;
mod config;
mod error;
mod invariants;
mod reader;
mod storage;
mod writer;

pub use buffer::FrameBuffer;
pub use config::BufferConfig;
pub use error::BufferError;
pub use reader::{InterruptHandle, ReadBlock, Reader};
pub use writer::{WriteBlock, Writer};
