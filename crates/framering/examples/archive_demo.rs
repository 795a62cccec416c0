//! Minimal archiver pipeline: one acquisition writer, a lossless reserved
//! reader standing in for the disk path, and a lossy reader standing in for
//! a live subscriber.

use framering::{clock, BufferConfig, FrameBuffer};
use std::thread;
use std::time::{Duration, Instant};

const BLOCK_SIZE: usize = 512;
const BLOCK_COUNT: usize = 32;
const BLOCKS_TO_SEND: u64 = 50_000;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("Framering Archive Demo");
    println!("======================\n");
    println!("Configuration:");
    println!("  Block size:  {} bytes", BLOCK_SIZE);
    println!("  Block count: {}", BLOCK_COUNT);
    println!("  Blocks sent: {}\n", BLOCKS_TO_SEND);

    let buffer = FrameBuffer::new(BufferConfig::new(BLOCK_SIZE, BLOCK_COUNT))
        .expect("block region allocation");
    let mut writer = buffer.writer();

    // The disk path opens the reserved reader: every block must arrive.
    let mut disk_reader = buffer.reader(true);
    let disk = thread::spawn(move || {
        let mut stored = 0u64;
        let mut gaps = 0u64;
        while stored < BLOCKS_TO_SEND {
            match disk_reader.acquire() {
                Some(block) => {
                    // A real archiver writes the block to disk here.
                    assert!(block.release(), "reserved reader never underflows");
                    stored += 1;
                }
                None => gaps += 1,
            }
        }
        (stored, gaps)
    });

    // A live subscriber opens an unreserved reader and tolerates loss.
    let mut live_reader = buffer.reader(false);
    let live_interrupt = live_reader.interrupt_handle();
    let live = thread::spawn(move || {
        let mut seen = 0u64;
        let mut lost_runs = 0u64;
        while live_reader.is_running() {
            match live_reader.acquire() {
                Some(block) => {
                    if block.release() {
                        seen += 1;
                    } else {
                        lost_runs += 1;
                    }
                }
                None => {}
            }
        }
        (seen, lost_runs)
    });

    // Acquisition loop: fill each block in place, commit with a microsecond
    // timestamp, retry when the disk path needs the slot.
    let start = Instant::now();
    let mut back_pressured = 0u64;
    for seq in 0..BLOCKS_TO_SEND {
        loop {
            let mut block = writer.write_block();
            block.as_mut_slice()[..8].copy_from_slice(&seq.to_le_bytes());
            if block.commit(clock::now_micros()) {
                break;
            }
            back_pressured += 1;
            thread::yield_now();
        }
    }
    let elapsed = start.elapsed();

    let (stored, disk_gaps) = disk.join().unwrap();

    thread::sleep(Duration::from_millis(20));
    live_interrupt.interrupt();
    let (live_seen, live_lost_runs) = live.join().unwrap();

    println!("Results:");
    println!("  Elapsed:                {elapsed:?}");
    println!(
        "  Throughput:             {:.1} blocks/s",
        BLOCKS_TO_SEND as f64 / elapsed.as_secs_f64()
    );
    println!("  Disk blocks stored:     {stored} (gap notices: {disk_gaps})");
    println!("  Writer back-pressured:  {back_pressured} times");
    println!("  Live blocks delivered:  {live_seen} (loss events: {live_lost_runs})");
}
