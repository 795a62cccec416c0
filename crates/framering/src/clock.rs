//! Microsecond wall-clock helpers.
//!
//! Committed blocks carry timestamps in microseconds since the Unix epoch;
//! these helpers are the single source of that unit.

use std::time::{SystemTime, UNIX_EPOCH};

const MICROS_PER_SEC: u64 = 1_000_000;
const NANOS_PER_MICRO: u32 = 1_000;

/// Current wall-clock time in microseconds since the Unix epoch.
///
/// A clock set before the epoch reads as zero.
pub fn now_micros() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() * MICROS_PER_SEC + u64::from(elapsed.subsec_micros()),
        Err(_) => 0,
    }
}

/// Converts a POSIX-style `{seconds, nanoseconds}` pair to microseconds.
///
/// Sub-microsecond precision is truncated.
pub fn timespec_to_micros(seconds: u64, nanoseconds: u32) -> u64 {
    seconds * MICROS_PER_SEC + u64::from(nanoseconds / NANOS_PER_MICRO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timespec_conversion() {
        assert_eq!(timespec_to_micros(0, 0), 0);
        assert_eq!(timespec_to_micros(1, 0), 1_000_000);
        assert_eq!(timespec_to_micros(1, 500_000), 1_000_500);
        // Sub-microsecond part truncates.
        assert_eq!(timespec_to_micros(0, 999), 0);
        assert_eq!(timespec_to_micros(0, 1_999), 1);
    }

    #[test]
    fn test_now_micros_is_recent() {
        // 2020-01-01T00:00:00Z in microseconds.
        const JAN_2020_US: u64 = 1_577_836_800_000_000;
        assert!(now_micros() > JAN_2020_US);
    }

    #[test]
    fn test_now_micros_monotone_enough() {
        let a = now_micros();
        let b = now_micros();
        assert!(b >= a);
    }
}
