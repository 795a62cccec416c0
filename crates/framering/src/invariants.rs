//! Debug assertion macros for ring cursor invariants.
//!
//! These are only active in debug builds (`debug_assert!`), so there is zero
//! overhead in release builds.

/// Assert that a slot index lies inside the ring.
///
/// Both cursors satisfy `0 <= cursor < block_count` at every observation
/// point; a violation means broken modular arithmetic, not a runtime
/// condition.
macro_rules! debug_assert_slot_bounds {
    ($name:literal, $index:expr, $count:expr) => {
        debug_assert!(
            $index < $count,
            "{} cursor {} outside ring of {} blocks",
            $name,
            $index,
            $count
        )
    };
}

/// Assert that the writer's local cursor mirror agrees with the shared cursor.
///
/// Only the writer's commits move the shared write cursor, so the mirror is
/// exact; a mismatch means a second producer mutated the buffer.
macro_rules! debug_assert_cursor_mirror {
    ($local:expr, $shared:expr) => {
        debug_assert!(
            $local == $shared,
            "writer cursor mirror {} out of sync with shared cursor {}",
            $local,
            $shared
        )
    };
}

pub(crate) use debug_assert_cursor_mirror;
pub(crate) use debug_assert_slot_bounds;
