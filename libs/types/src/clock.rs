//! Kernel timestamps
//!
//! All timestamps are i64 unix nanoseconds. The event-hub envelope is the
//! only place milliseconds appear.

use std::time::{SystemTime, UNIX_EPOCH};

pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Current time as unix nanoseconds.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as i64
}

/// Convert unix nanoseconds to unix milliseconds.
pub fn nanos_to_millis(nanos: i64) -> i64 {
    nanos / NANOS_PER_MILLI
}
