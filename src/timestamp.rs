//! Monotonic nanosecond-epoch filename suffixes.
//!
//! `flush` and compaction both name their output files
//! `<prefix>_<epoch-nanoseconds>.db`, and the engine relies on that
//! suffix being strictly increasing across the directory to recover
//! creation order at startup (see [`crate::engine`]'s directory
//! enumeration). A plain `SystemTime::now()` read can repeat on
//! coarse-grained clocks when two files are written back to back, so
//! this bumps the last-seen value by one rather than emitting a
//! duplicate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_NANOS: AtomicU64 = AtomicU64::new(0);

/// Returns a nanosecond epoch timestamp, guaranteed strictly greater
/// than every value this function has previously returned in this
/// process.
pub(crate) fn next_nanos() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    loop {
        let last = LAST_NANOS.load(Ordering::SeqCst);
        let next = if now > last { now } else { last + 1 };
        if LAST_NANOS
            .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return next;
        }
    }
}
