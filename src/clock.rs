//! Timestamp and caller-identity sources for log records.
//!
//! Every record carries the wall-clock time it was written plus the ids of
//! the process and thread that wrote it. These helpers are cheap enough to
//! call on every write and never allocate.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Next id handed to a thread on its first write.
///
/// Starts at 1 so that 0 never names a real thread.
static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static THREAD_ID: Cell<u32> = const { Cell::new(0) };
}

/// Returns the current wall-clock time in microseconds since the Unix epoch.
///
/// A clock set before 1970 reads as 0 rather than failing the write.
///
/// # Examples
///
/// ```
/// # use vxlog::clock::system_time_micros;
/// let a = system_time_micros();
/// let b = system_time_micros();
/// assert!(a > 0);
/// assert!(b >= a);
/// ```
#[inline]
pub fn system_time_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Id of the calling process.
#[inline]
pub fn process_id() -> u32 {
    std::process::id()
}

/// Small numeric id of the calling thread, stable for the thread's life.
///
/// Ids are assigned in first-use order within the process, starting at 1,
/// so two processes reuse the same small numbers. They are not OS thread
/// ids; pair them with [`process_id`] to tell writers apart.
#[inline]
pub fn thread_id() -> u32 {
    THREAD_ID.with(|id| {
        let current = id.get();
        if current != 0 {
            return current;
        }
        let assigned = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        id.set(assigned);
        assigned
    })
}
