//! Dedicated runtime for the decode worker pool.
//!
//! Workers run on their own multi-thread runtime so fetch/decode work can
//! block a thread without touching the host application's runtime, and so
//! every pool thread can be dropped to the lowest scheduling priority:
//! the pool must never preempt the interactive/rendering path.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Runtime;

static WORKER_THREAD_ID: AtomicUsize = AtomicUsize::new(1);

/// Builds the worker-pool runtime with `workers` threads.
///
/// Threads are named `tileflow-worker-{n}` and reniced to the lowest
/// priority the platform allows as they start.
pub(crate) fn decode_runtime(workers: usize) -> io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .max_blocking_threads(1)
        .thread_name_fn(|| {
            let id = WORKER_THREAD_ID.fetch_add(1, Ordering::Relaxed);
            format!("tileflow-worker-{id}")
        })
        .on_thread_start(lower_thread_priority)
        .enable_all()
        .build()
}

/// Drops the calling thread to the lowest scheduling priority.
///
/// On Linux `nice` affects only the calling thread; other unixes may apply
/// it process-wide, which is still acceptable for a decode-only process.
/// Failure (e.g. priority already lowered by the host) is ignored.
#[cfg(unix)]
fn lower_thread_priority() {
    unsafe {
        libc::nice(19);
    }
}

#[cfg(not(unix))]
fn lower_thread_priority() {}
