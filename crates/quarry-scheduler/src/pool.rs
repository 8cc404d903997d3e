use std::io;
use std::thread::JoinHandle;

use crate::task::ThreadPriority;

/// A fixed set of named worker threads.
///
/// Thread creation can fail in constrained CI/sandbox environments (e.g. low
/// `RLIMIT_NPROC` or `EAGAIN`). The pool degrades to however many threads the
/// OS will grant rather than crashing during startup, as long as at least one
/// worker exists.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers named `{prefix}-{index}`, each running `job`.
    ///
    /// `job` is expected to loop until the queue it drains is stopped; the
    /// pool does not itself hold a reference to the queue.
    pub fn spawn<F>(prefix: &str, threads: usize, job: F) -> io::Result<Self>
    where
        F: Fn(usize) + Clone + Send + 'static,
    {
        let threads = threads.max(1);
        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let job = job.clone();
            let builder = std::thread::Builder::new().name(format!("{prefix}-{index}"));
            match builder.spawn(move || job(index)) {
                Ok(handle) => handles.push(handle),
                Err(err) if !handles.is_empty() => {
                    tracing::warn!(
                        target = "quarry.scheduler",
                        error = %err,
                        spawned = handles.len(),
                        requested = threads,
                        "could not create all worker threads; continuing with a smaller pool"
                    );
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. Panics in workers are swallowed here;
    /// the queue already logged them when the task ran.
    pub fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// Lowers the current thread's priority for the duration of one task.
///
/// Only implemented on Linux; elsewhere this is a no-op. The previous
/// priority is restored on drop so pooled threads don't stay niced after a
/// background task finishes.
pub(crate) struct ThreadPriorityGuard {
    lowered: bool,
}

impl ThreadPriorityGuard {
    pub(crate) fn apply(priority: ThreadPriority) -> Self {
        let lowered = match priority {
            ThreadPriority::Normal => false,
            ThreadPriority::Low => lower_current_thread(),
        };
        Self { lowered }
    }
}

impl Drop for ThreadPriorityGuard {
    fn drop(&mut self) {
        if self.lowered {
            restore_current_thread();
        }
    }
}

#[cfg(target_os = "linux")]
fn lower_current_thread() -> bool {
    // Niceness applies per-thread on Linux; 10 keeps background analysis from
    // starving interactive threads without making it unschedulable.
    unsafe {
        let tid = libc::syscall(libc::SYS_gettid);
        libc::setpriority(libc::PRIO_PROCESS as _, tid as _, 10) == 0
    }
}

#[cfg(target_os = "linux")]
fn restore_current_thread() {
    unsafe {
        let tid = libc::syscall(libc::SYS_gettid);
        libc::setpriority(libc::PRIO_PROCESS as _, tid as _, 0);
    }
}

#[cfg(not(target_os = "linux"))]
fn lower_current_thread() -> bool {
    false
}

#[cfg(not(target_os = "linux"))]
fn restore_current_thread() {}
