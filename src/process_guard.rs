//! Fork detection
//!
//! A forked child shares the parent's memory image but not its file
//! descriptors or OS handles, so pooled resources inherited from the parent
//! must not be handed out again. Every pool operation compares the current
//! process id with the one that last initialised the pool state and resets the
//! state once per fork.
//!
//! The reset is serialised by a dedicated lock that is never held together
//! with a generation lock. If a thread of the parent held that lock at the
//! moment of the fork, the child can never see it released; the wait on it is
//! therefore bounded and ends in [`PoolError::ChildDeadlocked`].

use crate::errors::{PoolError, PoolResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub(crate) struct ProcessGuard {
    pid: AtomicU32,
    fork_lock: Mutex<()>,
    timeout: Duration,
    source: fn() -> u32,
}

impl ProcessGuard {
    pub fn new(source: fn() -> u32, timeout: Duration) -> Self {
        Self {
            pid: AtomicU32::new(source()),
            fork_lock: Mutex::new(()),
            timeout,
            source,
        }
    }

    /// Runs `reset` if the process identity changed since the last check.
    ///
    /// Returns `Ok(true)` when this call performed the reset. Concurrent
    /// callers racing on the same change reset exactly once.
    pub fn check<F>(&self, reset: F) -> PoolResult<bool>
    where
        F: FnOnce(),
    {
        let current = (self.source)();
        if self.pid.load(Ordering::Acquire) == current {
            return Ok(false);
        }

        let Some(_guard) = self.fork_lock.try_lock_for(self.timeout) else {
            tracing::error!(
                pid = current,
                timeout = ?self.timeout,
                "fork lock not released; assuming it was held across fork"
            );
            return Err(PoolError::ChildDeadlocked);
        };

        // Another thread of this process may have reset while we waited.
        let recorded = self.pid.load(Ordering::Acquire);
        if recorded == current {
            return Ok(false);
        }

        tracing::warn!(from = recorded, to = current, "process identity changed, resetting pool state");
        reset();
        // Stored last: a racing thread that still sees the old id will queue
        // on the fork lock instead of using half-reset state.
        self.pid.store(current, Ordering::Release);
        Ok(true)
    }

    #[cfg(test)]
    pub fn hold_fork_lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.fork_lock.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;

    static FAKE_PID: AtomicU32 = AtomicU32::new(100);

    fn fake_pid() -> u32 {
        FAKE_PID.load(Ordering::SeqCst)
    }

    static STUCK_PID: AtomicU32 = AtomicU32::new(7);

    fn stuck_pid() -> u32 {
        STUCK_PID.load(Ordering::SeqCst)
    }

    #[test]
    fn test_same_process_is_a_no_op() {
        let guard = ProcessGuard::new(std::process::id, Duration::from_secs(5));
        let mut resets = 0;
        assert_eq!(guard.check(|| resets += 1), Ok(false));
        assert_eq!(resets, 0);
    }

    #[test]
    fn test_identity_change_resets_once_across_threads() {
        let guard = Arc::new(ProcessGuard::new(fake_pid, Duration::from_secs(5)));
        let resets = Arc::new(AtomicUsize::new(0));
        FAKE_PID.store(101, Ordering::SeqCst);

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let resets = Arc::clone(&resets);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    guard
                        .check(|| {
                            resets.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap()
                })
            })
            .collect();

        let performed = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|did_reset| *did_reset)
            .count();

        assert_eq!(performed, 1);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert_eq!(guard.check(|| panic!("already reset")), Ok(false));
    }

    #[test]
    fn test_held_fork_lock_reports_child_deadlock() {
        let guard = ProcessGuard::new(stuck_pid, Duration::from_millis(20));
        STUCK_PID.store(8, Ordering::SeqCst);

        let _held = guard.fork_lock.lock();
        let mut reset = false;
        assert_eq!(guard.check(|| reset = true), Err(PoolError::ChildDeadlocked));
        assert!(!reset);
    }
}
