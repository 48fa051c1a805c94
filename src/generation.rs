//! Synchronization state backing one pool generation
//!
//! A [`Generation`] bundles the open flag, the capacity limiter, the idle
//! queue and the condition variable waiters block on. The pool never mutates
//! a generation back to life: once shut down a generation is retired and
//! refuses to open again, and anything still holding it observes it closed.

use crate::errors::{PoolError, PoolResult};
use crossbeam::queue::SegQueue;
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

static NEXT_GENERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Counting limiter bounding the number of live resources.
///
/// Each live resource, idle or borrowed, holds one unit.
pub(crate) struct CapacityLimiter {
    available: CachePadded<AtomicUsize>,
    max: usize,
}

impl CapacityLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            available: CachePadded::new(AtomicUsize::new(max)),
            max,
        }
    }

    /// Reserves one unit without blocking.
    pub fn try_acquire(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn release(&self) {
        let previous = self.available.fetch_add(1, Ordering::AcqRel);
        debug_assert!(previous < self.max, "capacity released more often than acquired");
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn in_use(&self) -> usize {
        self.max.saturating_sub(self.available())
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// Outcome of blocking on a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// Something changed; re-run the acquire steps.
    Retry,
    /// The deadline passed with nothing to take.
    TimedOut,
}

pub(crate) struct Generation<T> {
    id: u64,
    open: AtomicBool,
    retired: AtomicBool,
    abandoned: AtomicBool,
    capacity: CapacityLimiter,
    idle: SegQueue<T>,
    lock: Mutex<()>,
    waiters: Condvar,
    waiting: AtomicUsize,
}

impl<T> Generation<T> {
    pub fn new(max_size: usize, open: bool) -> Self {
        Self {
            id: NEXT_GENERATION_ID.fetch_add(1, Ordering::Relaxed),
            open: AtomicBool::new(open),
            retired: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
            capacity: CapacityLimiter::new(max_size),
            idle: SegQueue::new(),
            lock: Mutex::new(()),
            waiters: Condvar::new(),
            waiting: AtomicUsize::new(0),
        }
    }

    /// A generation that starts retired and can never be opened.
    pub fn retired(max_size: usize) -> Self {
        let generation = Self::new(max_size, false);
        generation.retired.store(true, Ordering::Release);
        generation
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> &CapacityLimiter {
        &self.capacity
    }

    pub fn idle_len(&self) -> usize {
        self.idle.len()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    pub fn pop_idle(&self) -> Option<T> {
        self.idle.pop()
    }

    /// Sets the open flag. Returns `Ok(false)` if it was already set.
    ///
    /// A retired generation stays closed and reports [`PoolError::PoolClosed`].
    pub fn open(&self) -> PoolResult<bool> {
        let _guard = self.lock.lock();
        if self.is_retired() {
            return Err(PoolError::PoolClosed);
        }
        Ok(!self.open.swap(true, Ordering::AcqRel))
    }

    /// Puts a recycled resource back on the idle queue and wakes one waiter.
    ///
    /// Hands the resource back when the generation closed in the meantime, so
    /// that nothing lands in a queue `shut_down` has already drained.
    pub fn recycle(&self, resource: T) -> Result<(), T> {
        let _guard = self.lock.lock();
        if !self.is_open() {
            return Err(resource);
        }
        self.idle.push(resource);
        self.waiters.notify_one();
        Ok(())
    }

    /// Returns one capacity unit and wakes one waiter.
    pub fn release_slot(&self) {
        self.capacity.release();
        // The notify must follow the release and happen under the lock, or a
        // waiter between its check and its wait would miss it.
        let _guard = self.lock.lock();
        self.waiters.notify_one();
    }

    /// Blocks until woken, or until `deadline` if one is given.
    ///
    /// Returns immediately with [`Wake::Retry`] when there is already
    /// something to do: the generation closed, an idle resource is queued, or
    /// a capacity unit is free.
    pub fn wait(&self, deadline: Option<Instant>) -> Wake {
        let mut guard = self.lock.lock();
        if self.has_work() {
            return Wake::Retry;
        }

        self.waiting.fetch_add(1, Ordering::Relaxed);
        let timed_out = match deadline {
            Some(deadline) => self.waiters.wait_until(&mut guard, deadline).timed_out(),
            None => {
                self.waiters.wait(&mut guard);
                false
            }
        };
        self.waiting.fetch_sub(1, Ordering::Relaxed);

        if timed_out && !self.has_work() {
            Wake::TimedOut
        } else {
            Wake::Retry
        }
    }

    /// Retires the generation, wakes every waiter and hands back whatever was idle.
    pub fn shut_down(&self) -> Vec<T> {
        let _guard = self.lock.lock();
        self.retired.store(true, Ordering::Release);
        self.open.store(false, Ordering::Release);
        let mut drained = Vec::with_capacity(self.idle.len());
        while let Some(resource) = self.idle.pop() {
            drained.push(resource);
        }
        self.waiters.notify_all();
        drained
    }

    /// Like [`shut_down`](Self::shut_down), but marks the generation as
    /// inherited from another process. Its resources must not be destroyed.
    pub fn abandon(&self) -> Vec<T> {
        self.abandoned.store(true, Ordering::Release);
        self.shut_down()
    }

    fn has_work(&self) -> bool {
        !self.is_open() || !self.idle.is_empty() || self.capacity.available() > 0
    }
}
