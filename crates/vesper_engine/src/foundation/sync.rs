//! Synchronization primitives
//!
//! The standard library has no counting semaphore, so the scheduler's worker
//! gate is built here from a `parking_lot` mutex and condition variable.
//! [`RunFlag`] is the cooperative stop signal shared by the long-lived loops.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Counting semaphore
///
/// `up` never blocks; `down` blocks while the count is zero.
pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore with an initial count
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Increment the count and wake one waiter
    pub fn up(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.available.notify_one();
    }

    /// Increment the count `n` times, waking up to `n` waiters
    pub fn up_many(&self, n: usize) {
        let mut count = self.count.lock();
        *count += n;
        for _ in 0..n {
            self.available.notify_one();
        }
    }

    /// Block until the count is positive, then decrement it
    pub fn down(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOP_REQUESTED: u8 = 2;

/// Run state of a loop that is stopped cooperatively
///
/// A stop requested while the loop is idle cancels its next run, so a stop
/// racing the loop's startup is never lost.
#[derive(Debug, Default)]
pub struct RunFlag(AtomicU8);

impl RunFlag {
    /// Create an idle flag
    pub fn new() -> Self {
        Self(AtomicU8::new(IDLE))
    }

    /// Mark the loop as running; false if a stop was already requested
    pub fn enter(&self) -> bool {
        if self.0.swap(RUNNING, Ordering::AcqRel) == STOP_REQUESTED {
            self.0.store(IDLE, Ordering::Release);
            false
        } else {
            true
        }
    }

    /// Mark the loop as idle again after it returns
    pub fn exit(&self) {
        self.0.store(IDLE, Ordering::Release);
    }

    /// True while the loop should keep iterating
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire) == RUNNING
    }

    /// Ask the loop to return at its next iteration boundary
    pub fn request_stop(&self) {
        self.0.store(STOP_REQUESTED, Ordering::Release);
    }
}

/// Cloneable handle that stops a loop from another thread
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<RunFlag>);

impl StopHandle {
    /// Wrap a shared run flag
    pub fn new(flag: Arc<RunFlag>) -> Self {
        Self(flag)
    }

    /// Request a cooperative stop
    pub fn stop(&self) {
        self.0.request_stop();
    }

    /// True while the loop is iterating
    pub fn is_running(&self) -> bool {
        self.0.is_running()
    }
}
