//! Countdown barrier that releases a waiting batch once every task is done

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A counter initialised to the number of outstanding tasks. Each task
/// counts down exactly once; [`CompletionBarrier::wait`] returns when the
/// count reaches zero.
#[derive(Debug)]
pub struct CompletionBarrier {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionBarrier {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        })
    }

    /// Take the decrement owed by one task. The count goes down when the
    /// guard is dropped, whether the task returned, panicked, or never ran.
    pub fn guard(self: &Arc<Self>) -> BarrierGuard {
        BarrierGuard {
            barrier: Arc::clone(self),
        }
    }

    fn count_down(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.released.notify_all();
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            remaining = self
                .released
                .wait(remaining)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    /// Returns true if the barrier was released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        while *remaining > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            remaining = self
                .released
                .wait_timeout(remaining, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// One task's pending decrement; see [`CompletionBarrier::guard`]
#[derive(Debug)]
pub struct BarrierGuard {
    barrier: Arc<CompletionBarrier>,
}

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.barrier.count_down();
    }
}
