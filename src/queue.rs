//! Thread-safe FIFO event queue
//!
//! The single shared object between I/O threads and the render thread.
//! Producers push from any thread; the render thread drains with `try_pop`
//! each frame or parks on `wait_pop` when it has nothing else to do.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct EventQueue<T> {
    inner: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Push an event and wake one waiter.
    pub fn push(&self, event: T) {
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        queue.push_back(event);
        self.available.notify_one();
    }

    /// Pop the oldest event without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        queue.pop_front()
    }

    /// Block until an event arrives or the timeout elapses. Spurious
    /// condvar wakeups go back to waiting for the remaining time.
    pub fn wait_pop(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            queue = self
                .available
                .wait_timeout(queue, remaining)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    pub fn clear(&self) {
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        queue.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
