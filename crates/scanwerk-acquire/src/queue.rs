// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unbounded FIFO with a blocking `pop`, used for every cross-thread handoff
// in the acquisition engine: control requests, credentials, and tasks posted
// to the controlling thread.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Thread-safe FIFO queue.
///
/// `push` never blocks.  `pop` parks the caller until an item arrives.
/// `is_empty` is a racy snapshot, only good for deciding whether a
/// non-blocking drain is worth attempting.
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake one waiting consumer.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    /// Remove the oldest item, blocking until one is available.
    pub fn pop(&self) -> T {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self
                .available
                .wait_timeout(items, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            items = guard;
            if result.timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Drop every queued item.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panicking producer cannot leave the deque half-modified.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
