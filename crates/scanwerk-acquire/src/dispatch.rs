// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cross-thread dispatch onto the controlling thread.
//
// The scan worker never touches consumer state directly.  Observer
// notifications are posted to a `MainLoop` and run whenever the controlling
// thread pumps it; page-handler calls go through `invoke_blocking`, which
// parks the worker on a `Rendezvous` until the controlling thread has run the
// task.  A GUI integrates by pumping the loop from its idle handler.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::queue::BlockingQueue;

/// Unit of work executed on the controlling thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Task queue drained by the controlling thread.
///
/// Cheap to clone; all clones feed the same queue.
#[derive(Clone, Default)]
pub struct MainLoop {
    tasks: Arc<BlockingQueue<Task>>,
}

impl MainLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run on the controlling thread and return immediately.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.tasks.push(Box::new(task));
    }

    /// Queue `task` and block the calling thread until it has run.
    ///
    /// Must not be called from the thread that pumps this loop.  If the task
    /// is dropped without running (loop torn down) the caller is released
    /// anyway.
    pub fn invoke_blocking(&self, task: impl FnOnce() + Send + 'static) {
        let (completion, rendezvous) = Rendezvous::pair();
        self.post(move || {
            let _completion = completion;
            task();
        });
        rendezvous.wait();
    }

    /// Run every task queued so far without blocking.  Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.tasks.try_pop() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it.  Returns whether a task ran.
    pub fn run_once_timeout(&self, timeout: Duration) -> bool {
        match self.tasks.pop_timeout(timeout) {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.tasks.is_empty()
    }
}

#[derive(Default)]
struct Signal {
    done: Mutex<bool>,
    cond: Condvar,
}

/// Waiting half of a one-shot handoff.
pub struct Rendezvous(Arc<Signal>);

/// Completing half of a one-shot handoff.  Signals when dropped, so a task
/// that panics or is discarded still releases the waiter.
pub struct Completion(Arc<Signal>);

impl Rendezvous {
    pub fn pair() -> (Completion, Rendezvous) {
        let signal = Arc::new(Signal::default());
        (Completion(Arc::clone(&signal)), Rendezvous(signal))
    }

    /// Block until the matching [`Completion`] is dropped.
    pub fn wait(self) {
        let mut done = self.0.done.lock().unwrap_or_else(PoisonError::into_inner);
        while !*done {
            done = self
                .0
                .cond
                .wait(done)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        *self.0.done.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.0.cond.notify_all();
    }
}
