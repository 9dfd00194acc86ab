//! Shared progress counter with a one-shot completion signal.
//!
//! [`SharedState`] is the only mutable state shared between the controller,
//! the waker and the workers. Every read and write of the counter happens
//! under one lock, and the completion signal is raised inside the same
//! critical section as the increment that makes the counter reach the
//! expected worker count. There is therefore no window in which a waiter can
//! miss the transition, and no way for two workers to both fire it.
//!
//! The same condition variable backs both the completion wait and the
//! notified waker's wait for counter changes.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::CancelToken;

/// Point-in-time view of run progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Workers that have finished and been counted.
    pub completed: usize,
    /// Workers the run was configured with.
    pub expected: usize,
    /// Number of times the completion signal fired (0 or 1).
    pub signals_fired: usize,
    /// Index of the worker whose increment fired the signal.
    pub last_worker: Option<usize>,
}

impl Progress {
    /// Returns true if the counter reached the expected count.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed >= self.expected
    }
}

#[derive(Debug)]
struct Inner {
    completed: usize,
    signals_fired: usize,
    last_worker: Option<usize>,
}

/// Counter of finished workers guarded by a lock, plus the completion signal.
#[derive(Debug)]
pub struct SharedState {
    expected: usize,
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl SharedState {
    /// Creates state for a run of `expected` workers.
    #[must_use]
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            inner: Mutex::new(Inner {
                completed: 0,
                signals_fired: 0,
                last_worker: None,
            }),
            changed: Condvar::new(),
        }
    }

    /// Worker count this state was sized for.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Counts worker `index` as finished.
    ///
    /// Returns true if this increment made the counter reach the expected
    /// count and therefore fired the completion signal.
    pub fn record_completion(&self, index: usize) -> bool {
        let mut inner = self.inner.lock();
        if inner.completed >= self.expected {
            tracing::warn!(
                index,
                completed = inner.completed,
                "completion recorded past the expected worker count; ignoring"
            );
            return false;
        }
        inner.completed += 1;
        let fired = inner.completed == self.expected;
        if fired {
            inner.signals_fired += 1;
            inner.last_worker = Some(index);
        }
        self.changed.notify_all();
        drop(inner);
        fired
    }

    /// Current counter value.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.inner.lock().completed
    }

    /// Returns true if the counter reached the expected count.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.lock().completed >= self.expected
    }

    /// Takes a consistent snapshot of the counter and signal state.
    #[must_use]
    pub fn snapshot(&self) -> Progress {
        let inner = self.inner.lock();
        Progress {
            completed: inner.completed,
            expected: self.expected,
            signals_fired: inner.signals_fired,
            last_worker: inner.last_worker,
        }
    }

    /// Blocks until the completion signal has fired.
    ///
    /// With a timeout, returns false if the signal did not fire in time. A
    /// timeout too large to express as a deadline waits without one.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut inner = self.inner.lock();
        while inner.signals_fired == 0 {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut inner, deadline).timed_out() {
                        return inner.signals_fired > 0;
                    }
                }
                None => self.changed.wait(&mut inner),
            }
        }
        true
    }

    /// Blocks until the counter differs from `seen`, the run is complete, or
    /// `cancel` is requested. Returns the counter value observed on wakeup.
    ///
    /// Callers that request cancellation must follow up with
    /// [`interrupt`](Self::interrupt) so a blocked waiter re-checks the token.
    pub fn wait_for_change(&self, seen: usize, cancel: &CancelToken) -> usize {
        let mut inner = self.inner.lock();
        while inner.completed == seen && inner.completed < self.expected && !cancel.is_cancelled()
        {
            self.changed.wait(&mut inner);
        }
        inner.completed
    }

    /// Wakes every waiter so it re-checks its exit conditions.
    pub fn interrupt(&self) {
        let _guard = self.inner.lock();
        self.changed.notify_all();
    }
}
