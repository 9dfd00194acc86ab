//! Waker task body.
//!
//! The waker keeps poking the coordinator for as long as workers are still
//! outstanding. With [`WakerStrategy::BusyPoll`] it spins, re-reading the
//! counter under the shared lock on every iteration and issuing one wake
//! signal per iteration, until the counter reaches the worker count or the
//! iteration bound is hit. With [`WakerStrategy::Notified`] it sleeps on the
//! progress condition variable and issues one signal per counter change.
//!
//! Both loops check the waker's cancellation token on every iteration, and
//! on every exit path the waker unregisters its own handle so teardown can
//! tell it already finished.

use core::fmt;

use serde::Serialize;

use crate::config::WakerStrategy;
use crate::coordinator::Coordinator;
use crate::harness::Run;
use crate::resolve::Resolver;
use crate::sync::{CancelToken, SharedState};

/// Why the waker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "exit", rename_all = "snake_case")]
pub enum WakerExit {
    /// Every worker was counted.
    ThresholdReached {
        /// Wake signals issued before exiting.
        iterations: u64,
    },
    /// The busy-poll bound was hit before every worker was counted.
    BoundReached {
        /// Wake signals issued before exiting; equals the bound.
        iterations: u64,
    },
    /// Teardown asked the waker to stop.
    Cancelled {
        /// Wake signals issued before exiting.
        iterations: u64,
    },
}

impl WakerExit {
    /// Wake signals issued by the waker.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        match self {
            Self::ThresholdReached { iterations }
            | Self::BoundReached { iterations }
            | Self::Cancelled { iterations } => *iterations,
        }
    }
}

impl fmt::Display for WakerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThresholdReached { iterations } => {
                write!(f, "no longer needed, on count {iterations}")
            }
            Self::BoundReached { iterations } => {
                write!(f, "upper bound reached after {iterations} iterations")
            }
            Self::Cancelled { iterations } => write!(f, "cancelled on count {iterations}"),
        }
    }
}

pub(crate) fn run_waker<R: Resolver>(run: &Run<R>, strategy: WakerStrategy, cancel: &CancelToken) {
    let exit = match strategy {
        WakerStrategy::BusyPoll { iteration_bound } => {
            busy_poll(&run.progress, &run.coordinator, iteration_bound, cancel)
        }
        WakerStrategy::Notified => notified(&run.progress, &run.coordinator, cancel),
    };

    match exit {
        WakerExit::BoundReached { .. } => tracing::warn!(%exit, "bailing on waker"),
        _ => tracing::info!(%exit, "waker finished"),
    }

    *run.waker_exit.lock() = Some(exit);
    // Blocks until the controller has stored the handle, then detaches.
    let handle = run.waker.lock().take();
    drop(handle);
}

/// Spins until the counter reaches the worker count, `iteration_bound` wake
/// signals have been issued, or `cancel` is requested.
pub fn busy_poll(
    progress: &SharedState,
    coordinator: &Coordinator,
    iteration_bound: u64,
    cancel: &CancelToken,
) -> WakerExit {
    let mut iterations = 0;
    loop {
        if progress.is_complete() {
            return WakerExit::ThresholdReached { iterations };
        }
        if cancel.is_cancelled() {
            return WakerExit::Cancelled { iterations };
        }
        if iterations >= iteration_bound {
            return WakerExit::BoundReached { iterations };
        }
        iterations += 1;
        coordinator.wake();
    }
}

/// Sleeps on counter changes, issuing one wake signal per change, until the
/// counter reaches the worker count or `cancel` is requested.
///
/// Whoever cancels must call [`SharedState::interrupt`] afterwards.
pub fn notified(progress: &SharedState, coordinator: &Coordinator, cancel: &CancelToken) -> WakerExit {
    let mut iterations = 0;
    let mut seen = progress.completed();
    loop {
        if seen >= progress.expected() {
            return WakerExit::ThresholdReached { iterations };
        }
        if cancel.is_cancelled() {
            return WakerExit::Cancelled { iterations };
        }
        iterations += 1;
        coordinator.wake();
        seen = progress.wait_for_change(seen, cancel);
    }
}
