//! Wake-signal target.
//!
//! The coordinator is the thread that wake signals are aimed at, typically
//! whichever thread drives or manages the resolution internally. A signal is
//! a [`Thread::unpark`], so a coordinator parked in a wait loop observes a
//! spurious wakeup each time. An absent coordinator is valid and turns every
//! signal into a counted no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, Thread};

/// The designated target of wake signals, plus signal accounting.
#[derive(Debug, Default)]
pub struct Coordinator {
    target: Option<Thread>,
    attempted: AtomicU64,
    delivered: AtomicU64,
}

impl Coordinator {
    /// A coordinator with no target. Wake signals are no-ops.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Targets the given thread.
    #[must_use]
    pub fn thread(target: Thread) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    /// Targets the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self::thread(thread::current())
    }

    /// Returns true if a target is registered.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.target.is_some()
    }

    /// Name of the target thread, if it has one.
    #[must_use]
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_ref().and_then(Thread::name)
    }

    /// Sends one wake signal. Returns true if a target received it.
    pub fn wake(&self) -> bool {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        match &self.target {
            Some(target) => {
                target.unpark();
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Wake signals requested so far, delivered or not.
    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Wake signals that reached a target.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}
