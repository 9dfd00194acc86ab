//! Task spawning and task handles.
//!
//! Every harness task runs on its own OS thread. Spawning goes through the
//! [`Spawner`] trait so a run can be driven with a spawner that refuses
//! particular tasks; [`ThreadSpawner`] is the real implementation.
//!
//! A [`TaskHandle`] owns the join handle and the cancellation token of one
//! running task. Whoever holds the handle is responsible for it: the task
//! itself drops it on normal exit (detaching the thread as it winds down),
//! teardown takes it to cancel and join.

use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

use crate::error::TaskKind;
use crate::sync::CancelToken;

/// Body of a harness task.
pub type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// Starts harness tasks.
pub trait Spawner: Send + Sync {
    /// Starts `body` as task `kind` on a thread called `name`.
    fn spawn(&self, kind: TaskKind, name: String, body: TaskBody) -> io::Result<JoinHandle<()>>;
}

/// Spawns each task on a named OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    stack_size: Option<usize>,
}

impl ThreadSpawner {
    /// Creates a spawner using the platform default stack size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stack size for spawned threads.
    #[must_use]
    pub const fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, _kind: TaskKind, name: String, body: TaskBody) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(name);
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder.spawn(body)
    }
}

/// Owning reference to a running harness task.
pub struct TaskHandle {
    kind: TaskKind,
    join: JoinHandle<()>,
    cancel: CancelToken,
}

impl TaskHandle {
    pub(crate) const fn new(kind: TaskKind, join: JoinHandle<()>, cancel: CancelToken) -> Self {
        Self { kind, join, cancel }
    }

    /// Which task this handle refers to.
    #[must_use]
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Thread name of the task.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.join.thread().name()
    }

    /// Returns true if the task's thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Requests cancellation.
    ///
    /// This is a request: the task stops at its next checkpoint. A task
    /// blocked inside an opaque call stops only after the call returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the task to exit. Returns false if it panicked.
    pub fn join(self) -> bool {
        match self.join.join() {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(task = %self.kind, "task panicked");
                false
            }
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
