//! Error types for the stress harness.
//!
//! Errors follow a small taxonomy:
//!
//! - **Configuration**: the run was misconfigured; surfaced before any task
//!   is spawned.
//! - **Spawn**: a task could not be started. A waker spawn failure aborts the
//!   run before any worker is attempted. A worker spawn failure does not
//!   propagate from [`Harness::start`](crate::Harness::start); it suppresses
//!   the wait/report phase instead.
//! - **Completion timeout**: the completion signal was not observed within the
//!   configured window.
//!
//! Resolution failures are never errors. They are status codes recorded per
//! worker and reported verbatim.

use core::fmt;
use std::io;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Identifies which harness task an error or log line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// The auxiliary task that busy-polls progress and issues wake signals.
    Waker,
    /// The worker task at the given slot index.
    Worker(usize),
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waker => f.write_str("waker"),
            Self::Worker(index) => write!(f, "worker {index}"),
        }
    }
}

/// Invalid harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Neither the resolve-by-name nor the filesystem-type selector was set.
    #[error("exactly one mode must be selected, but none was given")]
    NoMode,
    /// Both mode selectors were set.
    #[error("exactly one mode must be selected, but both resolve-by-name and filesystem-type were given")]
    ConflictingModes,
    /// The target name is empty or whitespace.
    #[error("target name must not be empty")]
    EmptyTarget,
    /// The worker count is zero.
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    /// The busy-poll iteration bound is zero.
    #[error("waker iteration bound must be at least 1")]
    ZeroIterationBound,
    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {reason} (got {value:?})")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value as read from the environment.
        value: String,
        /// What was expected.
        reason: String,
    },
}

/// A harness task failed to start.
#[derive(Debug, Error)]
#[error("failed to spawn {task} task")]
pub struct SpawnError {
    /// The task that could not be started.
    pub task: TaskKind,
    /// Underlying OS error.
    #[source]
    pub source: io::Error,
}

impl SpawnError {
    /// Creates a spawn error for the given task.
    #[must_use]
    pub const fn new(task: TaskKind, source: io::Error) -> Self {
        Self { task, source }
    }
}

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A fatal spawn failure (the waker task).
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// The completion signal did not fire within the configured timeout.
    #[error("completion signal not observed within {timeout:?}: {completed} of {expected} workers finished")]
    CompletionTimeout {
        /// Configured wait window.
        timeout: Duration,
        /// Workers that had finished when the wait gave up.
        completed: usize,
        /// Configured worker count.
        expected: usize,
    },
    /// `start` was called on a harness that already ran.
    #[error("harness run already started")]
    AlreadyStarted,
}

impl HarnessError {
    /// Returns true if this error was raised before any task was spawned.
    #[must_use]
    pub const fn is_pre_spawn(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::AlreadyStarted
                | Self::Spawn(SpawnError {
                    task: TaskKind::Waker,
                    ..
                })
        )
    }
}

/// A specialized `Result` type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_display() {
        assert_eq!(TaskKind::Waker.to_string(), "waker");
        assert_eq!(TaskKind::Worker(7).to_string(), "worker 7");
    }

    #[test]
    fn spawn_error_keeps_source() {
        let err = SpawnError::new(
            TaskKind::Worker(3),
            io::Error::new(io::ErrorKind::WouldBlock, "no threads left"),
        );
        assert_eq!(err.to_string(), "failed to spawn worker 3 task");
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("no threads left"));
    }

    #[test]
    fn pre_spawn_classification() {
        assert!(HarnessError::from(ConfigError::NoMode).is_pre_spawn());
        assert!(HarnessError::AlreadyStarted.is_pre_spawn());
        let waker = SpawnError::new(TaskKind::Waker, io::Error::other("boom"));
        assert!(HarnessError::from(waker).is_pre_spawn());

        let timeout = HarnessError::CompletionTimeout {
            timeout: Duration::from_millis(5),
            completed: 1,
            expected: 4,
        };
        assert!(!timeout.is_pre_spawn());
        assert!(timeout.to_string().contains("1 of 4"));
    }

    #[test]
    fn invalid_env_message() {
        let err = ConfigError::InvalidEnv {
            var: "RESOLVE_STRESS_WORKERS",
            value: "lots".into(),
            reason: "expected unsigned integer".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("RESOLVE_STRESS_WORKERS"));
        assert!(msg.contains("\"lots\""));
    }
}
