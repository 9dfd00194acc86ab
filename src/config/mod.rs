//! Harness configuration.
//!
//! A run is described by a [`HarnessConfig`]: which resolution [`Mode`] to
//! exercise and against which target, how many workers to spawn, and how the
//! waker task behaves. The configuration is validated once and is immutable
//! for the lifetime of a run.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `workers` | 48 |
//! | `waker` | busy-poll, 1,400,000 iterations |
//! | `thread_name_prefix` | `"resolve-stress"` |
//! | `completion_timeout` | `None` (wait until signalled) |
//!
//! Environment overrides are applied by [`env::apply_env_overrides`].

pub mod env;

use core::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::ConfigError;

/// Default number of workers spawned per run.
pub const DEFAULT_WORKERS: usize = 48;
/// Default safety cap on busy-poll iterations of the waker task.
pub const DEFAULT_ITERATION_BOUND: u64 = 1_400_000;
/// Default thread name prefix.
pub const DEFAULT_THREAD_PREFIX: &str = "resolve-stress";

/// What each worker resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "mode", content = "target", rename_all = "snake_case")]
pub enum Mode {
    /// Every worker resolves the named resource.
    ResolveByName(String),
    /// Even workers resolve the named resource; odd workers look up an
    /// already-registered filesystem type by the same name.
    CheckFilesystemType(String),
}

/// Payload-free tag of a [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    /// See [`Mode::ResolveByName`].
    ResolveByName,
    /// See [`Mode::CheckFilesystemType`].
    CheckFilesystemType,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveByName => f.write_str("resolve-by-name"),
            Self::CheckFilesystemType => f.write_str("check-filesystem-type"),
        }
    }
}

impl Mode {
    /// Builds a mode from the two mutually exclusive selector options.
    ///
    /// Exactly one selector must be set.
    pub fn from_selectors(
        resolve_name: Option<String>,
        fs_type: Option<String>,
    ) -> Result<Self, ConfigError> {
        match (resolve_name, fs_type) {
            (Some(name), None) => Ok(Self::ResolveByName(name)),
            (None, Some(name)) => Ok(Self::CheckFilesystemType(name)),
            (None, None) => Err(ConfigError::NoMode),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingModes),
        }
    }

    /// Returns the target name.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::ResolveByName(name) | Self::CheckFilesystemType(name) => name,
        }
    }

    /// Returns the payload-free tag.
    #[must_use]
    pub const fn kind(&self) -> ModeKind {
        match self {
            Self::ResolveByName(_) => ModeKind::ResolveByName,
            Self::CheckFilesystemType(_) => ModeKind::CheckFilesystemType,
        }
    }

    /// Returns true if the worker at `index` performs the by-name resolution,
    /// false if it performs the filesystem-type lookup.
    #[must_use]
    pub const fn resolves_by_name_at(&self, index: usize) -> bool {
        match self {
            Self::ResolveByName(_) => true,
            Self::CheckFilesystemType(_) => index % 2 == 0,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind(), self.target())
    }
}

/// How the waker task paces its wake signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakerStrategy {
    /// Spin on the progress counter, issuing one wake signal per iteration,
    /// and give up after `iteration_bound` signals.
    BusyPoll {
        /// Maximum wake signals before the waker bails.
        iteration_bound: u64,
    },
    /// Block on the progress condition variable and issue one wake signal
    /// per observed counter change.
    Notified,
}

impl Default for WakerStrategy {
    fn default() -> Self {
        Self::BusyPoll {
            iteration_bound: DEFAULT_ITERATION_BOUND,
        }
    }
}

impl fmt::Display for WakerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusyPoll { iteration_bound } => write!(f, "busy-poll (bound {iteration_bound})"),
            Self::Notified => f.write_str("notified"),
        }
    }
}

/// Configuration for a single harness run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Resolution mode and target.
    pub mode: Mode,
    /// Number of workers, fixed for the run.
    pub workers: usize,
    /// Waker pacing.
    pub waker: WakerStrategy,
    /// Prefix for spawned thread names.
    pub thread_name_prefix: String,
    /// Upper bound on the completion wait; `None` waits until signalled.
    pub completion_timeout: Option<Duration>,
}

impl HarnessConfig {
    /// Creates a configuration with defaults for everything but the mode.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            workers: DEFAULT_WORKERS,
            waker: WakerStrategy::default(),
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            completion_timeout: None,
        }
    }

    /// Starts a builder for the given mode.
    #[must_use]
    pub fn builder(mode: Mode) -> HarnessConfigBuilder {
        HarnessConfigBuilder {
            config: Self::new(mode),
        }
    }

    /// Checks the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.target().trim().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if let WakerStrategy::BusyPoll { iteration_bound: 0 } = self.waker {
            return Err(ConfigError::ZeroIterationBound);
        }
        Ok(())
    }

    /// Name of the waker thread.
    #[must_use]
    pub fn waker_thread_name(&self) -> String {
        format!("{}-waker", self.thread_name_prefix)
    }

    /// Name of the worker thread at `index`.
    #[must_use]
    pub fn worker_thread_name(&self, index: usize) -> String {
        format!("{}-{index}", self.thread_name_prefix)
    }
}

/// Builder for [`HarnessConfig`].
#[derive(Debug, Clone)]
#[must_use]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// Sets the worker count.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Sets the waker strategy.
    pub fn waker(mut self, waker: WakerStrategy) -> Self {
        self.config.waker = waker;
        self
    }

    /// Uses the busy-poll waker with the given iteration bound.
    pub fn iteration_bound(mut self, iteration_bound: u64) -> Self {
        self.config.waker = WakerStrategy::BusyPoll { iteration_bound };
        self
    }

    /// Sets the thread name prefix.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Bounds the completion wait.
    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.config.completion_timeout = Some(timeout);
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<HarnessConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
