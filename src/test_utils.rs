//! Test utilities for the stress harness.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Scripted resolvers with observable call and release counts
//! - A spawner that refuses chosen tasks
//!
//! # Example
//! ```
//! use resolve_stress::test_utils::{init_test_logging, ScriptedResolver};
//! use resolve_stress::{Harness, HarnessConfig, Mode};
//!
//! init_test_logging();
//! let config = HarnessConfig::builder(Mode::ResolveByName("dummy".into()))
//!     .workers(4)
//!     .build()
//!     .unwrap();
//! let mut harness = Harness::initialize(config, ScriptedResolver::new(0)).unwrap();
//! let summary = harness.start().unwrap();
//! assert_eq!(summary.report().unwrap().records.len(), 4);
//! ```

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::TaskKind;
use crate::resolve::{ResolveCx, Resolver, Status};
use crate::spawn::{Spawner, TaskBody, ThreadSpawner};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Handle produced by [`ScriptedResolver`] lookups.
///
/// Each handle carries a serial number so tests can tell releases apart.
#[derive(Debug, PartialEq, Eq)]
pub struct MockFsType {
    /// Filesystem type name.
    pub name: String,
    /// Serial number, unique per resolver.
    pub serial: usize,
}

/// Resolver with scripted results.
///
/// By-name resolution returns a fixed status. Lookups succeed only for the
/// configured filesystem type. Every call records the calling thread's name,
/// and every release is counted.
#[derive(Debug)]
pub struct ScriptedResolver {
    status: Status,
    known_fs_type: Option<String>,
    delay: Option<Duration>,
    panic_at: Option<usize>,
    calls: AtomicUsize,
    issued: AtomicUsize,
    released: Mutex<Vec<usize>>,
    threads: Mutex<BTreeMap<usize, Option<String>>>,
}

impl ScriptedResolver {
    /// Resolver whose by-name calls return `status` and whose lookups find nothing.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            known_fs_type: None,
            delay: None,
            panic_at: None,
            calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
            threads: Mutex::new(BTreeMap::new()),
        }
    }

    /// Lookups of `name` succeed and hand out an owned handle.
    #[must_use]
    pub fn knowing(mut self, name: impl Into<String>) -> Self {
        self.known_fs_type = Some(name.into());
        self
    }

    /// Every call sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The call made by worker `index` panics.
    #[must_use]
    pub fn panicking_at(mut self, index: usize) -> Self {
        self.panic_at = Some(index);
        self
    }

    /// Total calls made, of either kind.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Handles handed out by lookups.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Serial numbers of released handles, in release order.
    #[must_use]
    pub fn released(&self) -> Vec<usize> {
        self.released.lock().clone()
    }

    /// Thread name observed by each calling worker, keyed by index.
    #[must_use]
    pub fn thread_names(&self) -> BTreeMap<usize, Option<String>> {
        self.threads.lock().clone()
    }

    fn enter(&self, cx: &ResolveCx<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.threads
            .lock()
            .insert(cx.index(), thread::current().name().map(str::to_owned));
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.panic_at == Some(cx.index()) {
            panic!("scripted panic in worker {}", cx.index());
        }
    }
}

impl Resolver for ScriptedResolver {
    type Handle = MockFsType;

    fn resolve(&self, cx: &ResolveCx<'_>, _name: &str) -> Status {
        self.enter(cx);
        self.status
    }

    fn lookup_fs_type(&self, cx: &ResolveCx<'_>, name: &str) -> Option<MockFsType> {
        self.enter(cx);
        if self.known_fs_type.as_deref() != Some(name) {
            return None;
        }
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        Some(MockFsType {
            name: name.to_owned(),
            serial,
        })
    }

    fn release(&self, handle: MockFsType) {
        self.released.lock().push(handle.serial);
    }
}

/// Resolver whose calls do not return until the caller is asked to stop.
///
/// Models a resolution that hangs, so tests can drive teardown against
/// workers that are still running.
#[derive(Debug, Default)]
pub struct BlockingResolver {
    entered: AtomicUsize,
}

impl BlockingResolver {
    /// Creates a blocking resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls currently or previously entered.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    fn block(&self, cx: &ResolveCx<'_>) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        while !cx.is_cancel_requested() {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Resolver for BlockingResolver {
    type Handle = ();

    fn resolve(&self, cx: &ResolveCx<'_>, _name: &str) -> Status {
        self.block(cx);
        0
    }

    fn lookup_fs_type(&self, cx: &ResolveCx<'_>, _name: &str) -> Option<()> {
        self.block(cx);
        None
    }
}

/// Spawner that refuses a chosen set of tasks and starts the rest on threads.
#[derive(Debug, Default)]
pub struct FailingSpawner {
    refuse: HashSet<TaskKind>,
    inner: ThreadSpawner,
    attempts: Mutex<Vec<TaskKind>>,
}

impl FailingSpawner {
    /// Refuses every task in `refuse`.
    #[must_use]
    pub fn refusing(refuse: impl IntoIterator<Item = TaskKind>) -> Self {
        Self {
            refuse: refuse.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Every spawn request seen, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<TaskKind> {
        self.attempts.lock().clone()
    }
}

impl Spawner for FailingSpawner {
    fn spawn(&self, kind: TaskKind, name: String, body: TaskBody) -> io::Result<JoinHandle<()>> {
        self.attempts.lock().push(kind);
        if self.refuse.contains(&kind) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("refusing to spawn {kind}"),
            ));
        }
        self.inner.spawn(kind, name, body)
    }
}
