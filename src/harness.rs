//! The harness controller.
//!
//! A [`Harness`] owns everything one run needs: the validated configuration,
//! the resolver, the result table, the shared progress state, the
//! coordinator and the waker registration. Nothing is process-global, so
//! independent runs can coexist.
//!
//! # Lifecycle
//!
//! 1. [`Harness::initialize`] (or [`HarnessBuilder::build`]) validates the
//!    configuration.
//! 2. [`Harness::start`] spawns the waker, then every worker, each spawn
//!    bracketed by wake signals. A worker spawn failure does not stop the
//!    loop. If every worker started, it waits for the completion signal and
//!    reports one record per worker; otherwise it skips waiting and
//!    reporting entirely.
//! 3. [`Harness::stop`] cancels and joins whatever is still registered and
//!    gives back owned resolved-type handles. It is idempotent and also runs
//!    on drop.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::HarnessConfig;
use crate::coordinator::Coordinator;
use crate::error::{HarnessError, Result, SpawnError, TaskKind};
use crate::report::{RunReport, RunSummary, TeardownReport};
use crate::resolve::Resolver;
use crate::spawn::{Spawner, TaskHandle, ThreadSpawner};
use crate::sync::{CancelToken, Progress, SharedState};
use crate::table::{ResultTable, SlotState};
use crate::waker::{run_waker, WakerExit};
use crate::worker::run_worker;

/// State shared by the controller and every task of one run.
pub(crate) struct Run<R: Resolver> {
    pub(crate) mode: crate::config::Mode,
    pub(crate) resolver: R,
    pub(crate) table: ResultTable<R::Handle>,
    pub(crate) progress: SharedState,
    pub(crate) coordinator: Coordinator,
    pub(crate) waker: Mutex<Option<TaskHandle>>,
    pub(crate) waker_exit: Mutex<Option<WakerExit>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initialized,
    Started,
    Stopped,
}

/// Builder for a [`Harness`] with a custom spawner or coordinator.
#[must_use]
pub struct HarnessBuilder<R, S = ThreadSpawner> {
    config: HarnessConfig,
    resolver: R,
    spawner: S,
    coordinator: Coordinator,
}

impl<R: Resolver> HarnessBuilder<R> {
    /// Starts a builder with the thread spawner and no coordinator.
    pub fn new(config: HarnessConfig, resolver: R) -> Self {
        Self {
            config,
            resolver,
            spawner: ThreadSpawner::default(),
            coordinator: Coordinator::none(),
        }
    }
}

impl<R: Resolver, S: Spawner> HarnessBuilder<R, S> {
    /// Uses `spawner` to start tasks.
    pub fn spawner<S2: Spawner>(self, spawner: S2) -> HarnessBuilder<R, S2> {
        HarnessBuilder {
            config: self.config,
            resolver: self.resolver,
            spawner,
            coordinator: self.coordinator,
        }
    }

    /// Aims wake signals at `coordinator`.
    pub fn coordinator(mut self, coordinator: Coordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Validates the configuration and builds the harness.
    pub fn build(self) -> Result<Harness<R, S>> {
        self.config.validate()?;
        let workers = self.config.workers;

        tracing::info!(
            mode = %self.config.mode.kind(),
            target = %self.config.mode.target(),
            workers,
            waker = %self.config.waker,
            coordinator = self.coordinator.target_name().unwrap_or("<none>"),
            "testing resolution"
        );
        tracing::info!("worker ids will range from 0 to {}", workers - 1);

        let run = Arc::new(Run {
            mode: self.config.mode.clone(),
            resolver: self.resolver,
            table: ResultTable::new(workers),
            progress: SharedState::new(workers),
            coordinator: self.coordinator,
            waker: Mutex::new(None),
            waker_exit: Mutex::new(None),
        });

        Ok(Harness {
            config: self.config,
            spawner: self.spawner,
            run,
            phase: Phase::Initialized,
            failed_spawns: Vec::new(),
            waited: false,
        })
    }
}

/// Controller for one stress run.
pub struct Harness<R: Resolver, S: Spawner = ThreadSpawner> {
    config: HarnessConfig,
    spawner: S,
    run: Arc<Run<R>>,
    phase: Phase,
    failed_spawns: Vec<usize>,
    waited: bool,
}

impl<R: Resolver> Harness<R> {
    /// Validates `config` and prepares a run using OS threads.
    pub fn initialize(config: HarnessConfig, resolver: R) -> Result<Self> {
        HarnessBuilder::new(config, resolver).build()
    }

    /// Starts a builder for customizing the spawner or coordinator.
    pub fn builder(config: HarnessConfig, resolver: R) -> HarnessBuilder<R> {
        HarnessBuilder::new(config, resolver)
    }
}

impl<R: Resolver, S: Spawner> Harness<R, S> {
    /// Runs the stress test.
    ///
    /// Returns an error only for failures that prevent the run from starting
    /// (a waker spawn failure, a second call) or for an expired completion
    /// wait. Worker spawn failures yield [`RunSummary::Aborted`].
    pub fn start(&mut self) -> Result<RunSummary> {
        if self.phase != Phase::Initialized {
            return Err(HarnessError::AlreadyStarted);
        }
        self.phase = Phase::Started;

        self.start_waker()?;
        self.run_workers();

        if self.any_error() {
            tracing::warn!(
                failed = ?self.failed_spawns,
                "at least one worker failed to start; run aborted before completion, results unavailable"
            );
            return Ok(RunSummary::Aborted {
                failed_spawns: self.failed_spawns.clone(),
            });
        }

        tracing::info!("no errors while starting workers");
        let report = self.wait_and_report()?;
        Ok(RunSummary::Completed(report))
    }

    fn start_waker(&self) -> Result<()> {
        let cancel = CancelToken::new();
        let strategy = self.config.waker;
        let body = {
            let run = Arc::clone(&self.run);
            let cancel = cancel.clone();
            Box::new(move || run_waker(&run, strategy, &cancel))
        };

        // Registration happens under the lock so the waker cannot unregister
        // before the handle is stored.
        let mut registered = self.run.waker.lock();
        let join = self
            .spawner
            .spawn(TaskKind::Waker, self.config.waker_thread_name(), body)
            .map_err(|source| {
                tracing::warn!(error = %source, "failed to set up waker task");
                SpawnError::new(TaskKind::Waker, source)
            })?;
        *registered = Some(TaskHandle::new(TaskKind::Waker, join, cancel));
        drop(registered);
        Ok(())
    }

    fn run_workers(&mut self) {
        for index in 0..self.config.workers {
            self.run.coordinator.wake();
            let started = self.spawn_worker(index);
            self.run.coordinator.wake();
            match started {
                Ok(()) => tracing::debug!(index, "kicked off worker"),
                Err(err) => {
                    tracing::warn!(index, error = %err.source, "setting up worker failed");
                    self.failed_spawns.push(index);
                }
            }
        }
    }

    fn spawn_worker(&self, index: usize) -> std::result::Result<(), SpawnError> {
        let cancel = CancelToken::new();
        let body = {
            let run = Arc::clone(&self.run);
            let cancel = cancel.clone();
            Box::new(move || run_worker(&run, index, &cancel))
        };

        // The worker's first step locks this slot, so it cannot run ahead of
        // the handle being stored.
        let mut slot = self.run.table.slot(index);
        slot.state = SlotState::Spawned;
        let spawned = self.spawner.spawn(
            TaskKind::Worker(index),
            self.config.worker_thread_name(index),
            body,
        );
        match spawned {
            Ok(join) => {
                slot.task = Some(TaskHandle::new(TaskKind::Worker(index), join, cancel));
                Ok(())
            }
            Err(source) => {
                slot.state = SlotState::SpawnFailed;
                slot.task = None;
                Err(SpawnError::new(TaskKind::Worker(index), source))
            }
        }
    }

    fn wait_and_report(&mut self) -> Result<RunReport> {
        self.waited = true;
        let timeout = self.config.completion_timeout;
        if !self.run.progress.wait_for_completion(timeout) {
            let progress = self.run.progress.snapshot();
            return Err(HarnessError::CompletionTimeout {
                timeout: timeout.unwrap_or_default(),
                completed: progress.completed,
                expected: progress.expected,
            });
        }

        let records = self.run.table.records();
        for record in &records {
            tracing::info!(index = record.index, "{record}");
        }
        let progress = self.run.progress.snapshot();
        if let Some(last) = progress.last_worker {
            tracing::info!(last_worker = last, "last worker to run: {last}");
        }

        Ok(RunReport {
            mode: self.config.mode.kind(),
            target: self.config.mode.target().to_string(),
            workers: self.config.workers,
            records,
            last_worker: progress.last_worker,
            wake_signals: self.run.coordinator.attempted(),
            waker_exit: self.waker_exit(),
        })
    }

    /// Stops everything still alive and releases owned handles.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub fn stop(&mut self) -> TeardownReport {
        if self.phase == Phase::Stopped {
            return TeardownReport::default();
        }
        self.phase = Phase::Stopped;
        tracing::info!("ending resolution tests");

        let mut report = TeardownReport::default();

        let waker = self.run.waker.lock().take();
        if let Some(handle) = waker {
            tracing::info!("stopping waker task");
            handle.cancel();
            self.run.progress.interrupt();
            handle.join();
            report.stopped_waker = true;
        }

        let live: Vec<(usize, TaskHandle)> = (0..self.config.workers)
            .filter_map(|index| self.run.table.take_task(index).map(|h| (index, h)))
            .collect();
        for (index, handle) in &live {
            tracing::info!(index, "stopping still-running worker");
            handle.cancel();
        }
        for (index, handle) in live {
            handle.join();
            self.run.table.settle_cancelled(index);
            report.stopped_workers.push(index);
        }

        for index in 0..self.config.workers {
            if let Some(handle) = self.run.table.take_resolved_type(index) {
                self.run.resolver.release(handle);
                report.released_handles += 1;
            }
        }

        tracing::debug!(?report, "teardown finished");
        report
    }

    /// The configuration this run was built with.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The resolver shared by every worker.
    #[must_use]
    pub fn resolver(&self) -> &R {
        &self.run.resolver
    }

    /// The spawner used to start tasks.
    #[must_use]
    pub const fn spawner(&self) -> &S {
        &self.spawner
    }

    /// The result table.
    #[must_use]
    pub fn table(&self) -> &ResultTable<R::Handle> {
        &self.run.table
    }

    /// Snapshot of the progress counter and completion signal.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.run.progress.snapshot()
    }

    /// The wake-signal target.
    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.run.coordinator
    }

    /// True if any worker failed to start.
    #[must_use]
    pub fn any_error(&self) -> bool {
        !self.failed_spawns.is_empty()
    }

    /// Indices of workers that failed to start.
    #[must_use]
    pub fn failed_spawns(&self) -> &[usize] {
        &self.failed_spawns
    }

    /// True if the controller waited on the completion signal.
    #[must_use]
    pub const fn waited_for_completion(&self) -> bool {
        self.waited
    }

    /// True while the waker's handle is registered.
    #[must_use]
    pub fn waker_registered(&self) -> bool {
        self.run.waker.lock().is_some()
    }

    /// How the waker exited, once it has.
    #[must_use]
    pub fn waker_exit(&self) -> Option<WakerExit> {
        *self.run.waker_exit.lock()
    }
}

impl<R: Resolver, S: Spawner> Drop for Harness<R, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: Resolver, S: Spawner> std::fmt::Debug for Harness<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("progress", &self.progress())
            .field("failed_spawns", &self.failed_spawns)
            .finish_non_exhaustive()
    }
}
