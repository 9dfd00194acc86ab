//! Harness E2E suite.
//!
//! End-to-end runs of the controller against scripted resolvers:
//!   - By-name runs where every worker succeeds or fails uniformly
//!   - Worker spawn failure suppressing the wait/report phase
//!   - Filesystem mode alternating by-name resolution and lookups
//!   - Teardown of still-running workers and release of owned handles
//!
//! All tests use structured logging via `init_test`.

#[macro_use]
mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use resolve_stress::test_utils::{BlockingResolver, FailingSpawner, ScriptedResolver};
use resolve_stress::{
    Coordinator, Harness, HarnessError, Outcome, ResolveCx, Resolver, RunSummary, SlotState,
    SpawnError, Status, TaskKind,
};

fn init_test(test_name: &str) {
    init_test_logging();
    test_phase!(test_name);
}

// ============================================================================
// By-name runs
// ============================================================================

#[test]
fn all_workers_succeed_by_name() {
    init_test("all_workers_succeed_by_name");

    let mut harness =
        Harness::initialize(by_name_config("dummy", 4), ScriptedResolver::new(0)).unwrap();
    let summary = harness.start().expect("run completes");

    let report = summary.report().expect("report available");
    let lines: Vec<String> = report.records.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "worker 0 status 0",
            "worker 1 status 0",
            "worker 2 status 0",
            "worker 3 status 0",
        ]
    );
    assert_eq!(report.failures(), 0);

    let progress = harness.progress();
    assert_with_log!(progress.completed == 4, "counter", 4, progress.completed);
    assert_with_log!(progress.signals_fired == 1, "signal fired once", 1, progress.signals_fired);
    assert!(progress.last_worker.is_some_and(|w| w < 4));
    assert_eq!(report.last_worker, progress.last_worker);
    assert!(harness.waited_for_completion());
    assert!(!harness.any_error());
    assert_eq!(harness.resolver().calls(), 4);

    test_section!("teardown");
    let teardown = harness.stop();
    assert_eq!(teardown.released_handles, 0);
    assert!(harness
        .table()
        .states()
        .iter()
        .all(|s| *s == SlotState::Completed));
    assert_eq!(harness.table().live_tasks(), 0);
    assert!(!harness.waker_registered());

    test_complete!("all_workers_succeed_by_name", workers = 4);
}

#[test]
fn failure_statuses_are_reported_verbatim() {
    init_test("failure_statuses_are_reported_verbatim");

    let mut harness =
        Harness::initialize(by_name_config("missing", 3), ScriptedResolver::new(-2)).unwrap();
    let summary = harness.start().expect("run completes");
    let report = summary.report().expect("report available");

    let statuses: Vec<(usize, Status)> = report.statuses().collect();
    assert_eq!(statuses, vec![(0, -2), (1, -2), (2, -2)]);
    assert_eq!(report.failures(), 3);

    test_complete!("failure_statuses_are_reported_verbatim");
}

#[test]
fn panicking_resolution_is_recorded_and_counted() {
    init_test("panicking_resolution_is_recorded_and_counted");

    let resolver = ScriptedResolver::new(0).panicking_at(2);
    let mut harness = Harness::initialize(by_name_config("dummy", 4), resolver).unwrap();
    let summary = harness.start().expect("run completes despite the panic");
    let report = summary.report().expect("report available");

    assert_eq!(report.records[2].outcome, Some(Outcome::Panicked));
    assert_eq!(report.failures(), 1);
    assert_eq!(harness.progress().completed, 4);

    test_complete!("panicking_resolution_is_recorded_and_counted");
}

#[test]
fn second_start_is_rejected() {
    init_test("second_start_is_rejected");

    let mut harness =
        Harness::initialize(by_name_config("dummy", 2), ScriptedResolver::new(0)).unwrap();
    harness.start().expect("first run");
    let err = harness.start().expect_err("second run");
    assert!(matches!(err, HarnessError::AlreadyStarted));
    assert_eq!(harness.resolver().calls(), 2);

    test_complete!("second_start_is_rejected");
}

#[test]
fn every_worker_runs_on_its_own_named_thread() {
    init_test("every_worker_runs_on_its_own_named_thread");

    let mut harness =
        Harness::initialize(by_name_config("dummy", 8), ScriptedResolver::new(0)).unwrap();
    harness.start().expect("run completes");

    let names = harness.resolver().thread_names();
    assert_eq!(names.len(), 8);
    for (index, name) in &names {
        assert_eq!(name.as_deref(), Some(format!("stress-test-{index}").as_str()));
    }
    let distinct: BTreeSet<_> = names.values().collect();
    assert_eq!(distinct.len(), 8);

    test_complete!("every_worker_runs_on_its_own_named_thread");
}

#[test]
fn wake_signals_bracket_every_spawn() {
    init_test("wake_signals_bracket_every_spawn");

    let mut harness = Harness::builder(by_name_config("dummy", 5), ScriptedResolver::new(0))
        .coordinator(Coordinator::current())
        .build()
        .unwrap();
    let summary = harness.start().expect("run completes");

    // Two signals per spawn from the controller alone.
    let delivered = harness.coordinator().delivered();
    assert_with_log!(delivered >= 10, "delivered wake signals", ">= 10", delivered);
    assert!(summary.report().unwrap().wake_signals >= 10);

    test_complete!("wake_signals_bracket_every_spawn", delivered = delivered);
}

#[test]
fn unbounded_completion_timeout_still_completes() {
    init_test("unbounded_completion_timeout_still_completes");

    let mut config = by_name_config("dummy", 2);
    config.completion_timeout = Some(Duration::MAX);
    let mut harness = Harness::initialize(config, ScriptedResolver::new(0)).unwrap();
    let summary = harness.start().expect("run completes");

    assert_eq!(summary.report().expect("report available").records.len(), 2);
    assert_eq!(harness.progress().signals_fired, 1);

    test_complete!("unbounded_completion_timeout_still_completes");
}

// ============================================================================
// Spawn failures
// ============================================================================

#[test]
fn worker_spawn_failure_skips_reporting() {
    init_test("worker_spawn_failure_skips_reporting");

    let mut harness = Harness::builder(by_name_config("dummy", 4), BlockingResolver::new())
        .spawner(FailingSpawner::refusing([TaskKind::Worker(2)]))
        .build()
        .unwrap();
    let summary = harness.start().expect("aborted runs are not errors");

    assert_eq!(
        summary,
        RunSummary::Aborted {
            failed_spawns: vec![2]
        }
    );
    assert!(harness.any_error());
    assert!(!harness.waited_for_completion());

    test_section!("spawn loop continued past the failure");
    assert_eq!(
        harness.spawner().attempts(),
        vec![
            TaskKind::Waker,
            TaskKind::Worker(0),
            TaskKind::Worker(1),
            TaskKind::Worker(2),
            TaskKind::Worker(3),
        ]
    );
    assert_eq!(harness.table().state(2), SlotState::SpawnFailed);

    test_section!("teardown cancels the still-running workers");
    let teardown = harness.stop();
    assert_eq!(teardown.stopped_workers, vec![0, 1, 3]);
    assert_eq!(
        harness.table().states(),
        vec![
            SlotState::Cancelled,
            SlotState::Cancelled,
            SlotState::SpawnFailed,
            SlotState::Cancelled,
        ]
    );
    assert_eq!(harness.progress().completed, 0);
    assert_eq!(harness.progress().signals_fired, 0);
    assert!(harness.table().records().iter().all(|r| r.outcome.is_none()));

    test_complete!("worker_spawn_failure_skips_reporting");
}

#[test]
fn waker_spawn_failure_spawns_no_workers() {
    init_test("waker_spawn_failure_spawns_no_workers");

    let mut harness = Harness::builder(by_name_config("dummy", 4), ScriptedResolver::new(0))
        .spawner(FailingSpawner::refusing([TaskKind::Waker]))
        .build()
        .unwrap();
    let err = harness.start().expect_err("waker failure is fatal");

    assert!(matches!(
        err,
        HarnessError::Spawn(SpawnError {
            task: TaskKind::Waker,
            ..
        })
    ));
    assert!(err.is_pre_spawn());
    assert_eq!(harness.spawner().attempts(), vec![TaskKind::Waker]);
    assert_eq!(harness.resolver().calls(), 0);
    assert!(harness.table().states().iter().all(|s| *s == SlotState::Empty));
    assert!(harness.stop().is_noop());

    test_complete!("waker_spawn_failure_spawns_no_workers");
}

// ============================================================================
// Filesystem-type mode
// ============================================================================

#[test]
fn fs_mode_alternates_by_worker_parity() {
    init_test("fs_mode_alternates_by_worker_parity");

    let mut harness =
        Harness::initialize(fs_type_config("fakefs", 4), ScriptedResolver::new(0)).unwrap();
    let summary = harness.start().expect("run completes");
    let report = summary.report().expect("report available");

    let outcomes: Vec<_> = report.records.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            Some(Outcome::Status(0)),
            Some(Outcome::Resolved(false)),
            Some(Outcome::Status(0)),
            Some(Outcome::Resolved(false)),
        ]
    );
    assert_eq!(report.records[1].to_string(), "worker 1 resolved: false");

    let teardown = harness.stop();
    assert_eq!(teardown.released_handles, 0);
    assert!(harness.resolver().released().is_empty());

    test_complete!("fs_mode_alternates_by_worker_parity");
}

#[test]
fn owned_handles_are_released_exactly_once() {
    init_test("owned_handles_are_released_exactly_once");

    let resolver = ScriptedResolver::new(0).knowing("fakefs");
    let mut harness = Harness::initialize(fs_type_config("fakefs", 6), resolver).unwrap();
    let summary = harness.start().expect("run completes");
    let report = summary.report().expect("report available");

    assert_eq!(report.records[5].outcome, Some(Outcome::Resolved(true)));
    assert_eq!(harness.resolver().issued(), 3);
    assert_eq!(harness.table().held_resolved_types(), 3);

    test_section!("first teardown releases");
    let teardown = harness.stop();
    assert_eq!(teardown.released_handles, 3);
    let mut released = harness.resolver().released();
    released.sort_unstable();
    assert_eq!(released, vec![0, 1, 2]);
    assert_eq!(harness.table().held_resolved_types(), 0);

    test_section!("second teardown is a no-op");
    assert!(harness.stop().is_noop());
    assert_eq!(harness.resolver().released().len(), 3);

    test_complete!("owned_handles_are_released_exactly_once");
}

#[derive(Debug)]
struct SharedCounts {
    released: Arc<AtomicUsize>,
}

impl Resolver for SharedCounts {
    type Handle = usize;

    fn resolve(&self, _cx: &ResolveCx<'_>, _name: &str) -> Status {
        0
    }

    fn lookup_fs_type(&self, cx: &ResolveCx<'_>, _name: &str) -> Option<usize> {
        Some(cx.index())
    }

    fn release(&self, _handle: usize) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn dropping_the_harness_runs_teardown() {
    init_test("dropping_the_harness_runs_teardown");

    let released = Arc::new(AtomicUsize::new(0));
    {
        let resolver = SharedCounts {
            released: Arc::clone(&released),
        };
        let mut harness = Harness::initialize(fs_type_config("fakefs", 4), resolver).unwrap();
        harness.start().expect("run completes");
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }
    assert_eq!(released.load(Ordering::SeqCst), 2);

    test_complete!("dropping_the_harness_runs_teardown");
}

#[test]
fn cancelled_lookup_still_releases_its_handle() {
    init_test("cancelled_lookup_still_releases_its_handle");

    // Worker 1 resolves slowly; worker 2 cannot start, so teardown cancels
    // worker 1 while its lookup is in flight.
    let resolver = ScriptedResolver::new(0)
        .knowing("fakefs")
        .with_delay(Duration::from_millis(50));
    let mut harness = Harness::builder(fs_type_config("fakefs", 3), resolver)
        .spawner(FailingSpawner::refusing([TaskKind::Worker(2)]))
        .build()
        .unwrap();
    let summary = harness.start().expect("aborted run");
    assert!(summary.is_aborted());

    let teardown = harness.stop();
    let issued = harness.resolver().issued();
    assert_eq!(teardown.released_handles, issued);
    assert_eq!(harness.resolver().released().len(), issued);
    assert_eq!(harness.table().held_resolved_types(), 0);

    test_complete!("cancelled_lookup_still_releases_its_handle", issued = issued);
}
