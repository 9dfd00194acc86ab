//! Worker task body.
//!
//! A worker makes exactly one resolution attempt, records it in its own slot,
//! counts itself in the shared progress state and clears its task handle.
//! Wake signals bracket each step so the coordinator is poked while the
//! resolution is in flight.
//!
//! Cancellation is checked before the attempt and after it returns. A worker
//! that sees a stop request records no outcome and is not counted.

use std::panic::{self, AssertUnwindSafe};

use crate::harness::Run;
use crate::report::Outcome;
use crate::resolve::{ResolveCx, Resolver};
use crate::sync::CancelToken;
use crate::table::SlotState;

struct Attempt<H> {
    outcome: Outcome,
    resolved_type: Option<H>,
}

pub(crate) fn run_worker<R: Resolver>(run: &Run<R>, index: usize, cancel: &CancelToken) {
    // Blocks until the controller has stored this worker's handle.
    run.table.slot(index).state = SlotState::Running;
    run.coordinator.wake();

    if cancel.is_cancelled() {
        finish(run, index, SlotState::Cancelled);
        return;
    }

    let cx = ResolveCx::new(index, cancel);
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| attempt(run, &cx, index)))
        .unwrap_or_else(|_| {
            tracing::warn!(index, "resolution call panicked");
            Attempt {
                outcome: Outcome::Panicked,
                resolved_type: None,
            }
        });
    tracing::debug!(index, outcome = %attempt.outcome, "ran worker");
    run.coordinator.wake();

    let cancelled = cancel.is_cancelled();
    {
        let mut slot = run.table.slot(index);
        // Teardown owns the handle from here on, even for a cancelled worker.
        slot.resolved_type = attempt.resolved_type;
        if !cancelled {
            slot.outcome = Some(attempt.outcome);
        }
    }

    if cancelled {
        tracing::debug!(index, "worker cancelled after its resolution call returned");
        finish(run, index, SlotState::Cancelled);
        return;
    }

    if run.progress.record_completion(index) {
        tracing::info!(
            workers = run.progress.expected(),
            last_worker = index,
            "all workers have run"
        );
    }
    finish(run, index, SlotState::Completed);
}

fn attempt<R: Resolver>(run: &Run<R>, cx: &ResolveCx<'_>, index: usize) -> Attempt<R::Handle> {
    let target = run.mode.target();
    if run.mode.resolves_by_name_at(index) {
        Attempt {
            outcome: Outcome::Status(run.resolver.resolve(cx, target)),
            resolved_type: None,
        }
    } else {
        let handle = run.resolver.lookup_fs_type(cx, target);
        Attempt {
            outcome: Outcome::Resolved(handle.is_some()),
            resolved_type: handle,
        }
    }
}

fn finish<R: Resolver>(run: &Run<R>, index: usize, state: SlotState) {
    let handle = {
        let mut slot = run.table.slot(index);
        slot.state = state;
        slot.task.take()
    };
    // Dropping our own join handle detaches the thread; it is about to exit.
    drop(handle);
    run.coordinator.wake();
}
