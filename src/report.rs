//! Per-worker outcome records and run summaries.

use core::fmt;

use serde::Serialize;

use crate::config::ModeKind;
use crate::resolve::Status;
use crate::waker::WakerExit;

/// What a worker's resolution attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    /// By-name resolution returned this status code.
    Status(Status),
    /// Filesystem-type lookup found (`true`) or did not find the type.
    Resolved(bool),
    /// The resolution call panicked.
    Panicked,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "status {code}"),
            Self::Resolved(found) => write!(f, "resolved: {found}"),
            Self::Panicked => f.write_str("panicked"),
        }
    }
}

/// One line of the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    /// Worker index.
    pub index: usize,
    /// Recorded outcome; `None` if the slot holds no result.
    pub outcome: Option<Outcome>,
}

impl fmt::Display for OutcomeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Some(outcome) => write!(f, "worker {} {outcome}", self.index),
            None => write!(f, "worker {} no result", self.index),
        }
    }
}

/// Results of a run in which every worker started and finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Mode the run exercised.
    pub mode: ModeKind,
    /// Target name.
    pub target: String,
    /// Configured worker count.
    pub workers: usize,
    /// One record per worker slot, in index order.
    pub records: Vec<OutcomeRecord>,
    /// Worker whose completion fired the completion signal.
    pub last_worker: Option<usize>,
    /// Wake signals issued up to the moment the report was built.
    pub wake_signals: u64,
    /// How the waker exited, if it had by the time the report was built.
    pub waker_exit: Option<WakerExit>,
}

impl RunReport {
    /// Records carrying a by-name status code.
    pub fn statuses(&self) -> impl Iterator<Item = (usize, Status)> + '_ {
        self.records.iter().filter_map(|r| match r.outcome {
            Some(Outcome::Status(code)) => Some((r.index, code)),
            _ => None,
        })
    }

    /// Number of records whose outcome is a non-zero status or a panic.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.records
            .iter()
            .filter(|r| match r.outcome {
                Some(Outcome::Status(code)) => code != 0,
                Some(Outcome::Panicked) => true,
                Some(Outcome::Resolved(_)) | None => false,
            })
            .count()
    }
}

/// Result of [`Harness::start`](crate::Harness::start).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunSummary {
    /// All workers started; the completion signal fired and results were
    /// collected.
    Completed(RunReport),
    /// At least one worker failed to start. Results are unavailable and the
    /// wait/report phase was skipped.
    Aborted {
        /// Indices of the workers that could not be spawned.
        failed_spawns: Vec<usize>,
    },
}

impl RunSummary {
    /// Returns the report of a completed run.
    #[must_use]
    pub const fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Aborted { .. } => None,
        }
    }

    /// Returns true if the run was aborted by a spawn failure.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// What teardown had to clean up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// True if the waker was still registered and had to be stopped.
    pub stopped_waker: bool,
    /// Workers that were still registered and had to be stopped.
    pub stopped_workers: Vec<usize>,
    /// Owned resolved-type handles given back to the resolver.
    pub released_handles: usize,
}

impl TeardownReport {
    /// Returns true if teardown found nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.stopped_waker && self.stopped_workers.is_empty() && self.released_handles == 0
    }
}
