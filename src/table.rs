//! Index-addressed table of worker slots.
//!
//! Slot `i` belongs to worker `i`: only that worker records a result into it,
//! and only the controller populates it or tears it down. Each slot has its
//! own lock, so workers never contend with each other here.
//!
//! # Slot lifecycle
//!
//! ```text
//! Empty -> Spawned -> Running -> Completed
//!   |                    |
//!   v                    v
//! SpawnFailed         Cancelled
//! ```
//!
//! `Completed` and `Cancelled` both leave the task handle empty; only
//! `Completed` guarantees a recorded outcome. The resolved-type handle of a
//! filesystem-mode lookup stays in the slot until teardown releases it.

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::report::{Outcome, OutcomeRecord};
use crate::spawn::TaskHandle;

/// Lifecycle state of one worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Not yet populated.
    Empty,
    /// Populated; the worker thread has been requested.
    Spawned,
    /// The worker is executing.
    Running,
    /// The worker finished and was counted.
    Completed,
    /// The worker thread could not be started.
    SpawnFailed,
    /// The worker observed a stop request and exited without a result.
    Cancelled,
}

impl SlotState {
    /// Returns true for states no worker will leave again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::SpawnFailed | Self::Cancelled)
    }
}

/// One worker's slot.
#[derive(Debug)]
pub struct WorkerSlot<H> {
    pub(crate) state: SlotState,
    pub(crate) outcome: Option<Outcome>,
    pub(crate) task: Option<TaskHandle>,
    pub(crate) resolved_type: Option<H>,
}

impl<H> WorkerSlot<H> {
    const fn empty() -> Self {
        Self {
            state: SlotState::Empty,
            outcome: None,
            task: None,
            resolved_type: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SlotState {
        self.state
    }

    /// Recorded outcome, if any.
    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Returns true while a task handle is registered.
    #[must_use]
    pub const fn has_task(&self) -> bool {
        self.task.is_some()
    }

    /// Returns true while an owned resolved-type handle is held.
    #[must_use]
    pub const fn has_resolved_type(&self) -> bool {
        self.resolved_type.is_some()
    }
}

/// Fixed-size table of worker slots, sized once per run.
#[derive(Debug)]
pub struct ResultTable<H> {
    slots: Box<[Mutex<WorkerSlot<H>>]>,
}

impl<H> ResultTable<H> {
    /// Creates `len` empty slots.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| Mutex::new(WorkerSlot::empty())).collect(),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the table has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Locks slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn slot(&self, index: usize) -> MutexGuard<'_, WorkerSlot<H>> {
        self.slots[index].lock()
    }

    /// State of slot `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> SlotState {
        self.slot(index).state
    }

    /// States of all slots, in index order.
    #[must_use]
    pub fn states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|slot| slot.lock().state).collect()
    }

    /// Number of slots that still hold a task handle.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.slots.iter().filter(|slot| slot.lock().has_task()).count()
    }

    /// Number of slots that still hold a resolved-type handle.
    #[must_use]
    pub fn held_resolved_types(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.lock().has_resolved_type())
            .count()
    }

    /// One outcome record per slot, in index order.
    #[must_use]
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| OutcomeRecord {
                index,
                outcome: slot.lock().outcome,
            })
            .collect()
    }

    /// Takes the task handle out of slot `index`, if still registered.
    pub fn take_task(&self, index: usize) -> Option<TaskHandle> {
        self.slot(index).task.take()
    }

    /// Takes the resolved-type handle out of slot `index`, if held.
    pub fn take_resolved_type(&self, index: usize) -> Option<H> {
        self.slot(index).resolved_type.take()
    }

    /// Marks slot `index` cancelled unless it already reached a terminal state.
    /// Returns the resulting state.
    pub fn settle_cancelled(&self, index: usize) -> SlotState {
        let mut slot = self.slot(index);
        if !slot.state.is_terminal() {
            slot.state = SlotState::Cancelled;
        }
        slot.state
    }
}
