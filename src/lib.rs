//! Resolve-stress: a concurrency stress harness for a resolution operation.
//!
//! # Overview
//!
//! The harness launches N workers that all resolve the same named resource at
//! once, while an auxiliary waker task keeps signalling a coordinator thread
//! to shake out lost-wakeup and reentrancy bugs in the resolution path. Each
//! worker records its outcome in its own slot and bumps a shared completion
//! counter; the last one fires a one-shot completion signal. The controller
//! waits for that signal, reports every slot, and tears down whatever is
//! still alive.
//!
//! Two modes are supported:
//!
//! - **Resolve by name**: every worker calls [`Resolver::resolve`] and
//!   records the status code.
//! - **Check filesystem type**: even-indexed workers resolve by name,
//!   odd-indexed workers look the filesystem type up and hold the returned
//!   handle until teardown releases it.
//!
//! # Guarantees
//!
//! - **Exactly-once completion signal**: fired by the N-th counted worker,
//!   under the same lock as the increment
//! - **Slot ownership**: worker `i` writes only slot `i`
//! - **Idempotent teardown**: every task handle is cancelled and joined at most
//!   once; every owned handle is released exactly once
//! - **No global state**: each [`Harness`] owns its whole run
//!
//! # Module Structure
//!
//! - [`config`]: Run configuration, mode selection, env overrides
//! - [`error`]: Error types
//! - [`sync`]: Shared progress state and cancellation tokens
//! - [`coordinator`]: Wake-signal target
//! - [`resolve`]: The resolution operation under test
//! - [`spawn`]: Task spawning and task handles
//! - [`table`]: Per-worker result slots
//! - [`harness`]: The run controller
//! - [`waker`]: Waker task strategies
//! - [`report`]: Outcome records and summaries
//!
//! # Example
//!
//! ```no_run
//! use resolve_stress::{Harness, HarnessConfig, Mode, SystemResolver};
//!
//! let config = HarnessConfig::builder(Mode::ResolveByName("dummy".into()))
//!     .workers(16)
//!     .build()?;
//! let mut harness = Harness::initialize(config, SystemResolver::new())?;
//! let summary = harness.start()?;
//! if let Some(report) = summary.report() {
//!     println!("{} failures", report.failures());
//! }
//! harness.stop();
//! # Ok::<(), resolve_stress::HarnessError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod harness;
pub mod report;
pub mod resolve;
pub mod spawn;
pub mod sync;
pub mod table;
pub mod test_utils;
pub mod waker;
mod worker;

pub use config::{HarnessConfig, HarnessConfigBuilder, Mode, ModeKind, WakerStrategy};
pub use coordinator::Coordinator;
pub use error::{ConfigError, HarnessError, Result, SpawnError, TaskKind};
pub use harness::{Harness, HarnessBuilder};
pub use report::{Outcome, OutcomeRecord, RunReport, RunSummary, TeardownReport};
pub use resolve::{FsType, ResolveCx, Resolver, Status, SystemResolver};
pub use spawn::{Spawner, TaskHandle, ThreadSpawner};
pub use sync::{CancelToken, Progress, SharedState};
pub use table::{ResultTable, SlotState, WorkerSlot};
pub use waker::WakerExit;
