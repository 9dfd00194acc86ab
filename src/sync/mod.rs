//! Synchronization primitives shared across harness tasks.
//!
//! - [`SharedState`]: progress counter, its lock, and the one-shot
//!   completion signal
//! - [`CancelToken`]: cooperative stop request checked at task safe points

mod cancel;
mod shared_state;

pub use cancel::CancelToken;
pub use shared_state::{Progress, SharedState};
