//! The resolution operation under test.
//!
//! The harness treats resolution as a black box behind the [`Resolver`]
//! trait. Two entry points are exercised:
//!
//! - [`Resolver::resolve`]: bring a named resource into a ready state and
//!   return a status code (zero for success, anything else is a failure code
//!   reported verbatim).
//! - [`Resolver::lookup_fs_type`]: look up an already-registered filesystem
//!   type by name, returning an owned handle on success. Each handle is given
//!   back through [`Resolver::release`] exactly once, at teardown.
//!
//! Both calls receive a [`ResolveCx`] that exposes the worker index and the
//! worker's cancellation state. Opaque implementations are free to ignore it;
//! cancellation then takes effect only after the call returns.

mod system;

pub use system::{parse_filesystems, FsType, SystemResolver};

use crate::sync::CancelToken;

/// Status code returned by [`Resolver::resolve`].
pub type Status = i32;

/// Per-call context handed to a [`Resolver`].
#[derive(Debug)]
pub struct ResolveCx<'a> {
    index: usize,
    cancel: &'a CancelToken,
}

impl<'a> ResolveCx<'a> {
    pub(crate) const fn new(index: usize, cancel: &'a CancelToken) -> Self {
        Self { index, cancel }
    }

    /// Index of the worker making the call.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns true once teardown has asked the calling worker to stop.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The opaque resolution operation.
///
/// Implementations are shared by every worker of a run and are called
/// concurrently from many threads.
pub trait Resolver: Send + Sync + 'static {
    /// Owned handle returned by a successful filesystem-type lookup.
    type Handle: Send + 'static;

    /// Resolves `name` and returns the status code.
    fn resolve(&self, cx: &ResolveCx<'_>, name: &str) -> Status;

    /// Looks up the filesystem type `name`; `None` if it is not registered.
    fn lookup_fs_type(&self, cx: &ResolveCx<'_>, name: &str) -> Option<Self::Handle>;

    /// Gives back a handle obtained from [`lookup_fs_type`](Self::lookup_fs_type).
    fn release(&self, handle: Self::Handle) {
        drop(handle);
    }
}
