//! # Abstractions for closable tasks and resources
//!
//! There are three levels of resource ownership:
//!
//! * [`Closer`] represents a resource which is closed when its owner goes
//!   out of scope (similar to the regular Rust ownership model). This struct
//!   is intentionally not [`Clone`].
//! * [`SharedCloser`] represents a resource with shared owners, that is
//!   valid while at least one of the owners holds a copy (similar to
//!   [`Arc`]). This struct implements [`Clone`].
//! * [`Closable`] represents a dependent resource or task which is notified
//!   when the resource is no longer available. A [`Closable`] is read-only.
//!
//! A [`Closer`] or [`SharedCloser`] can be closed prematurely, and both can
//! hand out any number of [`Closable`] views. The idea is that an expensive
//! resource like a socket listener is bound to dependent tasks like reader
//! and writer threads: the tasks monitor the shared state and stop once the
//! resource is gone, and vice versa.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// State of a resource or operation governed by a single owner.
///
/// When [`Closer::close`] is called or the owner goes out of scope, the
/// resource becomes closed. Read-only access to the "closed" state is
/// provided by [`Closable`] views obtained through [`Closer::to_closable`].
#[derive(Debug)]
#[must_use]
pub struct Closer(Arc<AtomicBool>);

/// State of a resource or operation with shared ownership.
///
/// The resource is closed when [`SharedCloser::close`] is called or when all
/// non-discarded owners went out of scope.
#[derive(Debug)]
#[must_use]
pub struct SharedCloser {
    flag: Arc<AtomicBool>,
    owners: Arc<AtomicUsize>,
}

/// Read-only view of a [`Closer`] or [`SharedCloser`] state.
#[derive(Clone, Debug)]
pub struct Closable(Arc<AtomicBool>);

impl Closer {
    /// Creates a new open state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Returns `true` if the resource is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Closes the resource.
    pub fn close(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns a read-only [`Closable`] view of this state.
    pub fn to_closable(&self) -> Closable {
        Closable(self.0.clone())
    }
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Closer {
    fn drop(&mut self) {
        self.close();
    }
}

impl SharedCloser {
    /// Creates a new open shared state with a single owner.
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            owners: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Returns `true` if the resource is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Closes the resource for all owners.
    pub fn close(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns a read-only [`Closable`] view of this state.
    pub fn to_closable(&self) -> Closable {
        Closable(self.flag.clone())
    }
}

impl Default for SharedCloser {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SharedCloser {
    fn clone(&self) -> Self {
        self.owners.fetch_add(1, Ordering::AcqRel);
        Self {
            flag: self.flag.clone(),
            owners: self.owners.clone(),
        }
    }
}

impl Drop for SharedCloser {
    fn drop(&mut self) {
        if self.owners.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.close();
        }
    }
}

impl Closable {
    /// Returns `true` if the underlying resource is closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
