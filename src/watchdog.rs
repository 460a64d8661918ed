//! This module contains the type definitions necessary to support stopping a
//! verification part-way through.
//!
//! # Cooperative Stopping
//!
//! The watchdog is polled between units of work: between metadata documents
//! when checking files, and between candidate addresses when matching. Work
//! that is already in flight, such as a running compilation, is bounded by the
//! timeouts in [`crate::verifier::Config`] instead.

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// A dynamically dispatched [`Watchdog`] instance.
pub type DynWatchdog = Arc<dyn Watchdog>;

/// The interface to an object that can be polled to see if the verifier needs
/// to abort processing.
///
/// The interface is simple, but it can encapsulate arbitrary logic as far as
/// the verifier is concerned, allowing the client to implement complex stop
/// logic.
pub trait Watchdog
where
    Self: Debug + Send + Sync,
{
    /// Checks if the verifier should halt and return an error.
    #[must_use]
    fn should_stop(&self) -> bool;
}

/// An implementation of the [`Watchdog`] trait that never stops the verifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LazyWatchdog;

impl LazyWatchdog {
    /// Wraps `self` into an [`Arc`].
    #[must_use]
    pub fn in_arc(self) -> DynWatchdog {
        Arc::new(self)
    }
}

impl Watchdog for LazyWatchdog {
    fn should_stop(&self) -> bool {
        false
    }
}

/// A watchdog that tells the verifier when to stop based on a flag in the form
/// of an atomic boolean.
#[derive(Clone, Debug)]
pub struct FlagWatchdog {
    /// The flag that should be set externally to stop the verifier.
    flag: Arc<AtomicBool>,
}

impl FlagWatchdog {
    /// Constructs a new `FlagWatchdog` wrapping the provided `flag`.
    #[must_use]
    pub fn new(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Wraps the watchdog into an [`Arc`].
    #[must_use]
    pub fn in_arc(self) -> DynWatchdog {
        Arc::new(self)
    }
}

impl Watchdog for FlagWatchdog {
    fn should_stop(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
