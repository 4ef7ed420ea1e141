//! Result type definition and extension traits.
//!
//! Restore completion has steps whose failure is tolerated (deleting a
//! working directory, sending a notification). [`BestEffort`] turns such a
//! result into an `Option` after logging, so call sites stay linear instead
//! of nesting `match` blocks around every side effect.

use std::fmt::Display;

use crate::error::Error;

/// The standard Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Log-and-continue handling for side effects that must never fail the
/// surrounding operation.
pub trait BestEffort<T> {
    /// Convert to an `Option`, logging the error at `error` level with the
    /// given action description.
    fn best_effort(self, action: &str) -> Option<T>;

    /// Like [`best_effort`](BestEffort::best_effort) but reports whether the
    /// action succeeded.
    fn succeeded(self, action: &str) -> bool;
}

impl<T, E: Display> BestEffort<T> for std::result::Result<T, E> {
    fn best_effort(self, action: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(action, error = %e, "best-effort action failed");
                None
            }
        }
    }

    fn succeeded(self, action: &str) -> bool {
        self.best_effort(action).is_some()
    }
}

/// Tap-style combinator for observing a failure in passing.
pub trait ResultTap<E> {
    /// Perform a side effect on the Err value without consuming the Result.
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self;
}

impl<T, E> ResultTap<E> for std::result::Result<T, E> {
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}
