//! One-shot readiness signal with a deferred action queue.
//!
//! Work that needs the engine to be laid out is queued against the signal and
//! handed back to the owner exactly once, when the signal fires. Actions queued
//! after that point are handed back immediately. Nothing blocks and nothing is
//! cancellable.

use std::fmt;

/// An action run against the owner once the signal has fired.
pub type Deferred<T> = Box<dyn FnOnce(&mut T) + Send>;

/// One-shot completion signal.
pub struct Readiness<T> {
    fired: bool,
    queue: Vec<Deferred<T>>,
}

impl<T> Default for Readiness<T> {
    fn default() -> Self {
        Self {
            fired: false,
            queue: Vec::new(),
        }
    }
}

impl<T> fmt::Debug for Readiness<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Readiness")
            .field("fired", &self.fired)
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl<T> Readiness<T> {
    /// Create an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired
    }

    /// Number of queued actions.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue an action. If the signal already fired, the action is returned
    /// for the caller to run now.
    #[must_use]
    pub fn defer(&mut self, action: Deferred<T>) -> Option<Deferred<T>> {
        if self.fired {
            return Some(action);
        }
        self.queue.push(action);
        None
    }

    /// Fire the signal and take the queued actions in queue order.
    /// Later calls return nothing.
    #[must_use]
    pub fn fire(&mut self) -> Vec<Deferred<T>> {
        if self.fired {
            return Vec::new();
        }
        self.fired = true;
        std::mem::take(&mut self.queue)
    }
}
