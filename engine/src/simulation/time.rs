//! Simulated time source for deterministic testing.
//!
//! Query deadlines read the clock through [`TimeSource`]; tests drive this
//! clock explicitly instead of sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::storage::time::TimeSource;

/// A simulated time source for deterministic testing.
///
/// Time only moves when told to: by [`advance`](Self::advance),
/// [`set`](Self::set), or by an auto-advance step applied after every read.
/// Atomics make the clock shareable with evaluators running on other tasks.
///
/// # Example
///
/// ```
/// use engine::simulation::SimulatedTimeSource;
/// use engine::storage::time::TimeSource;
///
/// let time = SimulatedTimeSource::new(1000);
/// assert_eq!(time.now_ms(), 1000);
///
/// time.advance(100);
/// assert_eq!(time.now_ms(), 1100);
///
/// time.set_auto_advance(5);
/// assert_eq!(time.now_ms(), 1100);
/// assert_eq!(time.now_ms(), 1105);
/// ```
#[derive(Debug)]
pub struct SimulatedTimeSource {
    current_time_ms: AtomicU64,
    auto_advance_ms: AtomicU64,
}

impl SimulatedTimeSource {
    /// Create a simulated clock reading `initial_time_ms`.
    #[must_use]
    pub const fn new(initial_time_ms: u64) -> Self {
        Self {
            current_time_ms: AtomicU64::new(initial_time_ms),
            auto_advance_ms: AtomicU64::new(0),
        }
    }

    /// Create a clock starting at `1_700_000_000_000` (November 2023).
    #[must_use]
    pub const fn default_start() -> Self {
        Self::new(1_700_000_000_000)
    }

    /// A clock ready to hand to [`QueryOptions::with_time_source`](crate::query::QueryOptions::with_time_source)
    /// while the test keeps its own handle.
    #[must_use]
    pub fn shared(initial_time_ms: u64) -> Arc<Self> {
        Arc::new(Self::new(initial_time_ms))
    }

    /// Advance time by `ms`, saturating at `u64::MAX`.
    pub fn advance(&self, ms: u64) {
        let _ = self
            .current_time_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(ms))
            });
    }

    /// Set the current time. May move backwards.
    pub fn set(&self, time_ms: u64) {
        self.current_time_ms.store(time_ms, Ordering::SeqCst);
    }

    /// Advance by `step_ms` after every [`TimeSource::now_ms`] read (`0` disables).
    pub fn set_auto_advance(&self, step_ms: u64) {
        self.auto_advance_ms.store(step_ms, Ordering::SeqCst);
    }

    /// Current simulated time, without auto-advancing.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now_ms(&self) -> u64 {
        let step = self.auto_advance_ms.load(Ordering::SeqCst);
        if step == 0 {
            return self.current();
        }
        self.current_time_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(step))
            })
            .unwrap_or_else(|current| current)
    }
}

impl Default for SimulatedTimeSource {
    fn default() -> Self {
        Self::default_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_time_initial() {
        let time = SimulatedTimeSource::new(1000);
        assert_eq!(time.now_ms(), 1000);
        assert_eq!(time.current(), 1000);
    }

    #[test]
    fn test_simulated_time_advance() {
        let time = SimulatedTimeSource::new(1000);

        time.advance(100);
        assert_eq!(time.now_ms(), 1100);

        time.advance(u64::MAX);
        assert_eq!(time.now_ms(), u64::MAX);
    }

    #[test]
    fn test_simulated_time_set_backwards() {
        let time = SimulatedTimeSource::new(1000);
        time.set(5000);
        assert_eq!(time.now_ms(), 5000);
        time.set(3000);
        assert_eq!(time.now_ms(), 3000);
    }

    #[test]
    fn test_simulated_time_default() {
        assert_eq!(SimulatedTimeSource::default().now_ms(), 1_700_000_000_000);
    }

    #[test]
    fn test_auto_advance_steps_after_each_read() {
        let time = SimulatedTimeSource::new(0);
        time.set_auto_advance(3);
        assert_eq!(time.now_ms(), 0);
        assert_eq!(time.now_ms(), 3);
        assert_eq!(time.current(), 6);

        time.set_auto_advance(0);
        assert_eq!(time.now_ms(), 6);
        assert_eq!(time.now_ms(), 6);
    }

    #[test]
    fn test_shared_clock_is_visible_through_trait_object() {
        let time = SimulatedTimeSource::shared(10);
        let handle: crate::storage::SharedTimeSource = time.clone();
        time.advance(5);
        assert_eq!(handle.now_ms(), 15);
    }
}
