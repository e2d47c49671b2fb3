//! Time source abstraction for query deadlines.
//!
//! Timeouts are enforced by periodic checks against a `TimeSource`, so tests
//! can drive the clock explicitly instead of sleeping.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over the wall clock.
pub trait TimeSource: std::fmt::Debug + Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Real time source using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    #[allow(clippy::cast_possible_truncation)] // Milliseconds won't overflow u64 for billions of years
    fn now_ms(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_millis() as u64)
    }
}

/// Shared handle to a time source.
pub type SharedTimeSource = Arc<dyn TimeSource>;

/// Handle to the system clock.
#[must_use]
pub fn system_time() -> SharedTimeSource {
    Arc::new(SystemTimeSource)
}
