//! Time source for timeouts and debouncing.

use std::time::Instant;

/// Monotonic time source used by the renderer.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
