//! Time sources consumed by the simulation: a monotonic clock and a cancellable sleep.
//!
//! All simulation time is counted in integer *units*; a clock converts units to its own notion of
//! elapsed time. [`SystemClock`] really blocks the calling thread. [`VirtualClock`] only advances
//! a shared counter, which makes runs fast and segment lengths exact for tests and dry runs.

use crate::cancel::CancelToken;
use crate::error::Cancelled;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Monotonic offset since the clock's epoch.
    fn now(&self) -> Duration;

    /// Block the calling actor for `units` of simulated time.
    fn sleep_units(&self, units: u64, cancel: &CancelToken) -> Result<(), Cancelled>;

    /// Wall-clock length of one unit.
    fn unit(&self) -> Duration;

    /// Express a duration as a (fractional) number of units.
    fn to_units(&self, duration: Duration) -> f64 {
        duration.as_secs_f64() / self.unit().as_secs_f64()
    }
}

/// Real time: `Instant` based, sleeping blocks the thread.
#[derive(Debug)]
pub struct SystemClock {
    epoch: Instant,
    unit: Duration,
}

impl SystemClock {
    pub fn new(unit: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            unit,
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep_units(&self, units: u64, cancel: &CancelToken) -> Result<(), Cancelled> {
        if units == 0 {
            return cancel.check();
        }
        cancel.sleep(self.unit.saturating_mul(units.min(u32::MAX as u64) as u32))
    }

    fn unit(&self) -> Duration {
        self.unit
    }
}

/// Fast-forward clock: sleeping adds to a global counter and yields instead of blocking.
///
/// Concurrent sleepers each advance the same counter, so time stays monotonic but is not a
/// faithful model of parallel execution. With a single processor it is fully deterministic.
#[derive(Debug)]
pub struct VirtualClock {
    elapsed_units: AtomicU64,
    unit: Duration,
}

impl VirtualClock {
    pub fn new(unit: Duration) -> Self {
        Self {
            elapsed_units: AtomicU64::new(0),
            unit,
        }
    }

    pub fn elapsed_units(&self) -> u64 {
        self.elapsed_units.load(Ordering::SeqCst)
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        let units = self.elapsed_units.load(Ordering::SeqCst);
        self.unit.saturating_mul(units.min(u32::MAX as u64) as u32)
    }

    fn sleep_units(&self, units: u64, cancel: &CancelToken) -> Result<(), Cancelled> {
        cancel.check()?;
        self.elapsed_units.fetch_add(units, Ordering::SeqCst);
        std::thread::yield_now();
        Ok(())
    }

    fn unit(&self) -> Duration {
        self.unit
    }
}
