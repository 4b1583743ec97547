//! Monotonic per-operation timing.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Running measurement started from a monotonic clock.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since `start`, divided by `units`, in microseconds.
    pub fn per_op(&self, units: usize) -> Result<f64> {
        per_op_micros(self.start.elapsed(), units)
    }
}

/// `elapsed / units` in microseconds. `units` must be the true number of logical
/// operations executed inside the measured region.
pub fn per_op_micros(elapsed: Duration, units: usize) -> Result<f64> {
    if units == 0 {
        return Err(Error::invalid("timer unit count must be positive"));
    }
    Ok(elapsed.as_secs_f64() * 1e6 / units as f64)
}

/// Runs `f` between two clock reads and returns its output with the per-op time.
///
/// The unit count is checked before `f` runs so a bad call site never pays for
/// the work it cannot report.
pub fn measure<T>(units: usize, f: impl FnOnce() -> Result<T>) -> Result<(T, f64)> {
    if units == 0 {
        return Err(Error::invalid("timer unit count must be positive"));
    }
    let watch = Stopwatch::start();
    let out = f()?;
    let micros = watch.per_op(units)?;
    Ok((out, micros))
}
