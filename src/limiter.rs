//! Bounded-concurrency admission control for transcode jobs.
//!
//! The job limiter is the only mutable shared state in the request pipeline.
//! It bounds the number of in-flight transcode operations and rejects excess
//! demand immediately instead of queuing it; rejection is deliberate
//! backpressure, not an error condition in the limiter itself.
//!
//! All counter mutations go through one mutex. Admission returns an RAII
//! [`JobGuard`] whose `Drop` releases the slot, so a failed or abandoned
//! transcode can never leak a permanently held slot.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Returned by [`JobLimiter::try_admit`] when the configured limit is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("job limit reached")]
pub struct LimitReached;

/// Process-wide counter of in-flight transcode jobs with a configured maximum.
///
/// A maximum of 0 means unbounded: admission always succeeds.
#[derive(Debug)]
pub struct JobLimiter {
    max: usize,
    active: Mutex<usize>,
}

impl JobLimiter {
    /// Create a limiter admitting at most `max` concurrent jobs (0 = unbounded).
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            max,
            active: Mutex::new(0),
        })
    }

    /// The configured maximum (0 = unbounded).
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of currently admitted jobs. Read-only, for telemetry.
    pub fn active(&self) -> usize {
        *self.lock()
    }

    /// Try to admit one job.
    ///
    /// Succeeds and increments the counter atomically when the limiter is
    /// unbounded or the count is strictly below the maximum; otherwise fails
    /// with no side effects. The returned guard releases the slot on drop.
    pub fn try_admit(self: &Arc<Self>) -> Result<JobGuard, LimitReached> {
        let mut active = self.lock();
        if self.max != 0 && *active >= self.max {
            return Err(LimitReached);
        }
        *active += 1;
        drop(active);

        Ok(JobGuard {
            limiter: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut active = self.lock();
        // Guard discipline makes underflow impossible; saturate anyway so a
        // bug can never wedge the limiter below zero.
        *active = active.saturating_sub(1);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        // A panic while holding the lock cannot leave the counter in an
        // inconsistent state (mutations are single assignments), so recover
        // from poisoning instead of propagating it.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An admission slot. Dropping the guard releases the slot exactly once.
#[derive(Debug)]
#[must_use = "dropping the guard releases the admission slot"]
pub struct JobGuard {
    limiter: Arc<JobLimiter>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

// =============================================================================
// Tests
// =============================================================================
