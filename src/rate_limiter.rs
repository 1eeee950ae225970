//! Rate limiting for agent runs.
//!
//! Simple sliding window rate limiter. One instance is shared by every chat
//! session in the process; each `acquire` is a single critical section.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::types::{Error, RateLimitConfig, Result};

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// The call was recorded and may proceed.
    Admitted,
    /// The window is full; the call was not recorded.
    Denied {
        /// Time until the oldest tracked admission leaves the window.
        retry_after: std::time::Duration,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// Seconds to wait before retrying (zero when admitted).
    pub fn retry_after_secs(&self) -> f64 {
        match self {
            Admission::Admitted => 0.0,
            Admission::Denied { retry_after } => retry_after.as_secs_f64(),
        }
    }
}

/// Sliding window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        if config.max_requests == 0 {
            return Err(Error::config("rate_limit.max_requests must be positive"));
        }
        let window = Duration::from_std(config.window)
            .map_err(|e| Error::config(format!("rate_limit.window out of range: {e}")))?;
        if window <= Duration::zero() {
            return Err(Error::config("rate_limit.window must be positive"));
        }

        Ok(Self {
            max_requests: config.max_requests as usize,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests as usize)),
        })
    }

    /// Check the window at the current time and record the call if admitted.
    pub fn acquire(&self) -> Admission {
        self.acquire_at(Utc::now())
    }

    /// Check the window at `now` and record the call if admitted.
    ///
    /// An admission exactly `window` old has left the window, so a full window
    /// always yields a strictly positive wait and the cap is never exceeded.
    pub fn acquire_at(&self, now: DateTime<Utc>) -> Admission {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(PoisonError::into_inner);

        let cutoff = now - self.window;
        while let Some(&ts) = timestamps.front() {
            if ts <= cutoff {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            if let Some(&oldest) = timestamps.front() {
                let wait = oldest + self.window - now;
                tracing::debug!(
                    in_window = timestamps.len(),
                    wait_ms = wait.num_milliseconds(),
                    "rate limit window full"
                );
                return Admission::Denied {
                    retry_after: wait.to_std().unwrap_or_default(),
                };
            }
        }

        // Clocks may step backwards; keep the deque sorted.
        let recorded = timestamps.back().map_or(now, |&last| last.max(now));
        timestamps.push_back(recorded);
        Admission::Admitted
    }

    /// Number of admissions currently tracked in the window ending at `now`.
    pub fn in_window_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        self.timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|&&ts| ts > cutoff)
            .count()
    }

    /// Number of admissions in the current window.
    pub fn in_window(&self) -> usize {
        self.in_window_at(Utc::now())
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Forget every tracked admission.
    pub fn reset(&self) {
        self.timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
