//! Randomised pacing between sequential product lookups.
//!
//! The engine never polls on a fixed period: each "next item" wake-up is
//! scheduled after a delay drawn uniformly from `[min, max]` so the request
//! cadence looks like a person clicking through product pages rather than a
//! timer.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use pricewatch_core::pacing::IntervalConfig;
//!
//! let pacing = IntervalConfig::new(Duration::from_secs(10), Duration::from_secs(15));
//! let delay = pacing.next_delay();
//! assert!(delay >= Duration::from_secs(10) && delay <= Duration::from_secs(15));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Jitter bounds for the delay before the next item, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Lower bound (inclusive).
    pub min: u64,
    /// Upper bound (inclusive).
    pub max: u64,
}

impl IntervalConfig {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min: min.as_millis() as u64,
            max: max.as_millis() as u64,
        }
    }

    /// A fixed delay with no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.min > self.max {
            return Err(AppError::ConfigError(format!(
                "interval.min ({}) must not exceed interval.max ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Draw the next delay uniformly from `[min, max]`.
    pub fn next_delay(&self) -> Duration {
        Duration::from_millis(self.next_delay_ms())
    }

    pub fn next_delay_ms(&self) -> u64 {
        if self.max <= self.min {
            return self.min;
        }
        fastrand::u64(self.min..=self.max)
    }
}

impl Default for IntervalConfig {
    /// 10–15 seconds between products.
    fn default() -> Self {
        Self {
            min: 10_000,
            max: 15_000,
        }
    }
}
