//! Exponential-backoff policy for job status polling.
//!
//! A poller waits [`PollConfig::initial_interval`] before its first
//! history query and multiplies the interval after every query, up to
//! [`PollConfig::max_interval`]. It gives up after
//! [`PollConfig::max_attempts`] queries or once
//! [`PollConfig::deadline`] has elapsed, whichever comes first.

use std::time::Duration;

/// Tunable parameters for job polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay before the first history query.
    pub initial_interval: Duration,
    /// Upper bound on the delay between queries.
    pub max_interval: Duration,
    /// Factor by which the delay grows after each query.
    pub multiplier: f64,
    /// Maximum number of history queries before the job times out.
    pub max_attempts: u32,
    /// Wall-clock budget for the whole poll, measured from submission.
    pub deadline: Duration,
    /// Consecutive transport failures tolerated before the job fails.
    pub max_consecutive_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 1.5,
            max_attempts: 600,
            deadline: Duration::from_secs(30 * 60),
            max_consecutive_errors: 3,
        }
    }
}

impl PollConfig {
    /// Reject settings that would make pollers spin or never poll.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_interval.is_zero() {
            return Err("initial interval must be greater than zero".into());
        }
        if self.max_interval < self.initial_interval {
            return Err(format!(
                "max interval {:?} is shorter than initial interval {:?}",
                self.max_interval, self.initial_interval
            ));
        }
        if self.max_attempts == 0 {
            return Err("max attempts must be at least 1".into());
        }
        if self.deadline.is_zero() {
            return Err("deadline must be greater than zero".into());
        }
        Ok(())
    }
}

/// Calculate the next poll delay from the current delay and config.
///
/// The result is clamped to [`PollConfig::max_interval`] and never drops
/// below the current delay.
pub fn next_delay(current: Duration, config: &PollConfig) -> Duration {
    let multiplier = config.multiplier.max(1.0);
    let next_ms = (current.as_millis() as f64 * multiplier) as u64;
    Duration::from_millis(next_ms)
        .max(current)
        .min(config.max_interval)
}
