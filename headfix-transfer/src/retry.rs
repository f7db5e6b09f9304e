use std::time::Duration;

use headfix_timing::Timer;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bounded retries for link-level faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Runs `op` until it succeeds, fails with an error `retryable` rejects,
    /// or the attempts are used up. `op` receives the 1-based attempt number.
    pub fn run<T, E, Tm, F, R>(&self, timer: &Tm, retryable: R, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        Tm: Timer,
        F: FnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max && retryable(&e) => {
                    warn!(attempt, max_attempts = max, error = %e, "retrying");
                    timer.sleep(Duration::from_millis(self.backoff_ms));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
