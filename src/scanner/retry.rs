//! Retry strategies for screen reads that can transiently fail.

use std::time::Duration;

use super::CancellationToken;

pub trait RetryStrategy {
    fn max_attempts(&self) -> u32;

    /// Delay after the given failed attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Option<Duration>;

    /// Calls `f` up to `max_attempts()` times, sleeping between failures.
    /// The sleep ends early and no further attempts are made once `cancel`
    /// is set. Returns the last error when every attempt failed.
    fn execute<T, E, F>(&self, cancel: &CancellationToken, mut f: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        let max = self.max_attempts().max(1);
        let mut attempt = 0;
        loop {
            match f(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt + 1 >= max {
                        return Err(e);
                    }
                    if let Some(delay) = self.delay_for_attempt(attempt)
                        && cancel.sleep(delay)
                    {
                        return Err(e);
                    }
                    if cancel.is_cancelled() {
                        return Err(e);
                    }
                }
            }
            attempt += 1;
        }
    }
}

/// Waits a constant duration between attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_for_attempt(&self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}
