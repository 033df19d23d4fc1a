use std::{fmt::Display, future::Future, time::Duration};

use log::warn;

/// Fixed-delay retry, applied around every outbound call of the job.
/// The delay does not grow between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `f` until it succeeds or `max_attempts` is reached.  Returns the
    /// error of the last attempt.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempts = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_attempts {
                        return Err(e);
                    }
                    warn!(
                        "{} failed: {} (attempt {}/{}), retrying in {:?}",
                        what, e, attempts, self.max_attempts, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
