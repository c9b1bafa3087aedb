//! Bounded retry policy shared by every external call that retries.

use std::future::Future;
use std::time::Duration;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// The same delay after every failed attempt.
    Fixed(Duration),
    /// Delay grows linearly with the attempt number (attempt x step).
    Linear(Duration),
}

impl Backoff {
    /// Returns the delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Linear(step) => *step * attempt,
        }
    }
}

/// A bounded retry policy: attempt budget, backoff schedule, and a
/// caller-supplied retryable-error predicate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and backoff.
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Runs `op` until it succeeds, the predicate declares an error
    /// non-retryable, or the attempt budget is exhausted.
    ///
    /// `op` receives the 1-based attempt number. The delay between attempts
    /// is a non-blocking suspension.
    pub async fn run<T, E, Op, Fut, P>(&self, mut op: Op, retryable: P) -> Result<T, E>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && retryable(&err) => {
                    let delay = self.backoff.delay(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
