//! Bounded status polling with non-blocking waits.

use std::future::Future;
use std::time::Duration;

/// One probe observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, E> {
    /// A definitive positive signal; polling stops with this value.
    Ready(T),
    /// No definitive signal yet; keep polling.
    Pending,
    /// A definitive negative signal; polling stops with this error.
    Abort(E),
}

/// Result of a bounded polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult<T, E> {
    /// The probe produced a definitive positive signal.
    Ready(T),
    /// The probe produced a definitive negative signal.
    Aborted(E),
    /// The attempt budget ran out without a definitive signal.
    TimedOut { attempts: u32 },
}

/// Probes at a fixed interval until a definitive signal or the attempt
/// budget runs out. The probe receives the 1-based attempt number; waits
/// are non-blocking suspensions.
pub async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    max_attempts: u32,
    mut probe: F,
) -> PollResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PollOutcome<T, E>>,
{
    for attempt in 1..=max_attempts {
        match probe(attempt).await {
            PollOutcome::Ready(value) => return PollResult::Ready(value),
            PollOutcome::Abort(err) => return PollResult::Aborted(err),
            PollOutcome::Pending => {
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
    PollResult::TimedOut {
        attempts: max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn ready_stops_polling() {
        let calls = AtomicU32::new(0);
        let result: PollResult<u32, &str> =
            poll_until(Duration::from_millis(1), 12, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 4 {
                        PollOutcome::Pending
                    } else {
                        PollOutcome::Ready(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, PollResult::Ready(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn abort_stops_polling() {
        let result: PollResult<u32, &str> =
            poll_until(Duration::from_millis(1), 12, |attempt| async move {
                if attempt == 2 {
                    PollOutcome::Abort("payment failed")
                } else {
                    PollOutcome::Pending
                }
            })
            .await;

        assert_eq!(result, PollResult::Aborted("payment failed"));
    }

    #[tokio::test]
    async fn exhaustion_times_out() {
        let calls = AtomicU32::new(0);
        let result: PollResult<u32, &str> = poll_until(Duration::from_millis(1), 5, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { PollOutcome::Pending }
        })
        .await;

        assert_eq!(result, PollResult::TimedOut { attempts: 5 });
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
