use std::future::Future;
use std::time::Duration;

use crate::logger;

/// Bounded retry with a fixed backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Runs `operation` until it yields `Ok(Some(_))` or the attempts run out.
    ///
    /// `Ok(None)` counts as "not there yet" and is retried the same way as an error. When the
    /// attempts run out, the final attempt decides: its error, or `Ok(None)` if it answered
    /// "not ready".
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<Option<T>, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match operation(attempt).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {
                    last_error = None;
                    logger!(
                        DEBUG,
                        "[RETRY] `{label}` not ready. Retrying... [{attempt}/{}]",
                        self.attempts
                    );
                }
                Err(error) => {
                    logger!(
                        WARN,
                        "[RETRY] `{label}` failed ({error}). Retrying... [{attempt}/{}]",
                        self.attempts
                    );
                    last_error = Some(error);
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let result: Result<Option<u32>, String> = policy
            .run("profile deck", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err("offline".to_string())
                    } else {
                        Ok(Some(attempt))
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(Some(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let result: Result<Option<u32>, String> = policy
            .run("profile deck", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("offline".to_string()) }
            })
            .await;

        assert_eq!(result, Err("offline".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_not_ready_wins_over_earlier_error() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let result: Result<Option<u32>, String> = policy
            .run("flaky deck", |attempt| async move {
                if attempt == 2 {
                    Err("offline".to_string())
                } else {
                    Ok(None)
                }
            })
            .await;
        assert_eq!(result, Ok(None));

        let result: Result<Option<u32>, String> = policy
            .run("flaky deck", |attempt| async move {
                if attempt == 3 {
                    Err("offline".to_string())
                } else {
                    Ok(None)
                }
            })
            .await;
        assert_eq!(result, Err("offline".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_never_ready() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let result: Result<Option<u32>, String> = policy.run("profile deck", |_| async { Ok(None) }).await;
        assert_eq!(result, Ok(None));
    }
}
