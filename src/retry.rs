// src/retry.rs
use std::future::Future;
use std::time::Duration;

use anyhow::Result;

/// Bounded retry with a fixed delay between attempts.
/// Shared by the page fetcher and the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no waiting. Handy in tests.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `op` until it succeeds, the attempts are exhausted, or `retryable`
    /// rejects the error. `op` receives the 1-based attempt number.
    /// `max_attempts == 0` still makes one attempt.
    pub async fn run<T, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&anyhow::Error) -> bool,
    {
        let max = self.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= max || !retryable(&e) {
                        tracing::debug!(op = label, attempt, "giving up: {e:#}");
                        return Err(e);
                    }
                    tracing::warn!(
                        op = label,
                        attempt,
                        max_attempts = max,
                        "attempt failed, retrying in {:?}: {e:#}",
                        self.delay
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
    }
}

/// Client errors (4xx other than 408/429) will not improve on retry;
/// anything else (timeouts, connect errors, 5xx, API-level refusals) might.
pub fn is_transient(err: &anyhow::Error) -> bool {
    let status = err
        .chain()
        .find_map(|e| e.downcast_ref::<reqwest::Error>())
        .and_then(|e| e.status());
    match status {
        Some(s) if s.is_client_error() => s.as_u16() == 408 || s.as_u16() == 429,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let res: Result<()> = policy
            .run(
                "test",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(anyhow!("boom")) }
                },
                |_| true,
            )
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_first_success() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let res = policy
            .run(
                "test",
                |attempt| async move {
                    if attempt < 2 {
                        Err(anyhow!("flaky"))
                    } else {
                        Ok(attempt)
                    }
                },
                |_| true,
            )
            .await
            .unwrap();
        assert_eq!(res, 2);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let res: Result<()> = policy
            .run(
                "test",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(anyhow!("fatal")) }
                },
                |_| false,
            )
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let _: Result<()> = policy
            .run(
                "test",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(anyhow!("boom")) }
                },
                |_| true,
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plain_errors_count_as_transient() {
        assert!(is_transient(&anyhow!("telegram said ok=false")));
    }
}
