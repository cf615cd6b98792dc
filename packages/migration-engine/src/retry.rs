//! Bounded retry with exponential backoff for fallible async operations.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation` up to `max_attempts` times, sleeping
/// `base_delay * 2^(n-1)` after the n-th failure. Returns the last error
/// once attempts are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts.max(1) {
                    return Err(e);
                }
                let delay = base_delay * 2u32.pow(attempt - 1);
                warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = retry_with_backoff(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    anyhow::bail!("transient failure {}", n);
                }
                Ok("ok")
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("always fails") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.unwrap_err().to_string().contains("always fails"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let _: Result<()> = retry_with_backoff(3, Duration::from_secs(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("always fails") }
        })
        .await;

        // Two sleeps: 1s after the first failure, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
