use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::types::{Result, SwapError};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        let timeout_ms = read_env_u64("SWAP_HTTP_TIMEOUT_MS", default.timeout.as_millis() as u64);
        let max_retries = read_env_u64("SWAP_HTTP_MAX_RETRIES", default.max_retries as u64);
        let base_delay_ms =
            read_env_u64("SWAP_HTTP_BASE_DELAY_MS", default.base_delay.as_millis() as u64);
        let max_delay_ms =
            read_env_u64("SWAP_HTTP_MAX_DELAY_MS", default.max_delay.as_millis() as u64);
        let jitter_ms = read_env_u64("SWAP_HTTP_JITTER_MS", default.jitter_ms);
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_retries: max_retries as usize,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter_ms,
        }
    }

    /// Single attempt under the same per-call timeout.
    pub fn no_retry(&self) -> Self {
        Self {
            max_retries: 0,
            ..self.clone()
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt as u32));
        let capped = std::cmp::min(backoff, self.max_delay);
        let jitter = if self.jitter_ms == 0 {
            Duration::from_millis(0)
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
        };
        capped + jitter
    }
}

fn read_env_u64(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(fallback)
}

/// Runs `action` under a per-call timeout, retrying transient failures with
/// capped exponential backoff. Validation, auth and protocol errors return
/// immediately.
pub async fn retry_with_timeout<T, F, Fut>(
    label: &str,
    config: &RetryConfig,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = config.max_retries.saturating_add(1);
    for attempt in 0..attempts {
        let outcome = timeout(config.timeout, action()).await;
        match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                if !err.is_transient() || attempt + 1 >= attempts {
                    return Err(err);
                }
                warn!(attempt = attempt + 1, error = %err, "request to {label} failed; retrying");
            }
            Err(_) => {
                if attempt + 1 >= attempts {
                    return Err(SwapError::Transient(format!("timeout calling {label}")));
                }
                warn!(attempt = attempt + 1, "request to {label} timed out; retrying");
            }
        }
        sleep(config.backoff(attempt)).await;
    }

    Err(SwapError::Transient(format!("retries exhausted for {label}")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            timeout: Duration::from_millis(50),
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter_ms: 0,
        }
    }

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = retry_with_timeout("test", &fast_config(2), move || {
            let calls = calls_clone.clone();
            async move {
                let current = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if current < 3 {
                    Err(SwapError::Transient("503".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result: Result<()> = retry_with_timeout("test", &fast_config(3), move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SwapError::Validation("bad pair".into()))
            }
        })
        .await;
        assert!(result.unwrap_err().is_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_and_exhausts_retries() {
        let mut config = fast_config(1);
        config.timeout = Duration::from_millis(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = retry_with_timeout("timeout", &config, move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                Ok::<_, SwapError>(())
            }
        })
        .await;
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
