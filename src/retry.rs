//! Tek yeniden deneme soyutlaması.
//!
//! Her betik sürümünün kendi kopyala-yapıştır döngüsünü taşımaması için
//! deneme sayısı ve sabit bekleme yapılandırmadan gelir.

use std::future::Future;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::ScraperError;

/// `op` işlemini politikaya göre yeniden dener. Yalnızca geçici hatalar
/// denenir; yapısal hatalar ilk seferde döner.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    "{}: deneme {}/{} başarısız, {:?} sonra tekrar: {}",
                    what, attempt, policy.max_attempts, policy.backoff, e
                );
                sleep(policy.backoff).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    // max_attempts >= 1 olduğu sürece buraya yalnızca last_error doluyken gelinir
    Err(last_error
        .unwrap_or_else(|| ScraperError::Timeout(format!("{}: deneme hakkı tükendi", what))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick_policy(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ScraperError::Timeout("geçici".into()))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_structural_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&quick_policy(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScraperError::AnchorNotFound("sayfa".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&quick_policy(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ScraperError::Timeout("geçici".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
