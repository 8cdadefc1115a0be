//! Retry transport: bounded exponential backoff and uniform error shaping
//! for every outbound platform call.
//!
//! Connectors and the credential manager never call `reqwest` response
//! handling directly; they send through [`retry_with_backoff`] and shape
//! responses with [`check_response`] / [`read_json`] so 401/429/5xx handling
//! is identical everywhere.

use std::future::Future;
use std::time::Duration;

use repwatch_core::Platform;

use crate::error::IngestError;

/// Retry budget applied to one logical outbound operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first try.
    pub max_retries: u32,
    /// Base delay; attempt `n` sleeps `backoff_base_ms * 2^n` (capped, jittered).
    pub backoff_base_ms: u64,
    /// Non-idempotent operations are single-shot unless the caller opts in.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            retry_non_idempotent: false,
        }
    }
}

/// Returns `true` for errors worth retrying after a backoff delay.
///
/// Retriable: network-level failures (timeout, connection reset) and 5xx
/// responses. Everything else (auth rejections, rate limits, 4xx,
/// malformed bodies) is returned immediately; retrying would not help,
/// and rate limits must reach the orchestrator for batch-level scheduling.
fn is_retriable(err: &IngestError) -> bool {
    match err {
        IngestError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        IngestError::UnexpectedStatus { status, .. } => *status >= 500,
        IngestError::Auth { .. }
        | IngestError::NoGrant(_)
        | IngestError::RateLimited { .. }
        | IngestError::Api { .. }
        | IngestError::Deserialize { .. }
        | IngestError::Classifier(_)
        | IngestError::Normalization(_) => false,
    }
}

/// Runs `operation` with up to `policy.max_retries` additional attempts on
/// transient errors.
///
/// `idempotent` marks whether the operation can safely run twice; when
/// `false` and the policy has not opted in, the operation is attempted
/// exactly once and any error is returned as-is.
///
/// Backoff schedule with `backoff_base_ms = 500`:
///
/// | Attempt | Sleep before next attempt |
/// |---------|---------------------------|
/// | 1       | 500 ms × 2⁰ ± 25 % jitter |
/// | 2       | 500 ms × 2¹ ± 25 % jitter |
/// | 3       | 500 ms × 2² ± 25 % jitter |
///
/// Delay is capped at 60 s.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    idempotent: bool,
    mut operation: F,
) -> Result<T, IngestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IngestError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;

    let budget = if idempotent || policy.retry_non_idempotent {
        policy.max_retries
    } else {
        0
    };

    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= budget {
                    return Err(err);
                }
                let computed = policy
                    .backoff_base_ms
                    .saturating_mul(1u64 << attempt.min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    budget,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// Shapes a response into the uniform error taxonomy.
///
/// - 401 → [`IngestError::Auth`] (credential manager handles re-acquire)
/// - 429 → [`IngestError::RateLimited`] with `Retry-After` when present
/// - other non-2xx → [`IngestError::UnexpectedStatus`]
pub fn check_response(
    platform: Platform,
    context: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, IngestError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(IngestError::Auth { platform });
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(IngestError::RateLimited {
            platform,
            retry_after_secs,
        });
    }
    Err(IngestError::UnexpectedStatus {
        context: context.to_string(),
        status: status.as_u16(),
    })
}

/// Reads a response body and parses it as JSON, shaping parse failures
/// into [`IngestError::Deserialize`].
pub async fn read_json<T: serde::de::DeserializeOwned>(
    context: &str,
    response: reqwest::Response,
) -> Result<T, IngestError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| IngestError::Deserialize {
        context: context.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 0,
            retry_non_idempotent: false,
        }
    }

    fn server_error() -> IngestError {
        IngestError::UnexpectedStatus {
            context: "test".to_owned(),
            status: 503,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&policy(), true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, IngestError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&policy(), true, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(server_error())
                } else {
                    Ok::<u32, IngestError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(
            &RetryPolicy {
                max_retries: 2,
                backoff_base_ms: 0,
                retry_non_idempotent: false,
            },
            true,
            || {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(server_error())
                }
            },
        )
        .await;
        // max_retries=2 → 3 total attempts.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(IngestError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_rate_limited() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&policy(), true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(IngestError::RateLimited {
                    platform: Platform::Forum,
                    retry_after_secs: 30,
                })
            }
        })
        .await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "rate limits must reach the orchestrator, not be retried"
        );
        assert!(matches!(result, Err(IngestError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_auth_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&policy(), true, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(IngestError::Auth {
                    platform: Platform::Microblog,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(IngestError::Auth { .. })));
    }

    #[tokio::test]
    async fn non_idempotent_operations_are_single_shot() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(&policy(), false, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(server_error())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn non_idempotent_retries_when_policy_opts_in() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let opted_in = RetryPolicy {
            max_retries: 1,
            backoff_base_ms: 0,
            retry_non_idempotent: true,
        };
        let result = retry_with_backoff(&opted_in, false, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(server_error())
                } else {
                    Ok::<u32, IngestError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
