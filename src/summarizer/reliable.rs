use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use super::{Summarizer, SummarizerError, SummaryRequest};
use crate::config::RetryPolicy;

/// Wraps a [`Summarizer`] with a per-attempt timeout and retries.
///
/// - Every attempt is bounded by `request_timeout`; expiry is a `Timeout` error
/// - `Timeout` and `Unavailable` are retried with exponential backoff + jitter
/// - `Auth` and `Rejected` fail immediately
pub struct ReliableSummarizer<S> {
    inner: S,
    policy: RetryPolicy,
    total_retries: AtomicU64,
}

impl<S: Summarizer> ReliableSummarizer<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: S) -> Self {
        Self::new(inner, RetryPolicy::default())
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    /// Exponential backoff: `base * 2^attempt`, capped, with jitter.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self.policy.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt as i32);
        let capped = exp_delay.min(self.policy.max_delay.as_millis() as f64);

        let jitter_range = capped * self.policy.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    async fn attempt(&self, request: &SummaryRequest) -> Result<String, SummarizerError> {
        let timeout = self.policy.request_timeout;
        match tokio::time::timeout(timeout, self.inner.summarize(request)).await {
            Ok(result) => result,
            Err(_) => Err(SummarizerError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl<S: Summarizer> Summarizer for ReliableSummarizer<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<String, SummarizerError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) if !e.is_retryable() || attempt >= self.policy.max_retries => {
                    return Err(e)
                }
                Err(e) => {
                    let delay = self.retry_delay(attempt);
                    self.total_retries.fetch_add(1, Ordering::Relaxed);
                    attempt += 1;

                    warn!(
                        summarizer = self.inner.name(),
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying summarization after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::mock::{MockReply, MockSummarizer};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
            request_timeout: Duration::from_millis(100),
        }
    }

    fn request() -> SummaryRequest {
        SummaryRequest {
            previous_snapshot: String::new(),
            new_entries: "entry".into(),
            instruction: "compress".into(),
        }
    }

    #[tokio::test]
    async fn success_on_first_try() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![MockReply::text("ok")]),
            fast_policy(3),
        );

        assert_eq!(reliable.summarize(&request()).await.unwrap(), "ok");
        assert_eq!(reliable.total_retries(), 0);
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![
                MockReply::Error(SummarizerError::Unavailable("503".into())),
                MockReply::Error(SummarizerError::Unavailable("529".into())),
                MockReply::text("recovered"),
            ]),
            fast_policy(3),
        );

        assert_eq!(reliable.summarize(&request()).await.unwrap(), "recovered");
        assert_eq!(reliable.total_retries(), 2);
        assert_eq!(reliable.inner().call_count(), 3);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![
                MockReply::Error(SummarizerError::Auth("bad key".into())),
                MockReply::text("unreachable"),
            ]),
            fast_policy(3),
        );

        let err = reliable.summarize(&request()).await.unwrap_err();
        assert!(matches!(err, SummarizerError::Auth(_)));
        assert_eq!(reliable.inner().call_count(), 1);
    }

    #[tokio::test]
    async fn slow_attempts_time_out_and_exhaust_retries() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![
                MockReply::delayed(Duration::from_secs(5), MockReply::text("late")),
                MockReply::delayed(Duration::from_secs(5), MockReply::text("late")),
            ]),
            RetryPolicy {
                request_timeout: Duration::from_millis(20),
                ..fast_policy(1)
            },
        );

        let err = reliable.summarize(&request()).await.unwrap_err();
        assert_eq!(err, SummarizerError::Timeout(Duration::from_millis(20)));
        assert_eq!(reliable.total_retries(), 1);
    }

    #[test]
    fn retry_delay_exponential_backoff() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![]),
            RetryPolicy {
                base_delay: Duration::from_millis(100),
                max_delay: Duration::from_secs(30),
                ..fast_policy(3)
            },
        );

        assert_eq!(reliable.retry_delay(0).as_millis(), 100);
        assert_eq!(reliable.retry_delay(1).as_millis(), 200);
        assert_eq!(reliable.retry_delay(2).as_millis(), 400);
    }

    #[test]
    fn retry_delay_capped_at_max() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![]),
            RetryPolicy {
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(5),
                ..fast_policy(3)
            },
        );

        assert_eq!(reliable.retry_delay(10).as_millis(), 5000);
    }

    #[test]
    fn retry_delay_jitter_stays_in_range() {
        let reliable = ReliableSummarizer::new(
            MockSummarizer::scripted(vec![]),
            RetryPolicy {
                base_delay: Duration::from_millis(1000),
                max_delay: Duration::from_secs(30),
                jitter_factor: 0.2,
                ..fast_policy(3)
            },
        );

        for _ in 0..50 {
            let ms = reliable.retry_delay(0).as_millis();
            assert!((800..=1200).contains(&ms), "delay {} out of range", ms);
        }
    }
}
