//! Bounded retry on top of a [`PostSink`].
//!
//! A rate-limit rejection sleeps until the advertised reset (plus a buffer) and retries
//! the same text once. Repeated rejections are retried up to
//! [`RetryPolicy::max_rate_limit_retries`] times before the post is given up on.
use crate::{PostError, PostId, PostSink};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_rate_limit_retries: u32,
    /// Added to the time until reset so the retry lands after the window rolls over.
    pub reset_buffer: Duration,
    /// Used when the rejection carries no reset time.
    pub fallback_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 3,
            reset_buffer: Duration::from_secs(5),
            fallback_wait: Duration::from_secs(900),
        }
    }
}

/// How long to wait before retrying after a rate-limit rejection.
///
/// The time until reset is rounded up to whole seconds, the resolution of the reset
/// header. A reset already in the past yields just the buffer.
pub fn rate_limit_backoff(
    reset: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &RetryPolicy,
) -> Duration {
    match reset {
        Some(reset) => {
            let until = (reset - now).to_std().unwrap_or(Duration::ZERO);
            let secs = until.as_secs() + u64::from(until.subsec_nanos() > 0);
            Duration::from_secs(secs) + policy.reset_buffer
        }
        None => policy.fallback_wait,
    }
}

#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn PostSink>,
    policy: RetryPolicy,
}

impl Publisher {
    pub fn new(sink: Arc<dyn PostSink>) -> Self {
        Self {
            sink,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Publish `text`, waiting out rate limits. Non rate-limit failures return immediately.
    pub async fn post(&self, text: &str) -> Result<PostId, PostError> {
        let mut attempt: u32 = 0;
        loop {
            match self.sink.create_post(text).await {
                Ok(id) => {
                    tracing::info!(post_id = %id, attempt, "publisher.posted");
                    return Ok(id);
                }
                Err(PostError::RateLimited { reset }) => {
                    if attempt >= self.policy.max_rate_limit_retries {
                        tracing::error!(
                            attempts = attempt + 1,
                            max_retries = self.policy.max_rate_limit_retries,
                            "publisher.rate_limit.exhausted"
                        );
                        return Err(PostError::RateLimited { reset });
                    }
                    attempt += 1;
                    let wait = rate_limit_backoff(reset, Utc::now(), &self.policy);
                    tracing::warn!(
                        reset = ?reset,
                        wait_secs = wait.as_secs(),
                        attempt,
                        "publisher.rate_limited"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    tracing::error!(error = %err, "publisher.failed");
                    return Err(err);
                }
            }
        }
    }
}
