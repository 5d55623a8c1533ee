//! Social network publishing for newsrant.
//!
//! - [`twitter`]: X API v2 create-post client
//! - [`PostSink`]: the seam every destination implements (X, or the dry-run logger)
//! - [`publisher::Publisher`]: rate-limit aware retry policy on top of a sink
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

pub mod publisher;
pub mod twitter;

pub use publisher::{Publisher, RetryPolicy};

/// Identifier the platform assigned to a published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostId(pub String);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// The platform rejected the post because the quota is exhausted.
    #[error("rate limited (reset at {reset:?})")]
    RateLimited { reset: Option<DateTime<Utc>> },

    /// Anything else: network, auth, malformed payload, server errors.
    #[error("post failed: {0}")]
    Other(String),
}

/// A destination that accepts post text.
#[async_trait]
pub trait PostSink: Send + Sync {
    async fn create_post(&self, text: &str) -> Result<PostId, PostError>;
}

/// Sink that only logs what would have been posted.
#[derive(Debug, Default, Clone)]
pub struct DryRunSink;

#[async_trait]
impl PostSink for DryRunSink {
    async fn create_post(&self, text: &str) -> Result<PostId, PostError> {
        let id = PostId(format!("dry-run-{}", uuid::Uuid::new_v4()));
        tracing::info!(post_id = %id, chars = text.chars().count(), text = %text, "dry_run.post");
        Ok(id)
    }
}
