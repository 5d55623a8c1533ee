//! Common types and utilities shared across newsrant crates.
//!
//! This crate defines the article model, the observability helpers, and the shared
//! error type used throughout the workspace. It stays dependency-light so every
//! crate can depend on it without pulling in HTTP or parsing stacks.
//!
//! # Overview
//!
//! - [`Article`]: a candidate story scraped from the news homepage
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`NewsrantError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use newsrant_common::{Article, NewsrantError};
//!
//! let a = Article::new("Headline", "https://example.com/a");
//! assert_eq!(a.url, "https://example.com/a");
//!
//! let err = NewsrantError::Config("missing twitter.api_key".into());
//! assert_eq!(err.to_string(), "Configuration error: missing twitter.api_key");
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// A story listed on the monitored homepage.
///
/// Identity is the URL, compared case-sensitively; titles are informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
}

impl Article {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Error types used across the newsrant system.
#[derive(thiserror::Error, Debug)]
pub enum NewsrantError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The news homepage or an article page could not be fetched or parsed.
    #[error("Source error: {0}")]
    Source(String),

    /// The language model endpoint failed or returned something unusable.
    #[error("LLM error: {0}")]
    Llm(String),

    /// The seen-article ledger could not be read or written.
    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenient alias for results that use [`NewsrantError`].
pub type Result<T> = std::result::Result<T, NewsrantError>;
