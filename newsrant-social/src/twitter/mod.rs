//! X (Twitter) API integration.
//!
//! `client` wraps the create-post endpoint; `types` holds the wire models.
pub mod client;
pub mod types;

pub use client::{OAuth1Credentials, TwitterApi};
