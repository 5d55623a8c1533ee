//! Local LLM integration for newsrant.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, the Ollama
//! implementation used for local inference, and the persona [`summarizer::Summarizer`]
//! that turns an article into post text.
//!
//! # Examples
//! ```no_run
//! use newsrant_llm::{ollama::OllamaClient, summarizer::Summarizer};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> newsrant_common::Result<()> {
//! let client = OllamaClient::new("http://127.0.0.1:11434", "smollm2")?;
//! client.ensure_ready().await?;
//! let summarizer = Summarizer::new(Arc::new(client));
//! let text = summarizer.generate("Headline", "Body text").await?;
//! assert!(!text.is_empty());
//! # Ok(())
//! # }
//! ```
pub mod ollama;
pub mod summarizer;
pub mod traits;
