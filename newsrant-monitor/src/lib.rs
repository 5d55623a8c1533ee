//! The monitor-dedup-generate-publish pipeline.
//!
//! [`monitor::Monitor`] polls an [`ArticleSource`], picks at most one unseen article per
//! cycle, asks a [`Summarize`] implementation for post text and hands it to a
//! [`Publish`] implementation. Which articles were already attempted lives in
//! [`store::SeenStore`].
//!
//! The three traits are the seams between the loop and the outside world; production
//! wiring uses [`newsrant_web::NewsSource`], [`newsrant_llm::summarizer::Summarizer`]
//! and [`newsrant_social::Publisher`], tests use in-memory fakes.
use async_trait::async_trait;
use newsrant_common::{Article, Result};
use newsrant_social::{PostError, PostId};

pub mod monitor;
pub mod store;
pub mod supervise;

pub use monitor::{CycleOutcome, CycleState, Monitor, MonitorOptions, PostFormat};
pub use store::{SeenArticles, SeenRecord, SeenStore};

#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn list_latest(&self) -> Result<Vec<Article>>;
    /// Body text for `url`; empty when it could not be fetched.
    async fn fetch_content(&self, url: &str) -> String;
}

#[async_trait]
pub trait Summarize: Send + Sync {
    async fn generate(&self, title: &str, content: &str) -> Result<String>;
}

#[async_trait]
pub trait Publish: Send + Sync {
    async fn post(&self, text: &str) -> std::result::Result<PostId, PostError>;
}

#[async_trait]
impl ArticleSource for newsrant_web::NewsSource {
    async fn list_latest(&self) -> Result<Vec<Article>> {
        newsrant_web::NewsSource::list_latest(self).await
    }

    async fn fetch_content(&self, url: &str) -> String {
        newsrant_web::NewsSource::fetch_content(self, url).await
    }
}

#[async_trait]
impl Summarize for newsrant_llm::summarizer::Summarizer {
    async fn generate(&self, title: &str, content: &str) -> Result<String> {
        newsrant_llm::summarizer::Summarizer::generate(self, title, content).await
    }
}

#[async_trait]
impl Publish for newsrant_social::Publisher {
    async fn post(&self, text: &str) -> std::result::Result<PostId, PostError> {
        newsrant_social::Publisher::post(self, text).await
    }
}
