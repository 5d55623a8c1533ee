use crate::extract::{extract_article_text, parse_article_list};
use newsrant_common::{Article, NewsrantError, Result};
use newsrant_http::{HttpClient, HttpError, RequestOpts};
use std::time::Duration;

/// Fetches the monitored homepage and individual article pages.
///
/// Both requests go through the same client, so they share the `User-Agent` header.
#[derive(Clone)]
pub struct NewsSource {
    http: HttpClient,
    max_articles: usize,
    max_content_chars: usize,
}

impl NewsSource {
    pub fn new(homepage: &str, user_agent: &str) -> std::result::Result<Self, HttpError> {
        let http = HttpClient::new(homepage)?.with_user_agent(user_agent)?;
        Ok(Self {
            http,
            max_articles: 10,
            max_content_chars: 2000,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    pub fn with_limits(mut self, max_articles: usize, max_content_chars: usize) -> Self {
        self.max_articles = max_articles;
        self.max_content_chars = max_content_chars;
        self
    }

    pub fn homepage(&self) -> &str {
        self.http.base().as_str()
    }

    /// Current homepage articles, most prominent first.
    pub async fn list_latest(&self) -> Result<Vec<Article>> {
        let html = self
            .http
            .get_text("", RequestOpts::default())
            .await
            .map_err(|e| NewsrantError::Source(format!("homepage fetch failed: {e}")))?;

        let articles = parse_article_list(&html, self.http.base(), self.max_articles);
        tracing::info!(
            homepage = %self.http.base(),
            count = articles.len(),
            "source.list_latest"
        );
        Ok(articles)
    }

    /// Article body text, or an empty string when the page cannot be fetched.
    pub async fn fetch_content(&self, url: &str) -> String {
        let opts = RequestOpts {
            allow_absolute: true,
            ..Default::default()
        };
        match self.http.get_text(url, opts).await {
            Ok(html) => {
                let text = extract_article_text(&html, self.max_content_chars);
                tracing::debug!(url, chars = text.chars().count(), "source.fetch_content");
                text
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "source.fetch_content.failed");
                String::new()
            }
        }
    }
}
