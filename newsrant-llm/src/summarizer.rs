//! Persona-driven article summarizer.
//!
//! Wraps any [`LlmClient`] with the fixed satirical persona and the prompt layout used
//! for every post, and cleans the model output so it can be dropped into a post.
use crate::traits::LlmClient;
use newsrant_common::{NewsrantError, Result};
use std::sync::Arc;

/// Style directive sent as the system message on every request.
pub const PERSONA_PROMPT: &str = "You are an X bot. Use the voice of a bombastic prime-time cable news host to write a Post. \
The post is a funny rant. Keep it short, satirical, funny, and sweet! \
One sentence summary of the article. \
Do not include any links, hashtags, or mentions (@someone). 100 character limit.";

const QUOTE_CHARS: [char; 6] = ['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

pub struct Summarizer {
    client: Arc<dyn LlmClient + Send + Sync>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl Summarizer {
    pub fn new(client: Arc<dyn LlmClient + Send + Sync>) -> Self {
        Self {
            client,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    /// Summarize one article in the persona's voice.
    ///
    /// Exactly one inference request per call. Endpoint failures propagate; a reply
    /// that is empty once cleaned is reported as an error too, so callers never post
    /// an empty body.
    pub async fn generate(&self, title: &str, content: &str) -> Result<String> {
        let prompt = build_user_prompt(title, content);
        tracing::debug!(model = %self.client.model_name(), prompt_chars = prompt.chars().count(), "summarizer.request");

        let response = self
            .client
            .generate(
                &prompt,
                Some(PERSONA_PROMPT),
                self.max_tokens,
                self.temperature,
            )
            .await?;

        let cleaned = clean_generated_text(&response.text);
        if cleaned.is_empty() {
            return Err(NewsrantError::Llm("model returned an empty reply".into()));
        }
        tracing::debug!(tokens_used = ?response.tokens_used, reply = %cleaned, "summarizer.reply");
        Ok(cleaned)
    }
}

pub fn build_user_prompt(title: &str, content: &str) -> String {
    format!(
        "Summarize this article and create a tweet about it. Article title: {title}\n\nArticle content: {content}"
    )
}

/// Strip quote characters and surrounding whitespace from a model reply.
pub fn clean_generated_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !QUOTE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LlmResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Canned {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for Canned {
        async fn generate(
            &self,
            prompt: &str,
            system_prompt: Option<&str>,
            _max_tokens: Option<u32>,
            _temperature: Option<f32>,
        ) -> Result<LlmResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((prompt.to_string(), system_prompt.map(str::to_string)));
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    text: text.clone(),
                    model: None,
                    tokens_used: None,
                }),
                Err(msg) => Err(NewsrantError::Llm(msg.clone())),
            }
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn sends_persona_and_article() {
        let llm = Arc::new(Canned::ok("  \"Taxes went up, folks!\"  "));
        let summarizer = Summarizer::new(llm.clone());

        let out = summarizer
            .generate("Taxes rise", "Lawmakers voted to raise taxes.")
            .await
            .unwrap();
        assert_eq!(out, "Taxes went up, folks!");

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (prompt, system) = &seen[0];
        assert!(prompt.contains("Article title: Taxes rise"));
        assert!(prompt.ends_with("Article content: Lawmakers voted to raise taxes."));
        assert_eq!(system.as_deref(), Some(PERSONA_PROMPT));
    }

    #[tokio::test]
    async fn endpoint_failures_propagate() {
        let llm = Arc::new(Canned {
            reply: Err("connection refused".into()),
            seen: Mutex::new(Vec::new()),
        });
        let err = Summarizer::new(llm).generate("t", "c").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn quote_only_reply_is_an_error() {
        let llm = Arc::new(Canned::ok(" \"\" "));
        assert!(Summarizer::new(llm).generate("t", "c").await.is_err());
    }

    #[test]
    fn strips_straight_and_curly_quotes() {
        assert_eq!(
            clean_generated_text("\u{201C}It\u{2019}s a 'disaster'!\u{201D}\n"),
            "Its a disaster!"
        );
    }
}
