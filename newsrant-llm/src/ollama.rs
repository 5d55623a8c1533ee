use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use newsrant_common::{NewsrantError, Result};
use newsrant_http::{HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";
const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    options: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: Option<ChatReply>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
/// Construction does not touch the network; call [`OllamaClient::ensure_ready`]
/// to check the server and pull the model when it is missing.
pub struct OllamaClient {
    http: HttpClient,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let http = HttpClient::new(&base)
            .map_err(|e| NewsrantError::Llm(format!("HttpClient init failed: {e}")))?
            .with_timeout(Duration::from_secs(120))
            .with_retries(0);
        Ok(Self {
            http,
            model: model.into(),
        })
    }

    /// Override the per-request inference timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    /// Verify the server is reachable and the model is present, pulling it if not.
    pub async fn ensure_ready(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;
        if !models.iter().any(|m| model_matches(m, &self.model)) {
            tracing::info!(model = %self.model, "ollama.model.pulling");
            self.pull_model().await?;
        }
        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .http
            .get_json("api/tags", RequestOpts::default())
            .await
            .map_err(|e| match e {
                HttpError::Network(_) => NewsrantError::Llm(OLLAMA_CONNECTION_ERROR.to_string()),
                other => NewsrantError::Llm(format!("Failed to fetch models: {other}")),
            })?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self) -> Result<()> {
        let payload = json!({
            "model": self.model,
            "stream": false
        });
        let _: JsonValue = self
            .http
            .post_json_opts(
                "api/pull",
                &payload,
                RequestOpts {
                    timeout: Some(PULL_TIMEOUT),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| NewsrantError::Llm(format!("Failed to pull model: {e}")))?;
        tracing::info!(model = %self.model, "ollama.model.pulled");
        Ok(())
    }
}

/// `smollm2` matches the `smollm2:latest` tag Ollama reports.
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{wanted}:latest"))
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut options = serde_json::Map::new();
        if let Some(temp) = temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: sys,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options,
        };

        let resp: ChatResponse = self
            .http
            .post_json_opts("api/chat", &request, RequestOpts::default())
            .await
            .map_err(|e| NewsrantError::Llm(format!("Chat request failed: {e}")))?;

        let text = resp
            .message
            .map(|m| m.content)
            .ok_or_else(|| NewsrantError::Llm("Chat response carried no message".into()))?;

        Ok(LlmResponse {
            text,
            model: resp.model.or_else(|| Some(self.model.clone())),
            tokens_used: resp.eval_count.map(|c| c as u32),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fetch_available_models().await.is_ok())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_model_matches_latest() {
        assert!(model_matches("smollm2:latest", "smollm2"));
        assert!(model_matches("smollm2:1.7b", "smollm2:1.7b"));
        assert!(!model_matches("smollm2:1.7b", "smollm2"));
        assert!(!model_matches("llama3:latest", "smollm2"));
    }

    #[test]
    fn chat_request_shape() {
        let req = ChatRequest {
            model: "smollm2",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "be brief",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            stream: false,
            options: serde_json::Map::new(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "model": "smollm2",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": false
            })
        );
    }
}
