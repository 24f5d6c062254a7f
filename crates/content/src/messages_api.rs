//! Language-model generator over the hosted Messages HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use outreach_core::config::GeneratorConfig;
use outreach_core::GenerationError;

use crate::{ContentGenerator, PromptContext};

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Joins the text blocks of a response; empty output is an error.
fn extract_text(response: MessagesResponse) -> Result<String, GenerationError> {
    let text = response
        .content
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text.to_string())
}

pub struct MessagesApiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model: String,
    default_max_tokens: u32,
    timeout_secs: u64,
}

impl MessagesApiGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        info!(model = %config.model, "Content generator initialized");

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            default_max_tokens: config.email_max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ContentGenerator for MessagesApiGenerator {
    async fn generate(&self, context: &PromptContext) -> Result<String, GenerationError> {
        let start = std::time::Instant::now();
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: context.max_tokens.unwrap_or(self.default_max_tokens),
            messages: [ChatMessage {
                role: "user",
                content: &context.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("decode response: {e}")))?;
        let text = extract_text(body)?;

        debug!(
            purpose = ?context.purpose,
            chars = text.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Content generated"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "Subject: Hi\n\nBody"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "P.S. more"}
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Subject: Hi\n\nBody\nP.S. more");
    }

    #[test]
    fn test_extract_text_empty() {
        let response: MessagesResponse =
            serde_json::from_value(serde_json::json!({"content": [{"type": "text", "text": "  "}]}))
                .unwrap();
        assert_eq!(extract_text(response), Err(GenerationError::EmptyResponse));
    }

    #[test]
    fn test_request_shape() {
        let request = MessagesRequest {
            model: "model-x",
            max_tokens: 1024,
            messages: [ChatMessage {
                role: "user",
                content: "hello",
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "model-x",
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "hello"}]
            })
        );
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = GeneratorConfig {
            api_base: "https://llm.example.com/".to_string(),
            ..Default::default()
        };
        let generator = MessagesApiGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint, "https://llm.example.com/v1/messages");
    }
}
