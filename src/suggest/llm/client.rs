use super::models::{ModelSettings, Provider, Usage};
use crate::util::truncate;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A text-completion service: one prompt in, one reply out.
///
/// Implementations make exactly one request per call. Transport and HTTP
/// failures are returned as errors; there is no retry.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Response from LLM including content and usage stats
#[derive(Debug)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Request body shared by both providers; they agree on these field names.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP backend for the hosted providers
pub struct HttpBackend {
    client: reqwest::Client,
    settings: ModelSettings,
    api_key: String,
}

impl HttpBackend {
    pub fn new(settings: ModelSettings, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            api_key,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Send one user message and return the reply with usage stats
    pub async fn send(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![Message::user(prompt)],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let builder = self
            .client
            .post(&self.settings.endpoint)
            .header("Content-Type", "application/json");
        let builder = match self.settings.provider {
            Provider::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::OpenRouter => builder
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("X-Title", "kunth"),
        };

        let response = builder.json(&request).send().await.with_context(|| {
            format!(
                "Request to {} failed",
                self.settings.provider.label()
            )
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error_msg = match status.as_u16() {
                401 | 403 => format!(
                    "{} rejected the API key ({}). Set {} or run 'kunth --setup'.",
                    self.settings.provider.label(),
                    status,
                    self.settings.provider.api_key_env()
                ),
                429 => format!(
                    "Rate limited by {}: {}",
                    self.settings.provider.label(),
                    truncate(&text, 200)
                ),
                500..=599 => format!(
                    "{} server error ({}). The service may be temporarily unavailable.",
                    self.settings.provider.label(),
                    status
                ),
                _ => format!("API error {}: {}", status, truncate(&text, 200)),
            };
            return Err(anyhow::anyhow!("{}", error_msg));
        }

        let parsed = parse_success_body(self.settings.provider, &text)?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total(),
                "completion usage"
            );
        }
        Ok(parsed)
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let response = self.send(prompt).await?;
        Ok(response.content)
    }
}

fn parse_success_body(provider: Provider, text: &str) -> anyhow::Result<LlmResponse> {
    match provider {
        Provider::Anthropic => {
            let parsed: AnthropicResponse = serde_json::from_str(text).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to parse Anthropic response: {}\n{}",
                    e,
                    truncate(text, 200)
                )
            })?;
            let content = parsed
                .content
                .into_iter()
                .find(|block| block.block_type == "text")
                .map(|block| block.text)
                .unwrap_or_default();
            Ok(LlmResponse {
                content,
                usage: parsed.usage,
            })
        }
        Provider::OpenRouter => {
            let parsed: ChatResponse = serde_json::from_str(text).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to parse OpenRouter response: {}\n{}",
                    e,
                    truncate(text, 200)
                )
            })?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            Ok(LlmResponse {
                content,
                usage: parsed.usage,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            model: "claude-3-5-sonnet-20240620",
            messages: vec![Message::user("hello")],
            max_tokens: 4000,
            temperature: 0.2,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-3-5-sonnet-20240620");
        assert_eq!(value["max_tokens"], 4000);
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_parse_anthropic_body_takes_first_text_block() {
        let body = r#"{
            "content": [{"type": "text", "text": "{\"suggestions\": []}"}],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let parsed = parse_success_body(Provider::Anthropic, body).unwrap();
        assert_eq!(parsed.content, "{\"suggestions\": []}");
        assert_eq!(parsed.usage.unwrap().total(), 15);
    }

    #[test]
    fn test_parse_openrouter_body() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "hi"}}]}"#;
        let parsed = parse_success_body(Provider::OpenRouter, body).unwrap();
        assert_eq!(parsed.content, "hi");
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_parse_garbage_body_is_error() {
        assert!(parse_success_body(Provider::Anthropic, "<html>").is_err());
    }
}
