//! OpenRouter provider (OpenAI-compatible chat completions)
//!
//! Default provider: one endpoint routes to any configured model id.
//! Structured calls set `response_format: json_object`.

use crate::backend::{strip_code_fence, ModelTier, ReasoningBackend};
use crate::config::ModelConfig;
use crate::error::{ReaderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterBackend {
    client: Client,
    config: ModelConfig,
}

impl OpenRouterBackend {
    pub fn new(config: ModelConfig) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.config.fast_model,
            ModelTier::Smart => &self.config.smart_model,
        }
    }

    async fn call(
        &self,
        user_text: String,
        system_prompt: String,
        tier: ModelTier,
        force_json: bool,
    ) -> Result<String> {
        if self.config.api_key.is_empty() {
            return Err(ReaderError::Config("OPENROUTER_API_KEY not configured".to_string()));
        }

        let request = ChatRequest {
            model: self.model_for(tier).to_string(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt },
                ChatMessage { role: "user".to_string(), content: user_text },
            ],
            temperature: 0.3,
            response_format: force_json.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        debug!(model = %self.model_for(tier), force_json, "Calling OpenRouter API");

        let response = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenRouter request failed: {}", e);
                ReaderError::Transport(format!("OpenRouter error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenRouter error response: {}", error_text);
            return Err(ReaderError::Transport(format!("OpenRouter error: {}", error_text)));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse OpenRouter response: {}", e);
            ReaderError::Schema(format!("OpenRouter parse error: {}", e))
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReaderError::Schema("Empty response from OpenRouter".to_string()))
    }
}

#[async_trait]
impl ReasoningBackend for OpenRouterBackend {
    async fn generate(
        &self,
        goal: &str,
        context: &str,
        system_prompt: &str,
        tier: ModelTier,
    ) -> Result<String> {
        let user_text = format!("{}\n\nMarket context:\n{}", goal, context);
        self.call(user_text, system_prompt.to_string(), tier, false).await
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        schema_hint: &str,
        tier: ModelTier,
    ) -> Result<serde_json::Value> {
        let system = format!(
            "Respond with a single JSON object matching exactly this shape, \
             no prose, no markdown:\n{}",
            schema_hint
        );
        let raw = self.call(prompt.to_string(), system, tier, true).await?;

        serde_json::from_str(strip_code_fence(&raw)).map_err(|e| {
            ReaderError::Schema(format!(
                "OpenRouter structured output invalid: {} | raw={}",
                e, raw
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_request_shape() {
        let request = ChatRequest {
            model: "anthropic/claude-sonnet-4-5".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "classify".to_string(),
            }],
            temperature: 0.3,
            response_format: Some(ResponseFormat { format_type: "json_object".to_string() }),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"type\":\"json_object\""));
    }

    #[test]
    fn test_response_parse() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"atomic\":true}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "{\"atomic\":true}");
    }
}
