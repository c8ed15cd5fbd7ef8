//! Gemini provider
//!
//! Uses a long-lived reqwest::Client for connection pooling. Structured
//! calls force `application/json` output and validate at the boundary.

use crate::backend::{strip_code_fence, ModelTier, ReasoningBackend};
use crate::config::ModelConfig;
use crate::error::{ReaderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiBackend {
    client: Client,
    config: ModelConfig,
}

impl GeminiBackend {
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
            return Err(ReaderError::Config("GEMINI_API_KEY not configured".to_string()));
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE,
            self.model_for(tier),
            self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: user_text }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: force_json.then(|| "application/json".to_string()),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part { text: system_prompt }],
            },
        };

        debug!(model = %self.model_for(tier), force_json, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                ReaderError::Transport(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(ReaderError::Transport(format!("Gemini API error: {}", error_text)));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            ReaderError::Schema(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| ReaderError::Schema("Empty response from Gemini".to_string()))?;

        Ok(answer)
    }
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
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
            ReaderError::Schema(format!("Gemini structured output invalid: {} | raw={}", e, raw))
        })
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part { text: "Will BTC settle above strike?".to_string() }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: Some("application/json".to_string()),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part { text: "You are a market analyst".to_string() }],
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Will BTC settle above strike?"));
        assert!(json.contains("application/json"));
    }

    #[test]
    fn test_json_mode_omitted_for_free_text() {
        let config = GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
            response_mime_type: None,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("response_mime_type"));
    }
}
