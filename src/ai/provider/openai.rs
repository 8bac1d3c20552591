//! OpenAI-Compatible Provider
//!
//! LLM provider using the Chat Completions API. Works with any endpoint that
//! speaks the same protocol via `base_url`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    LlmProvider, LlmResponse, Pricing, ProviderConfig, ResponseMetadata, ResponseTiming,
    TokenUsage,
};
use crate::constants::network as net_constants;
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, NovelError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROVIDER_NAME: &str = "openai";

/// OpenAI-compatible provider with secure API key handling
pub struct OpenAiProvider {
    /// Never exposed in logs or debug output
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    pricing: Pricing,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                NovelError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY or llm.api_key in config"
                        .to_string(),
                )
            })?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| NovelError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            pricing: config.pricing.into(),
            client,
        })
    }

    fn build_request(&self, prompt: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn ask(&self, prompt: &str) -> Result<LlmResponse> {
        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Sending chat completion request"
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let category = if e.is_timeout() || e.is_connect() {
                    ErrorCategory::Network
                } else {
                    ErrorCategory::Unknown
                };
                LlmError::with_provider(
                    category,
                    format!("OpenAI request failed: {}", e),
                    PROVIDER_NAME,
                )
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI API error ({}): {}", status, body),
                PROVIDER_NAME,
            )
            .into());
        }

        let response_body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| NovelError::LlmApi(format!("Failed to parse OpenAI response: {}", e)))?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let content = response_body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NovelError::LlmApi("No content in OpenAI response".to_string()))?;

        Ok(LlmResponse {
            content,
            cost_usd: self.pricing.cost(&usage),
            usage,
            timing: ResponseTiming::from_duration(elapsed),
            metadata: ResponseMetadata {
                model: self.model.clone(),
                provider: PROVIDER_NAME.to_string(),
            },
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .timeout(Duration::from_secs(net_constants::HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("OpenAI API is available");
                Ok(true)
            }
            Ok(resp) => {
                warn!("OpenAI API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OpenAI API check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".to_string()),
            base_url: Some("https://llm.example.com/v1/".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_trims_base_url() {
        let provider = OpenAiProvider::new(config_with_key()).unwrap();
        assert_eq!(provider.base_url, "https://llm.example.com/v1");
        assert_eq!(provider.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = OpenAiProvider::new(config_with_key()).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-test"));
    }

    #[test]
    fn test_build_request_single_user_message() {
        let provider = OpenAiProvider::new(config_with_key()).unwrap();
        let request = provider.build_request("write a chapter");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.max_tokens, Some(1000));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["content"], "write a chapter");
    }

    #[test]
    fn test_parse_completion_response() {
        let body = r###"{
            "choices": [{"message": {"role": "assistant", "content": "## 第1章 开端"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46}
        }"###;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("## 第1章 开端"));
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens + usage.completion_tokens, 46);
    }
}
