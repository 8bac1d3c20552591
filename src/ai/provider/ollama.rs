//! Ollama Local LLM Provider
//!
//! LLM provider for locally-running Ollama models.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    LlmProvider, LlmResponse, Pricing, ProviderConfig, ResponseMetadata, ResponseTiming,
    TokenUsage,
};
use crate::constants::network as net_constants;
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, NovelError, Result};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5:latest";
const PROVIDER_NAME: &str = "ollama";

/// Ollama Local LLM Provider
pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    pricing: Pricing,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Self::validate_endpoint(&base_url)?;

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NovelError::LlmApi(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            pricing: config.pricing.into(),
            client,
        })
    }

    /// Only http/https is accepted; non-local hosts are allowed with a warning
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            NovelError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(NovelError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
        {
            warn!(host, "Ollama endpoint is not localhost");
        }

        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    fn build_request(&self, prompt: &str) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn ask(&self, prompt: &str) -> Result<LlmResponse> {
        debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Sending generate request to Ollama"
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt);
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::with_provider(
                        ErrorCategory::Unavailable,
                        format!(
                            "Failed to connect to Ollama at {}. Is Ollama running? Start with: ollama serve",
                            self.base_url
                        ),
                        PROVIDER_NAME,
                    )
                } else if e.is_timeout() {
                    LlmError::with_provider(
                        ErrorCategory::Network,
                        format!("Ollama request timed out: {}", e),
                        PROVIDER_NAME,
                    )
                } else {
                    LlmError::with_provider(
                        ErrorCategory::Unknown,
                        format!("Ollama request failed: {}", e),
                        PROVIDER_NAME,
                    )
                }
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Ollama API error ({}): {}", status, body),
                PROVIDER_NAME,
            )
            .into());
        }

        let response_body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| NovelError::LlmApi(format!("Failed to parse Ollama response: {}", e)))?;

        let usage = TokenUsage::new(
            response_body.prompt_eval_count.unwrap_or(0),
            response_body.eval_count.unwrap_or(0),
        );

        Ok(LlmResponse {
            content: response_body.response,
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
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(net_constants::HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let Ok(tags) = resp.json::<OllamaTagsResponse>().await else {
                    info!("Ollama is available");
                    return Ok(true);
                };

                let base_model = self.model.trim_end_matches(":latest");
                if tags
                    .models
                    .iter()
                    .any(|m| m.name == self.model || m.name.starts_with(base_model))
                {
                    info!("Ollama is available with model: {}", self.model);
                    Ok(true)
                } else {
                    warn!(
                        "Ollama is running but model '{}' not found. Pull with: ollama pull {}",
                        self.model, self.model
                    );
                    Ok(false)
                }
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {}. Start with: ollama serve", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProviderConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };

        let provider = OllamaProvider::new(config).expect("Failed to create provider");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_validate_endpoint_rejects_scheme() {
        let err = OllamaProvider::validate_endpoint("ftp://localhost:11434").unwrap_err();
        assert!(matches!(err, NovelError::Config(_)));
    }

    #[test]
    fn test_validate_endpoint_rejects_garbage() {
        assert!(OllamaProvider::validate_endpoint("not a url").is_err());
    }

    #[test]
    fn test_validate_endpoint_strips_trailing_slash() {
        let url = OllamaProvider::validate_endpoint("http://gpu-box:11434/").unwrap();
        assert_eq!(url, "http://gpu-box:11434");
    }

    #[test]
    fn test_build_request_is_not_streaming() {
        let provider = OllamaProvider::new(ProviderConfig::default()).unwrap();
        let json = serde_json::to_value(provider.build_request("hello")).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 1000);
    }
}
