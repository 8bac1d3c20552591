//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/novelweave/) and project (.novelweave/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::{ChainConfig, PricingConfig, ProviderConfig, TimeoutConfig};
use crate::constants::{chain, network};
use crate::types::{NovelError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Novel shape and pipeline settings
    pub novel: NovelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            novel: NovelConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `NovelError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(NovelError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(NovelError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(NovelError::Config(
                "LLM max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.llm.input_cost_per_1k < 0.0 || self.llm.output_cost_per_1k < 0.0 {
            return Err(NovelError::Config(
                "LLM token prices must not be negative".to_string(),
            ));
        }

        self.novel.validate()
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "ollama"
    pub provider: String,

    /// Model name (provider default when unset)
    pub model: Option<String>,

    /// Endpoint override for OpenAI-compatible servers or a remote Ollama
    pub base_url: Option<String>,

    /// API key; falls back to OPENAI_API_KEY. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries per provider after the first attempt
    pub max_retries: usize,

    /// USD per 1K prompt tokens
    pub input_cost_per_1k: f64,

    /// USD per 1K completion tokens
    pub output_cost_per_1k: f64,

    /// Fallback provider for retry chain
    pub fallback_provider: Option<String>,

    /// Fallback model for retry chain
    pub fallback_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            base_url: None,
            api_key: None,
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            max_retries: chain::DEFAULT_MAX_RETRIES,
            input_cost_per_1k: 0.0,
            output_cost_per_1k: 0.0,
            fallback_provider: None,
            fallback_model: None,
        }
    }
}

impl LlmConfig {
    fn pricing(&self) -> PricingConfig {
        PricingConfig {
            input_cost_per_1k: self.input_cost_per_1k,
            output_cost_per_1k: self.output_cost_per_1k,
        }
    }

    /// Settings for the primary provider
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            pricing: self.pricing(),
        }
    }

    /// Settings for the fallback provider, if one is configured
    ///
    /// Either `fallback_provider` or `fallback_model` enables the fallback;
    /// the missing half is taken from the primary. A fallback identical to
    /// the primary is ignored. Endpoint and key carry over only when the
    /// provider is the same.
    pub fn fallback_config(&self) -> Option<ProviderConfig> {
        if self.fallback_provider.is_none() && self.fallback_model.is_none() {
            return None;
        }

        let provider = self
            .fallback_provider
            .clone()
            .unwrap_or_else(|| self.provider.clone());
        let model = self.fallback_model.clone().or_else(|| self.model.clone());
        let same_provider = provider == self.provider;
        if same_provider && model == self.model {
            return None;
        }

        Some(ProviderConfig {
            provider,
            model,
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            api_key: if same_provider { self.api_key.clone() } else { None },
            base_url: if same_provider { self.base_url.clone() } else { None },
            max_tokens: self.max_tokens,
            pricing: self.pricing(),
        })
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            max_retries: self.max_retries,
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..ChainConfig::default()
        }
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        TimeoutConfig::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Novel Configuration
// =============================================================================

/// Shape of the novel and pipeline switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NovelConfig {
    /// Number of volumes
    pub volume_count: u32,

    /// Chapters in every volume
    pub chapter_count_per_volume: u32,

    /// Target words per chapter, passed to the prompts
    pub section_word_count: u32,

    /// How many prior items of each kind are fed back into prompts (0 = none)
    pub sliding_window_size: usize,

    /// Run an extra polishing call after each chapter
    pub need_optimize: bool,

    /// Summarize finished volumes with an LLM call instead of joining overviews
    pub summarize_volumes: bool,

    /// Root directory for checkpoints and chapter text
    pub workspace: PathBuf,
}

impl Default for NovelConfig {
    fn default() -> Self {
        Self {
            volume_count: 1,
            chapter_count_per_volume: 3,
            section_word_count: 1000,
            sliding_window_size: 3,
            need_optimize: false,
            summarize_volumes: false,
            workspace: PathBuf::from("workspace"),
        }
    }
}

impl NovelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.volume_count == 0 {
            return Err(NovelError::Config(
                "novel volume_count must be at least 1".to_string(),
            ));
        }
        if self.chapter_count_per_volume == 0 {
            return Err(NovelError::Config(
                "novel chapter_count_per_volume must be at least 1".to_string(),
            ));
        }
        if self.section_word_count == 0 {
            return Err(NovelError::Config(
                "novel section_word_count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
