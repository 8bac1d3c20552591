//! Retrying Provider Chain
//!
//! Wraps a primary provider and an optional fallback.
//!
//! ## Strategy
//!
//! 1. Each request is bounded by the per-request timeout
//! 2. Retryable failures (rate limit, network, transient, timeout) are retried
//!    on the same provider with exponential backoff and jitter
//! 3. When retries are exhausted, or the failure calls for it, the fallback
//!    provider gets the same treatment
//! 4. Anything else (bad request, parse failures) is returned immediately

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, info, instrument, warn};

use crate::ai::timeout::with_timeout;
use crate::constants::chain as chain_constants;
use crate::constants::network as net_constants;

use super::{LlmProvider, LlmResponse, ProviderConfig, SharedProvider, create_provider};
use crate::types::{NovelError, Result};

/// Configuration for the provider chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Retries per provider after the first attempt
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_factor: f32,
    /// Upper bound for a single request
    pub request_timeout: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_retries: chain_constants::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(chain_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(chain_constants::MAX_DELAY_SECS),
            backoff_factor: chain_constants::BACKOFF_FACTOR,
            request_timeout: Duration::from_secs(net_constants::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ChainConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.backoff_factor)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Primary provider with an optional fallback
#[derive(Clone)]
pub struct ProviderChain {
    primary: SharedProvider,
    fallback: Option<SharedProvider>,
    config: ChainConfig,
}

impl ProviderChain {
    pub fn new(primary: SharedProvider, config: ChainConfig) -> Self {
        Self {
            primary,
            fallback: None,
            config,
        }
    }

    pub fn with_fallback(mut self, fallback: SharedProvider) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Build chain from provider configs
    pub fn from_configs(
        primary: &ProviderConfig,
        fallback: Option<&ProviderConfig>,
        config: ChainConfig,
    ) -> Result<Self> {
        let mut chain = Self::new(create_provider(primary)?, config);
        if let Some(fallback) = fallback {
            chain = chain.with_fallback(create_provider(fallback)?);
        }
        Ok(chain)
    }

    /// Ask one provider, retrying recoverable failures
    async fn ask_with_retry(&self, provider: &SharedProvider, prompt: &str) -> Result<LlmResponse> {
        let timeout = self.config.request_timeout;
        let provider_name = provider.name().to_string();

        (|| async move { with_timeout(timeout, provider.ask(prompt), "LLM request").await })
            .retry(self.config.backoff())
            .when(|e: &NovelError| e.is_recoverable())
            .notify(|err: &NovelError, delay: Duration| {
                warn!(
                    provider = %provider_name,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "LLM request failed, retrying"
                );
            })
            .await
    }

    /// Whether a failure from the primary should be handed to the fallback
    fn should_fallback(err: &NovelError) -> bool {
        match err {
            NovelError::Llm(e) => e.should_fallback() || e.is_retryable(),
            NovelError::Timeout { .. } => true,
            other => other.is_recoverable(),
        }
    }
}

#[async_trait]
impl LlmProvider for ProviderChain {
    #[instrument(skip(self, prompt), fields(provider = %self.primary.name()))]
    async fn ask(&self, prompt: &str) -> Result<LlmResponse> {
        let err = match self.ask_with_retry(&self.primary, prompt).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            return Err(err);
        };

        if !Self::should_fallback(&err) {
            debug!(error = %err, "Failure not eligible for fallback");
            return Err(err);
        }

        info!(
            primary = %self.primary.name(),
            fallback = %fallback.name(),
            error = %err,
            "Primary provider exhausted, switching to fallback"
        );
        self.ask_with_retry(fallback, prompt).await
    }

    fn name(&self) -> &str {
        self.primary.name()
    }

    fn model(&self) -> &str {
        self.primary.model()
    }

    async fn health_check(&self) -> Result<bool> {
        if self.primary.health_check().await.unwrap_or(false) {
            return Ok(true);
        }
        match &self.fallback {
            Some(fallback) => Ok(fallback.health_check().await.unwrap_or(false)),
            None => Ok(false),
        }
    }
}
