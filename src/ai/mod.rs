//! AI Integration Layer
//!
//! The LLM boundary used by the generation pipeline: providers, retries,
//! timeouts, cost tracking and lenient JSON extraction.

pub mod cost;
pub mod json_repair;
pub mod provider;
pub mod timeout;

pub use cost::{CostSummary, CostTracker, SharedCostTracker, create_shared_tracker};
pub use json_repair::{JsonRepairer, extract_json};
pub use provider::{
    ChainConfig, ErrorCategory, ErrorClassifier, LlmError, LlmProvider, LlmResponse,
    OllamaProvider, OpenAiProvider, Pricing, PricingConfig, ProviderChain, ProviderConfig,
    ResponseMetadata, ResponseTiming, SharedProvider, TokenUsage, create_provider,
};
pub use timeout::{TimeoutConfig, with_timeout};
